//! Inbound OCPP 1.6 handlers
//!
//! Calls initiated by the central system are routed by action name. Each
//! handler deserializes its `rust_ocpp::v1_6` request (or a local type for the
//! security extension), acts on the runtime and returns the response payload.

use std::sync::Weak;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::application::ports::{InboundError, InboundHandler};
use crate::application::runtime::ChargePointRuntime;

mod core_profile;
mod security_extension;

pub use core_profile::*;
pub use security_extension::*;

/// Routes inbound actions to their handlers.
pub async fn action_matcher(
    runtime: &ChargePointRuntime,
    action: &str,
    payload: &Value,
) -> Result<Value, InboundError> {
    match action {
        "ChangeAvailability" => handle_change_availability(runtime, payload).await,
        "ChangeConfiguration" => handle_change_configuration(runtime, payload).await,
        "ClearCache" => handle_clear_cache(runtime, payload).await,
        "DataTransfer" => handle_data_transfer(runtime, payload).await,
        "GetConfiguration" => handle_get_configuration(runtime, payload).await,
        "GetDiagnostics" => handle_get_diagnostics(runtime, payload).await,
        "RemoteStartTransaction" => handle_remote_start(runtime, payload).await,
        "RemoteStopTransaction" => handle_remote_stop(runtime, payload).await,
        "Reset" => handle_reset(runtime, payload).await,
        "TriggerMessage" => handle_trigger_message(runtime, payload).await,
        "UnlockConnector" => handle_unlock_connector(runtime, payload).await,
        "UpdateFirmware" => handle_update_firmware(runtime, payload).await,

        "CertificateSigned" => handle_certificate_signed(runtime, payload).await,
        "DeleteCertificate" => handle_delete_certificate(runtime, payload).await,
        "ExtendedTriggerMessage" => handle_extended_trigger_message(runtime, payload).await,
        "GetInstalledCertificateIds" => {
            handle_get_installed_certificate_ids(runtime, payload).await
        }
        "GetLog" => handle_get_log(runtime, payload).await,
        "InstallCertificate" => handle_install_certificate(runtime, payload).await,
        "SignedUpdateFirmware" => handle_signed_update_firmware(runtime, payload).await,

        unknown => {
            warn!(action = unknown, "Unsupported action");
            Err(InboundError::NotImplemented(unknown.to_string()))
        }
    }
}

/// Inbound side of the connection, registered with the protocol client at boot.
///
/// Holds the runtime weakly: the runtime owns the connection that owns this
/// dispatcher.
pub struct ActionDispatcher {
    runtime: Weak<ChargePointRuntime>,
}

impl ActionDispatcher {
    pub fn new(runtime: Weak<ChargePointRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl InboundHandler for ActionDispatcher {
    async fn handle(&self, action: &str, payload: Value) -> Result<Value, InboundError> {
        let runtime = self
            .runtime
            .upgrade()
            .ok_or_else(|| InboundError::Internal("charge point runtime is gone".into()))?;

        info!(
            charge_point_id = runtime.settings().charge_point_id.as_str(),
            action,
            "Received Call"
        );
        metrics::counter!("cp_sim_inbound_calls_total", "action" => action.to_string())
            .increment(1);

        let result = action_matcher(&runtime, action, &payload).await;
        if let Err(e) = &result {
            warn!(action, code = e.code(), error = %e, "Call answered with CallError");
        }
        result
    }
}

fn parse<T: DeserializeOwned>(action: &str, payload: &Value) -> Result<T, InboundError> {
    serde_json::from_value(payload.clone()).map_err(|e| InboundError::FormationViolation {
        action: action.to_string(),
        reason: e.to_string(),
    })
}

fn respond<T: Serialize>(response: &T) -> Result<Value, InboundError> {
    serde_json::to_value(response).map_err(|e| InboundError::Internal(e.to_string()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::application::messages::ChargePointIdentity;
    use crate::application::runtime::{
        ChargePointRuntime, RuntimeSettings, RuntimeTimings, SharedRuntime,
    };
    use crate::infrastructure::store::Store;
    use crate::testing::{FixedMeterSimulator, MockConnector};

    /// A booted runtime over an in-memory store.
    pub async fn booted_runtime() -> (Store, Arc<MockConnector>, SharedRuntime) {
        let store = Store::in_memory().await.unwrap();
        let connector = MockConnector::new();
        let runtime = ChargePointRuntime::new(
            RuntimeSettings {
                charge_point_id: "CP-1".into(),
                central_system_url: "ws://cs.local/ocpp".into(),
                identity: ChargePointIdentity {
                    vendor: "Vendor".into(),
                    model: "Model".into(),
                    firmware_version: "1.0".into(),
                },
                store_path: "db".into(),
                default_trust_anchor: None,
            },
            RuntimeTimings::instant(),
            store.clone(),
            connector.clone(),
            Arc::new(FixedMeterSimulator::default()),
        );
        runtime.seed(false).await.unwrap();
        runtime.boot().await.unwrap();
        (store, connector, runtime)
    }

    /// Wait until no start or stop is awaiting its outcome.
    pub async fn settled(runtime: &ChargePointRuntime) {
        for _ in 0..200 {
            if !runtime.transactions().phase().is_pending() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("transaction phase never settled");
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::test_support::booted_runtime;
    use super::*;

    #[tokio::test]
    async fn unknown_action_is_not_implemented() {
        let (_, connector, _runtime) = booted_runtime().await;
        let handler = connector.handler().unwrap();

        let err = handler.handle("ReserveNow", json!({})).await.unwrap_err();
        assert_eq!(err.code(), "NotImplemented");
    }

    #[tokio::test]
    async fn malformed_payload_is_formation_violation() {
        let (_, connector, _runtime) = booted_runtime().await;
        let handler = connector.handler().unwrap();

        let err = handler
            .handle("RemoteStopTransaction", json!({"transactionId": "abc"}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "FormationViolation");
    }

    #[tokio::test]
    async fn dispatcher_outliving_runtime_answers_internal_error() {
        let dispatcher = ActionDispatcher::new(Weak::new());
        let err = dispatcher.handle("ClearCache", json!({})).await.unwrap_err();
        assert_eq!(err.code(), "InternalError");
    }
}
