//! GetConfiguration handler

use rust_ocpp::v1_6::messages::get_configuration::{
    GetConfigurationRequest, GetConfigurationResponse,
};
use rust_ocpp::v1_6::types::KeyValue;
use serde_json::Value;
use tracing::{error, info};

use crate::application::handlers::{parse, respond};
use crate::application::ports::InboundError;
use crate::application::runtime::ChargePointRuntime;

/// Without keys, every supported key that has a value is returned.
pub async fn handle_get_configuration(
    runtime: &ChargePointRuntime,
    payload: &Value,
) -> Result<Value, InboundError> {
    let req: GetConfigurationRequest = parse("GetConfiguration", payload)?;
    let keys = req.key.unwrap_or_default();

    info!(
        charge_point_id = runtime.settings().charge_point_id.as_str(),
        keys = ?keys,
        "GetConfiguration"
    );

    let registry = runtime.configuration();
    let report = if keys.is_empty() {
        registry.all().await
    } else {
        registry.get_configuration(&keys).await
    }
    .map_err(|e| {
        error!(error = %e, "Error getting configuration");
        InboundError::Internal(e.to_string())
    })?;

    let configuration_key = report
        .known
        .into_iter()
        .map(|(key, value)| KeyValue {
            key,
            readonly: false,
            value: Some(value),
        })
        .collect();

    respond(&GetConfigurationResponse {
        configuration_key: Some(configuration_key),
        unknown_key: Some(report.unknown),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::application::handlers::test_support::booted_runtime;

    #[tokio::test]
    async fn unknown_key_reported() {
        let (_, connector, _runtime) = booted_runtime().await;
        let response = connector
            .handler()
            .unwrap()
            .handle("GetConfiguration", json!({"key": ["NotARealKey"]}))
            .await
            .unwrap();

        assert_eq!(response["unknownKey"], json!(["NotARealKey"]));
        assert_eq!(response["configurationKey"], json!([]));
    }

    #[tokio::test]
    async fn empty_request_lists_seeded_defaults() {
        let (_, connector, _runtime) = booted_runtime().await;
        let response = connector
            .handler()
            .unwrap()
            .handle("GetConfiguration", json!({}))
            .await
            .unwrap();

        let keys: Vec<&str> = response["configurationKey"]
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["key"].as_str().unwrap())
            .collect();
        assert!(keys.contains(&"SecurityProfile"));
        assert!(keys.contains(&"HeartbeatInterval"));
        assert!(!keys.contains(&"AuthorizationKey"));
    }
}
