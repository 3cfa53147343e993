//! Log and secure firmware handlers, acknowledged without action

use serde_json::Value;
use tracing::info;

use super::{
    ExtendedTriggerMessageRequest, ExtendedTriggerMessageResponse, ExtendedTriggerMessageStatus,
    GetLogRequest, GetLogResponse, LogStatus, SignedUpdateFirmwareRequest,
    SignedUpdateFirmwareResponse, SignedUpdateFirmwareStatus,
};
use crate::application::handlers::{parse, respond};
use crate::application::ports::InboundError;
use crate::application::runtime::ChargePointRuntime;

pub async fn handle_get_log(
    runtime: &ChargePointRuntime,
    payload: &Value,
) -> Result<Value, InboundError> {
    let req: GetLogRequest = parse("GetLog", payload)?;
    let charge_point_id = runtime.settings().charge_point_id.as_str();

    info!(
        charge_point_id,
        log_type = req.log_type.as_str(),
        request_id = req.request_id,
        "GetLog"
    );

    respond(&GetLogResponse {
        status: LogStatus::Accepted,
        filename: Some(format!("{}-{}.log", charge_point_id, req.request_id)),
    })
}

pub async fn handle_signed_update_firmware(
    runtime: &ChargePointRuntime,
    payload: &Value,
) -> Result<Value, InboundError> {
    let req: SignedUpdateFirmwareRequest = parse("SignedUpdateFirmware", payload)?;

    info!(
        charge_point_id = runtime.settings().charge_point_id.as_str(),
        request_id = req.request_id,
        "SignedUpdateFirmware"
    );

    respond(&SignedUpdateFirmwareResponse {
        status: SignedUpdateFirmwareStatus::Accepted,
    })
}

pub async fn handle_extended_trigger_message(
    runtime: &ChargePointRuntime,
    payload: &Value,
) -> Result<Value, InboundError> {
    let req: ExtendedTriggerMessageRequest = parse("ExtendedTriggerMessage", payload)?;

    info!(
        charge_point_id = runtime.settings().charge_point_id.as_str(),
        requested_message = req.requested_message.as_str(),
        connector_id = ?req.connector_id,
        "ExtendedTriggerMessage"
    );

    respond(&ExtendedTriggerMessageResponse {
        status: ExtendedTriggerMessageStatus::Accepted,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::application::handlers::test_support::booted_runtime;

    #[tokio::test]
    async fn stubs_acknowledge() {
        let (_, connector, _runtime) = booted_runtime().await;
        let handler = connector.handler().unwrap();

        let log = handler
            .handle("GetLog", json!({"logType": "DiagnosticsLog", "requestId": 4, "log": {}}))
            .await
            .unwrap();
        assert_eq!(log["status"], "Accepted");
        assert_eq!(log["filename"], "CP-1-4.log");

        let firmware = handler
            .handle("SignedUpdateFirmware", json!({"requestId": 1, "firmware": {}}))
            .await
            .unwrap();
        assert_eq!(firmware["status"], "Accepted");

        let trigger = handler
            .handle(
                "ExtendedTriggerMessage",
                json!({"requestedMessage": "LogStatusNotification"}),
            )
            .await
            .unwrap();
        assert_eq!(trigger["status"], "Accepted");
    }
}
