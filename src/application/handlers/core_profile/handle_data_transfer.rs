//! DataTransfer handler

use rust_ocpp::v1_6::messages::data_transfer::{DataTransferRequest, DataTransferResponse};
use rust_ocpp::v1_6::types::DataTransferStatus;
use serde_json::Value;
use tracing::info;

use crate::application::handlers::{parse, respond};
use crate::application::ports::InboundError;
use crate::application::runtime::ChargePointRuntime;

/// Accepts any vendor message and echoes its data back.
pub async fn handle_data_transfer(
    runtime: &ChargePointRuntime,
    payload: &Value,
) -> Result<Value, InboundError> {
    let req: DataTransferRequest = parse("DataTransfer", payload)?;

    info!(
        charge_point_id = runtime.settings().charge_point_id.as_str(),
        vendor_id = req.vendor_string.as_str(),
        message_id = ?req.message_id,
        "DataTransfer"
    );

    respond(&DataTransferResponse {
        status: DataTransferStatus::Accepted,
        data: req.data,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::application::handlers::test_support::booted_runtime;

    #[tokio::test]
    async fn echoes_request_data() {
        let (_, connector, _runtime) = booted_runtime().await;
        let response = connector
            .handler()
            .unwrap()
            .handle(
                "DataTransfer",
                json!({"vendorId": "acme", "messageId": "ping", "data": "payload"}),
            )
            .await
            .unwrap();

        assert_eq!(response["status"], "Accepted");
        assert_eq!(response["data"], "payload");
    }
}
