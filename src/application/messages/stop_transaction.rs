use chrono::Utc;
use rust_ocpp::v1_6::messages::stop_transaction::{
    StopTransactionRequest, StopTransactionResponse,
};
use rust_ocpp::v1_6::types::Reason;
use tracing::info;

use super::{meter_register, send};
use crate::application::ports::{CentralSystemClient, ClientError};

pub async fn stop_transaction(
    client: &dyn CentralSystemClient,
    transaction_id: i32,
    id_tag: &str,
    meter_stop: i64,
    reason: Reason,
) -> Result<StopTransactionResponse, ClientError> {
    info!(transaction_id, id_tag, meter_stop, reason = ?reason, "Sending StopTransaction");

    let request = StopTransactionRequest {
        id_tag: Some(id_tag.to_string()),
        meter_stop: meter_register(meter_stop),
        timestamp: Utc::now(),
        transaction_id,
        reason: Some(reason),
        transaction_data: None,
    };

    send(client, "StopTransaction", &request).await
}
