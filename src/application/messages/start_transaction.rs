use chrono::Utc;
use rust_ocpp::v1_6::messages::start_transaction::{
    StartTransactionRequest, StartTransactionResponse,
};
use tracing::info;

use super::{meter_register, send};
use crate::application::ports::{CentralSystemClient, ClientError};

pub async fn start_transaction(
    client: &dyn CentralSystemClient,
    connector_id: u32,
    id_tag: &str,
    meter_start: i64,
) -> Result<StartTransactionResponse, ClientError> {
    info!(connector_id, id_tag, meter_start, "Sending StartTransaction");

    let request = StartTransactionRequest {
        connector_id,
        id_tag: id_tag.to_string(),
        meter_start: meter_register(meter_start),
        reservation_id: None,
        timestamp: Utc::now(),
    };

    send(client, "StartTransaction", &request).await
}
