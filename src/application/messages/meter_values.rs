use rust_ocpp::v1_6::messages::meter_values::{MeterValuesRequest, MeterValuesResponse};
use rust_ocpp::v1_6::types::MeterValue;

use super::send;
use crate::application::ports::{CentralSystemClient, ClientError};

pub async fn meter_values(
    client: &dyn CentralSystemClient,
    connector_id: u32,
    transaction_id: i32,
    meter_value: MeterValue,
) -> Result<MeterValuesResponse, ClientError> {
    let request = MeterValuesRequest {
        connector_id,
        transaction_id: Some(transaction_id),
        meter_value: vec![meter_value],
    };

    send(client, "MeterValues", &request).await
}
