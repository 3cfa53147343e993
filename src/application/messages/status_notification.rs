use chrono::Utc;
use rust_ocpp::v1_6::messages::status_notification::{
    StatusNotificationRequest, StatusNotificationResponse,
};
use rust_ocpp::v1_6::types::{ChargePointErrorCode, ChargePointStatus};
use tracing::info;

use super::send;
use crate::application::ports::{CentralSystemClient, ClientError};

pub async fn status_notification(
    client: &dyn CentralSystemClient,
    connector_id: u32,
    status: ChargePointStatus,
) -> Result<StatusNotificationResponse, ClientError> {
    info!(connector_id, status = ?status, "Sending StatusNotification");

    let request = StatusNotificationRequest {
        connector_id,
        error_code: ChargePointErrorCode::NoError,
        info: None,
        status,
        timestamp: Some(Utc::now()),
        vendor_id: None,
        vendor_error_code: None,
    };

    send(client, "StatusNotification", &request).await
}
