use rust_ocpp::v1_6::messages::diagnostics_status_notification::{
    DiagnosticsStatusNotificationRequest, DiagnosticsStatusNotificationResponse,
};
use rust_ocpp::v1_6::types::DiagnosticsStatus;

use super::send;
use crate::application::ports::{CentralSystemClient, ClientError};

pub async fn diagnostics_status_notification(
    client: &dyn CentralSystemClient,
    status: DiagnosticsStatus,
) -> Result<DiagnosticsStatusNotificationResponse, ClientError> {
    let request = DiagnosticsStatusNotificationRequest { status };
    send(client, "DiagnosticsStatusNotification", &request).await
}
