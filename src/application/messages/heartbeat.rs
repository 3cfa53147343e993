use rust_ocpp::v1_6::messages::heart_beat::{HeartbeatRequest, HeartbeatResponse};

use super::send;
use crate::application::ports::{CentralSystemClient, ClientError};

pub async fn heartbeat(client: &dyn CentralSystemClient) -> Result<HeartbeatResponse, ClientError> {
    send(client, "Heartbeat", &HeartbeatRequest {}).await
}
