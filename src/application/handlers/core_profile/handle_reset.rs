//! Reset handler

use rust_ocpp::v1_6::messages::reset::{ResetRequest, ResetResponse};
use rust_ocpp::v1_6::types::ResetResponseStatus;
use serde_json::Value;
use tracing::info;

use crate::application::handlers::{parse, respond};
use crate::application::ports::InboundError;
use crate::application::runtime::ChargePointRuntime;

/// Soft and hard resets both reconnect after the acknowledgement.
pub async fn handle_reset(
    runtime: &ChargePointRuntime,
    payload: &Value,
) -> Result<Value, InboundError> {
    let req: ResetRequest = parse("Reset", payload)?;

    info!(
        charge_point_id = runtime.settings().charge_point_id.as_str(),
        kind = ?req.kind,
        "Reset"
    );
    runtime.schedule_reboot();

    respond(&ResetResponse {
        status: ResetResponseStatus::Accepted,
    })
}
