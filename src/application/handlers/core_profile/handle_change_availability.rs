//! ChangeAvailability handler

use rust_ocpp::v1_6::messages::change_availability::{
    ChangeAvailabilityRequest, ChangeAvailabilityResponse,
};
use rust_ocpp::v1_6::types::AvailabilityStatus;
use serde_json::Value;
use tracing::info;

use crate::application::handlers::{parse, respond};
use crate::application::ports::InboundError;
use crate::application::runtime::ChargePointRuntime;

/// Always accepted; availability is not simulated.
pub async fn handle_change_availability(
    runtime: &ChargePointRuntime,
    payload: &Value,
) -> Result<Value, InboundError> {
    let req: ChangeAvailabilityRequest = parse("ChangeAvailability", payload)?;

    info!(
        charge_point_id = runtime.settings().charge_point_id.as_str(),
        connector_id = req.connector_id,
        kind = ?req.kind,
        "ChangeAvailability"
    );

    respond(&ChangeAvailabilityResponse {
        status: AvailabilityStatus::Accepted,
    })
}
