//! UpdateFirmware handler

use rust_ocpp::v1_6::messages::update_firmware::{UpdateFirmwareRequest, UpdateFirmwareResponse};
use serde_json::Value;
use tracing::info;

use crate::application::handlers::{parse, respond};
use crate::application::ports::InboundError;
use crate::application::runtime::ChargePointRuntime;

pub async fn handle_update_firmware(
    runtime: &ChargePointRuntime,
    payload: &Value,
) -> Result<Value, InboundError> {
    let req: UpdateFirmwareRequest = parse("UpdateFirmware", payload)?;

    info!(
        charge_point_id = runtime.settings().charge_point_id.as_str(),
        location = req.location.as_str(),
        retrieve_date = %req.retrieve_date,
        "UpdateFirmware"
    );

    respond(&UpdateFirmwareResponse {})
}
