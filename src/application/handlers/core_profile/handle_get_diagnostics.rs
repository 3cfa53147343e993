//! GetDiagnostics handler

use chrono::Utc;
use rust_ocpp::v1_6::messages::get_diagnostics::{GetDiagnosticsRequest, GetDiagnosticsResponse};
use serde_json::Value;
use tracing::info;

use crate::application::handlers::{parse, respond};
use crate::application::ports::InboundError;
use crate::application::runtime::ChargePointRuntime;

/// Names a diagnostics file; nothing is uploaded.
pub async fn handle_get_diagnostics(
    runtime: &ChargePointRuntime,
    payload: &Value,
) -> Result<Value, InboundError> {
    let req: GetDiagnosticsRequest = parse("GetDiagnostics", payload)?;
    let charge_point_id = runtime.settings().charge_point_id.as_str();

    info!(
        charge_point_id,
        location = req.location.as_str(),
        "GetDiagnostics"
    );

    let file_name = format!(
        "diagnostics-{}-{}.log",
        charge_point_id,
        Utc::now().format("%Y%m%dT%H%M%SZ")
    );

    respond(&GetDiagnosticsResponse {
        file_name: Some(file_name),
    })
}
