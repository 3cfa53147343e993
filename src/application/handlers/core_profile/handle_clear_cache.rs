//! ClearCache handler

use rust_ocpp::v1_6::messages::clear_cache::ClearCacheResponse;
use rust_ocpp::v1_6::types::ClearCacheStatus;
use serde_json::Value;
use tracing::info;

use crate::application::handlers::respond;
use crate::application::ports::InboundError;
use crate::application::runtime::ChargePointRuntime;

pub async fn handle_clear_cache(
    runtime: &ChargePointRuntime,
    _payload: &Value,
) -> Result<Value, InboundError> {
    info!(
        charge_point_id = runtime.settings().charge_point_id.as_str(),
        "ClearCache"
    );

    respond(&ClearCacheResponse {
        status: ClearCacheStatus::Accepted,
    })
}
