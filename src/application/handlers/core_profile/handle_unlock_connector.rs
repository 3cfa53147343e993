//! UnlockConnector handler

use rust_ocpp::v1_6::messages::unlock_connector::{
    UnlockConnectorRequest, UnlockConnectorResponse,
};
use rust_ocpp::v1_6::types::UnlockStatus;
use serde_json::Value;
use tracing::{error, info};

use crate::application::handlers::{parse, respond};
use crate::application::ports::InboundError;
use crate::application::runtime::ChargePointRuntime;

/// Binds the connector as preparing and arms the unlock timeout.
pub async fn handle_unlock_connector(
    runtime: &ChargePointRuntime,
    payload: &Value,
) -> Result<Value, InboundError> {
    let req: UnlockConnectorRequest = parse("UnlockConnector", payload)?;

    info!(
        charge_point_id = runtime.settings().charge_point_id.as_str(),
        connector_id = req.connector_id,
        "UnlockConnector"
    );

    let status = match runtime
        .transactions()
        .unlock_connector(req.connector_id)
        .await
    {
        Ok(_timer) => UnlockStatus::Unlocked,
        Err(e) => {
            error!(connector_id = req.connector_id, error = %e, "Unlock failed");
            UnlockStatus::UnlockFailed
        }
    };

    respond(&UnlockConnectorResponse { status })
}
