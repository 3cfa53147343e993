//! RemoteStartTransaction handler

use rust_ocpp::v1_6::messages::remote_start_transaction::{
    RemoteStartTransactionRequest, RemoteStartTransactionResponse,
};
use rust_ocpp::v1_6::types::RemoteStartStopStatus;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::application::handlers::{parse, respond};
use crate::application::ports::InboundError;
use crate::application::runtime::ChargePointRuntime;
use crate::application::services::transactions::StartOutcome;

/// Accepted means StartTransaction went out; authorization is logged later.
pub async fn handle_remote_start(
    runtime: &ChargePointRuntime,
    payload: &Value,
) -> Result<Value, InboundError> {
    let req: RemoteStartTransactionRequest = parse("RemoteStartTransaction", payload)?;

    info!(
        charge_point_id = runtime.settings().charge_point_id.as_str(),
        connector_id = ?req.connector_id,
        id_tag = req.id_tag.as_str(),
        "RemoteStartTransaction"
    );

    let status = match runtime
        .transactions()
        .remote_start(req.connector_id, &req.id_tag)
        .await
    {
        Ok(pending) => {
            tokio::spawn(async move {
                match pending.outcome().await {
                    StartOutcome::Started(tx) => {
                        info!(transaction_id = tx.id, "Remote start completed")
                    }
                    StartOutcome::NotAuthorized(status) => {
                        info!(status = status.as_str(), "Remote start not authorized")
                    }
                    StartOutcome::Failed(reason) => {
                        error!(reason = reason.as_str(), "Remote start failed")
                    }
                }
            });
            RemoteStartStopStatus::Accepted
        }
        Err(e) => {
            warn!(error = %e, "RemoteStartTransaction rejected");
            RemoteStartStopStatus::Rejected
        }
    };

    respond(&RemoteStartTransactionResponse { status })
}
