//! RemoteStopTransaction handler

use rust_ocpp::v1_6::messages::remote_stop_transaction::{
    RemoteStopTransactionRequest, RemoteStopTransactionResponse,
};
use rust_ocpp::v1_6::types::RemoteStartStopStatus;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::application::handlers::{parse, respond};
use crate::application::ports::InboundError;
use crate::application::runtime::ChargePointRuntime;
use crate::application::services::transactions::StopOutcome;

pub async fn handle_remote_stop(
    runtime: &ChargePointRuntime,
    payload: &Value,
) -> Result<Value, InboundError> {
    let req: RemoteStopTransactionRequest = parse("RemoteStopTransaction", payload)?;

    info!(
        charge_point_id = runtime.settings().charge_point_id.as_str(),
        transaction_id = req.transaction_id,
        "RemoteStopTransaction"
    );

    let status = match runtime.transactions().remote_stop(req.transaction_id).await {
        Ok(pending) => {
            tokio::spawn(async move {
                match pending.outcome().await {
                    StopOutcome::Stopped(tx) => info!(transaction_id = tx.id, "Remote stop completed"),
                    StopOutcome::NotAccepted(status) => {
                        info!(status = status.as_str(), "Remote stop not accepted")
                    }
                    StopOutcome::Failed(reason) => error!(reason = reason.as_str(), "Remote stop failed"),
                }
            });
            RemoteStartStopStatus::Accepted
        }
        Err(e) => {
            warn!(error = %e, "RemoteStopTransaction rejected");
            RemoteStartStopStatus::Rejected
        }
    };

    respond(&RemoteStopTransactionResponse { status })
}
