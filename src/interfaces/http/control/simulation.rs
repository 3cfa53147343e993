//! Simulated physical events

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{info, warn};

use crate::application::services::transactions::StopOutcome;
use crate::interfaces::http::router::ControlState;
use crate::support::errors::AppResult;

#[derive(Debug, Default, Deserialize)]
pub struct PreparingParams {
    #[serde(rename = "connectorId")]
    pub connector_id: Option<u32>,
}

/// `GET /preparing?connectorId=N`: Available, then Preparing.
pub async fn preparing(
    State(state): State<ControlState>,
    Query(params): Query<PreparingParams>,
) -> AppResult<StatusCode> {
    state.runtime.simulate_preparing(params.connector_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /ev-stop`: stop the running transaction as if the EV was unplugged.
pub async fn ev_stop(State(state): State<ControlState>) -> AppResult<Response> {
    let response = match state.runtime.ev_stop().await? {
        StopOutcome::Stopped(transaction) => {
            info!(transaction_id = transaction.id, "EV disconnected");
            StatusCode::NO_CONTENT.into_response()
        }
        StopOutcome::NotAccepted(status) => {
            warn!(status = status.as_str(), "Stop not accepted by central system");
            StatusCode::NO_CONTENT.into_response()
        }
        StopOutcome::Failed(reason) => {
            (StatusCode::INTERNAL_SERVER_ERROR, reason).into_response()
        }
    };
    Ok(response)
}
