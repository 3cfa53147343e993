//! Connection lifecycle endpoints

use axum::extract::State;
use axum::http::StatusCode;

use crate::interfaces::http::router::{ControlState, ENDPOINTS};
use crate::support::errors::AppResult;

/// `GET /start`: boot the connection.
pub async fn start(State(state): State<ControlState>) -> AppResult<StatusCode> {
    state.runtime.boot().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /stop`: cancel the loops and close the connection.
pub async fn stop(State(state): State<ControlState>) -> AppResult<StatusCode> {
    state.runtime.stop().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /reboot`
pub async fn reboot(State(state): State<ControlState>) -> AppResult<StatusCode> {
    state.runtime.reboot().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /list`: one endpoint per line.
pub async fn list_endpoints() -> String {
    let mut body = String::new();
    for (path, description) in ENDPOINTS {
        body.push_str(&format!("{:<12} {}\n", path, description));
    }
    body
}
