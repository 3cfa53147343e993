//! Inbound port: Calls initiated by the central system

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Failure answering an inbound Call; becomes a CallError frame.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InboundError {
    #[error("action {0} is not implemented")]
    NotImplemented(String),

    #[error("malformed {action} payload: {reason}")]
    FormationViolation { action: String, reason: String },

    #[error("{0}")]
    Internal(String),
}

impl InboundError {
    /// OCPP-J error code for the CallError frame.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotImplemented(_) => "NotImplemented",
            Self::FormationViolation { .. } => "FormationViolation",
            Self::Internal(_) => "InternalError",
        }
    }
}

#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn handle(&self, action: &str, payload: Value) -> Result<Value, InboundError>;
}
