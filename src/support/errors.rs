use thiserror::Error;

use crate::application::ports::ClientError;
use crate::domain::{SecurityError, TransactionError};
use crate::infrastructure::store::StoreError;

/// Umbrella error for runtime operations.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("already connected to the central system")]
    AlreadyConnected,

    #[error("not connected to the central system")]
    NotConnected,
}

impl AppError {
    /// True when the caller asked for something the current state forbids,
    /// as opposed to an internal failure.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::AlreadyConnected
                | Self::NotConnected
                | Self::Transaction(_)
                | Self::Security(_)
                | Self::Client(ClientError::NotConnected)
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
