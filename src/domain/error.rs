//! Domain errors

use thiserror::Error;

use super::security_profile::SecurityProfile;

/// Why a security profile change or a transport build was refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SecurityError {
    #[error("invalid security profile value: {0:?}")]
    InvalidProfile(String),

    #[error("security profile downgrade from {current} to {requested} is not allowed")]
    Downgrade {
        current: SecurityProfile,
        requested: SecurityProfile,
    },

    #[error("authorization key is not set")]
    MissingAuthorizationKey,

    #[error("no root certificate installed and no default trust anchor configured")]
    MissingTrustAnchor,

    #[error("central system url {0} does not use wss://")]
    InsecureUrl(String),

    #[error("invalid trust anchor: {0}")]
    InvalidTrustAnchor(String),
}

/// Why a transaction command was refused before reaching the central system.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("connector id is required")]
    MissingConnector,

    #[error("transaction {0} is already running")]
    AlreadyRunning(i32),

    #[error("a start or stop request is still awaiting its outcome")]
    Pending,

    #[error("no transaction is running")]
    NotRunning,

    #[error("transaction {requested} is not the running transaction {running}")]
    IdMismatch { running: i32, requested: i32 },
}
