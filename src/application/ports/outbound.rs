//! Outbound ports: the protocol client the runtime talks through
//!
//! [`Connector`] opens a connection to the central system and hands back a
//! [`CentralSystemClient`]. The production implementation lives in
//! [`WsConnector`](crate::infrastructure::ws::WsConnector); tests use an
//! in-memory recorder.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::inbound::InboundHandler;

/// Errors raised while talking to the central system.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    #[error("not connected to the central system")]
    NotConnected,

    #[error("no response to {action} within {timeout_secs}s")]
    Timeout { action: String, timeout_secs: u64 },

    #[error("{action} answered with {code}: {description}")]
    CallError {
        action: String,
        code: String,
        description: String,
    },

    #[error("invalid {action} response: {reason}")]
    InvalidResponse { action: String, reason: String },

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("connection closed")]
    Closed,
}

/// Credentials and trust material for one connection attempt.
#[derive(Clone, PartialEq, Eq)]
pub enum TransportSecurity {
    Plain,
    Basic {
        username: String,
        password: String,
    },
    BasicTls {
        username: String,
        password: String,
        /// PEM bundle placed in the TLS root store.
        root_certificates: String,
    },
}

impl TransportSecurity {
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match self {
            Self::Plain => None,
            Self::Basic { username, password } | Self::BasicTls { username, password, .. } => {
                Some((username, password))
            }
        }
    }
}

impl fmt::Debug for TransportSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => write!(f, "Plain"),
            Self::Basic { username, .. } => {
                f.debug_struct("Basic").field("username", username).finish_non_exhaustive()
            }
            Self::BasicTls { username, .. } => f
                .debug_struct("BasicTls")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

/// An open connection to the central system.
#[async_trait]
pub trait CentralSystemClient: Send + Sync {
    /// Send a Call and wait for its CallResult payload.
    async fn call(&self, action: &str, payload: Value) -> Result<Value, ClientError>;

    fn is_connected(&self) -> bool;

    async fn close(&self);
}

pub type SharedClient = Arc<dyn CentralSystemClient>;

/// Opens connections to the central system.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        central_system_url: &str,
        charge_point_id: &str,
        security: TransportSecurity,
        handler: Arc<dyn InboundHandler>,
    ) -> Result<SharedClient, ClientError>;
}
