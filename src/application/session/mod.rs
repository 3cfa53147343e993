//! Current central-system session
//!
//! The runtime, the telemetry loops and the control surface all reach the
//! connection through one shared [`ClientSlot`]. It is empty while the charge
//! point is disconnected.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use super::ports::{ClientError, SharedClient};

#[derive(Clone, Default)]
pub struct ClientSlot {
    inner: Arc<RwLock<Option<SharedClient>>>,
}

impl ClientSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<SharedClient> {
        self.inner.read().await.clone()
    }

    /// The connected client, or [`ClientError::NotConnected`].
    pub async fn require(&self) -> Result<SharedClient, ClientError> {
        match self.current().await {
            Some(client) if client.is_connected() => Ok(client),
            _ => Err(ClientError::NotConnected),
        }
    }

    pub async fn install(&self, client: SharedClient) {
        *self.inner.write().await = Some(client);
        info!("Central system session registered");
    }

    pub async fn take(&self) -> Option<SharedClient> {
        let client = self.inner.write().await.take();
        if client.is_some() {
            info!("Central system session released");
        }
        client
    }

    pub async fn is_connected(&self) -> bool {
        self.current()
            .await
            .is_some_and(|client| client.is_connected())
    }
}
