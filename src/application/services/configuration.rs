//! Configuration Registry
//!
//! ChangeConfiguration / GetConfiguration over the allow-listed keys. The
//! `SecurityProfile` key is validated by the [`SecurityManager`] inside the
//! same store transaction that persists it.

use tracing::{info, warn};

use super::security::SharedSecurityManager;
use crate::domain::configuration::{self, ChangeStatus, ConfigurationReport};
use crate::infrastructure::store::schema::SECURITY_PROFILE;
use crate::infrastructure::store::{Store, StoreResult, StoreTxn};
use crate::support::errors::{AppError, AppResult};

/// Result of one ChangeConfiguration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationChange {
    pub status: ChangeStatus,
    /// Why the change was refused.
    pub error: Option<String>,
    /// The stored profile changed in a way that needs a new connection.
    pub reconnect_required: bool,
}

impl ConfigurationChange {
    fn accepted(reconnect_required: bool) -> Self {
        Self {
            status: ChangeStatus::Accepted,
            error: None,
            reconnect_required,
        }
    }

    fn refused(status: ChangeStatus, error: impl Into<String>) -> Self {
        Self {
            status,
            error: Some(error.into()),
            reconnect_required: false,
        }
    }
}

pub struct ConfigurationRegistry {
    store: Store,
    security: SharedSecurityManager,
}

impl ConfigurationRegistry {
    pub fn new(store: Store, security: SharedSecurityManager) -> Self {
        Self { store, security }
    }

    pub async fn change_configuration(
        &self,
        key: &str,
        value: &str,
    ) -> AppResult<ConfigurationChange> {
        if !configuration::is_supported(key) {
            warn!(key, "ChangeConfiguration for unsupported key");
            return Ok(ConfigurationChange::refused(
                ChangeStatus::NotSupported,
                format!("{} is not a supported configuration key", key),
            ));
        }
        if let Err(reason) = configuration::check_value(key, value) {
            return Ok(ConfigurationChange::refused(ChangeStatus::Rejected, reason));
        }

        let txn = self.store.update().await?;
        let mut reconnect_required = false;

        if key == configuration::SECURITY_PROFILE {
            match self.security.validate_change(&txn, value).await {
                Ok(transition) => {
                    txn.set(SECURITY_PROFILE, &transition.to).await?;
                    reconnect_required = transition.requires_reconnect;
                }
                Err(AppError::Security(e)) => {
                    warn!(key, value, error = %e, "Security profile change rejected");
                    return Ok(ConfigurationChange::refused(
                        ChangeStatus::Rejected,
                        e.to_string(),
                    ));
                }
                Err(e) => return Err(e),
            }
        } else {
            txn.set_raw(key, value.to_string()).await?;
        }

        txn.commit().await?;
        info!(key, reconnect_required, "Configuration changed");
        Ok(ConfigurationChange::accepted(reconnect_required))
    }

    /// Values for `keys`, all from one consistent snapshot.
    pub async fn get_configuration(&self, keys: &[String]) -> AppResult<ConfigurationReport> {
        let txn = self.store.view().await?;
        let mut report = ConfigurationReport::default();
        for key in keys {
            match read_supported(&txn, key).await? {
                Some(value) => report.known.push((key.clone(), value)),
                None => report.unknown.push(key.clone()),
            }
        }
        Ok(report)
    }

    /// Every supported key that currently has a value.
    pub async fn all(&self) -> AppResult<ConfigurationReport> {
        let txn = self.store.view().await?;
        let mut report = ConfigurationReport::default();
        for key in configuration::SUPPORTED_KEYS {
            if let Some(value) = read_supported(&txn, key).await? {
                report.known.push((key.to_string(), value));
            }
        }
        Ok(report)
    }
}

/// An empty stored value counts as unset.
async fn read_supported(txn: &StoreTxn, key: &str) -> StoreResult<Option<String>> {
    if !configuration::is_supported(key) {
        return Ok(None);
    }
    Ok(txn.get_raw(key).await?.filter(|value| !value.is_empty()))
}
