//! Security Profile Manager
//!
//! Validates profile transitions against the secrets in the store and builds
//! the [`TransportSecurity`] used for the next connection.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::ports::TransportSecurity;
use crate::domain::security_profile::validate_transition;
use crate::domain::{ProfileTransition, SecurityError, SecurityProfile, SecurityState};
use crate::infrastructure::store::schema::{
    AUTHORIZATION_KEY, CERTIFICATE_STORE_MAX_LENGTH, ROOT_CERTIFICATE, SECURITY_PROFILE,
};
use crate::infrastructure::store::{Store, StoreResult, StoreTxn};
use crate::support::errors::AppResult;

/// Outcome of an InstallCertificate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateInstall {
    Installed,
    StoreFull,
}

pub struct SecurityManager {
    store: Store,
    charge_point_id: String,
    central_system_url: String,
    /// PEM used when no root certificate was installed.
    default_trust_anchor: Option<String>,
}

pub type SharedSecurityManager = Arc<SecurityManager>;

impl SecurityManager {
    pub fn new(
        store: Store,
        charge_point_id: impl Into<String>,
        central_system_url: impl Into<String>,
        default_trust_anchor: Option<String>,
    ) -> Self {
        Self {
            store,
            charge_point_id: charge_point_id.into(),
            central_system_url: central_system_url.into(),
            default_trust_anchor: default_trust_anchor.filter(|pem| !pem.trim().is_empty()),
        }
    }

    pub async fn read_state(&self, txn: &StoreTxn) -> StoreResult<SecurityState> {
        Ok(SecurityState {
            current: txn.get(SECURITY_PROFILE).await?.unwrap_or_default(),
            authorization_key: txn.get(AUTHORIZATION_KEY).await?,
            root_certificate: txn.get(ROOT_CERTIFICATE).await?,
            central_system_url: self.central_system_url.clone(),
        })
    }

    /// Validate a raw `SecurityProfile` configuration value inside `txn`.
    pub async fn validate_change(
        &self,
        txn: &StoreTxn,
        raw: &str,
    ) -> AppResult<ProfileTransition> {
        let requested = SecurityProfile::parse(raw)?;
        let state = self.read_state(txn).await?;
        let transition =
            validate_transition(&state, requested, self.default_trust_anchor.is_some())?;
        Ok(transition)
    }

    /// Build the transport for the profile currently stored.
    ///
    /// A missing secret is an error; the connection is never downgraded.
    pub async fn transport_security(&self) -> AppResult<TransportSecurity> {
        let state = {
            let txn = self.store.view().await?;
            self.read_state(&txn).await?
        };

        let password = || {
            state
                .authorization_key
                .clone()
                .filter(|key| !key.is_empty())
                .ok_or(SecurityError::MissingAuthorizationKey)
        };

        let security = match state.current {
            SecurityProfile::None => TransportSecurity::Plain,
            SecurityProfile::Basic => TransportSecurity::Basic {
                username: self.charge_point_id.clone(),
                password: password()?,
            },
            SecurityProfile::BasicTls => {
                let root_certificates = state
                    .root_certificate
                    .clone()
                    .filter(|pem| !pem.is_empty())
                    .or_else(|| self.default_trust_anchor.clone())
                    .ok_or(SecurityError::MissingTrustAnchor)?;
                TransportSecurity::BasicTls {
                    username: self.charge_point_id.clone(),
                    password: password()?,
                    root_certificates,
                }
            }
        };

        info!(
            charge_point_id = self.charge_point_id.as_str(),
            profile = state.current.level(),
            "Transport security prepared"
        );
        Ok(security)
    }

    /// Administrative override: back to profile 0 with secrets removed.
    pub async fn reset(&self) -> StoreResult<()> {
        let txn = self.store.update().await?;
        txn.set(SECURITY_PROFILE, &SecurityProfile::None).await?;
        txn.delete(AUTHORIZATION_KEY).await?;
        txn.delete(ROOT_CERTIFICATE).await?;
        txn.commit().await?;
        warn!(
            charge_point_id = self.charge_point_id.as_str(),
            "Security profile reset to 0"
        );
        Ok(())
    }

    /// Store `pem` as the trust anchor unless the certificate store is full.
    pub async fn install_root_certificate(&self, pem: &str) -> StoreResult<CertificateInstall> {
        let txn = self.store.update().await?;
        let max_length = txn.get(CERTIFICATE_STORE_MAX_LENGTH).await?.unwrap_or(1);
        let installed = txn
            .get(ROOT_CERTIFICATE)
            .await?
            .is_some_and(|existing| !existing.is_empty());

        if installed && max_length == 1 {
            warn!(
                charge_point_id = self.charge_point_id.as_str(),
                "Certificate store is full"
            );
            return Ok(CertificateInstall::StoreFull);
        }

        txn.set(ROOT_CERTIFICATE, &pem.to_string()).await?;
        txn.commit().await?;
        info!(
            charge_point_id = self.charge_point_id.as_str(),
            "Root certificate installed"
        );
        Ok(CertificateInstall::Installed)
    }
}
