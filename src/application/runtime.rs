//! Charge point runtime
//!
//! Owns every component and the connection epoch. One epoch spans a boot to
//! the matching stop: the client installed in the [`ClientSlot`], the
//! cancellation signal and the keepalive tasks bound to it. Boot, stop and
//! reboot are serialized by the epoch lock.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use rust_ocpp::v1_6::types::ChargePointStatus;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::handlers::ActionDispatcher;
use super::messages::{self, ChargePointIdentity};
use super::ports::{Connector, InboundHandler, SharedClient};
use super::services::configuration::{ConfigurationChange, ConfigurationRegistry};
use super::services::heartbeat::KeepaliveScheduler;
use super::services::security::{SecurityManager, SharedSecurityManager};
use super::services::simulation::SharedMeterSimulator;
use super::services::telemetry::TelemetryReporter;
use super::services::transactions::{
    notify_status, SharedTransactionManager, StopOutcome, TransactionManager,
};
use super::session::ClientSlot;
use crate::domain::configuration;
use crate::infrastructure::store::schema::{
    CENTRAL_SYSTEM_URL, CHARGE_POINT_ID, HEARTBEAT_INTERVAL, STARTED_AT, STOPPED_AT, STORE_PATH,
    VERSION,
};
use crate::infrastructure::store::{Store, StoreResult};
use crate::support::errors::{AppError, AppResult};
use crate::support::shutdown::ShutdownSignal;

/// How long stop waits for a keepalive task before aborting it.
const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Delays and periods used by the runtime.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeTimings {
    /// Unlocked connector reverts to Available after this long without a transaction.
    pub unlock_timeout: Duration,
    /// Delay between accepting a change that needs a reconnect and the reboot.
    pub reboot_delay: Duration,
    /// Pause between Finishing and Available after a stop.
    pub finishing_dwell: Duration,
    /// Pause between Available and Preparing on the control surface.
    pub preparing_dwell: Duration,
    pub diagnostics_interval: Duration,
    pub default_heartbeat_interval: Duration,
    pub default_sample_interval: Duration,
}

impl Default for RuntimeTimings {
    fn default() -> Self {
        Self {
            unlock_timeout: Duration::from_secs(120),
            reboot_delay: Duration::from_millis(1500),
            finishing_dwell: Duration::from_secs(1),
            preparing_dwell: Duration::from_secs(1),
            diagnostics_interval: Duration::from_secs(20 * 60),
            default_heartbeat_interval: Duration::from_secs(300),
            default_sample_interval: Duration::from_secs(60),
        }
    }
}

impl RuntimeTimings {
    /// Near-zero delays with periodic loops pushed out of the way.
    #[cfg(test)]
    pub fn instant() -> Self {
        Self {
            unlock_timeout: Duration::from_millis(20),
            reboot_delay: Duration::from_millis(10),
            finishing_dwell: Duration::from_millis(1),
            preparing_dwell: Duration::from_millis(1),
            diagnostics_interval: Duration::from_secs(3600),
            default_heartbeat_interval: Duration::from_secs(3600),
            default_sample_interval: Duration::from_secs(3600),
        }
    }
}

/// Identity and endpoints fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub charge_point_id: String,
    pub central_system_url: String,
    pub identity: ChargePointIdentity,
    /// Where the state store lives, recorded for diagnostics.
    pub store_path: String,
    /// PEM used for profile 2 when no root certificate was installed.
    pub default_trust_anchor: Option<String>,
}

struct ConnectionEpoch {
    client: SharedClient,
    shutdown: ShutdownSignal,
    tasks: Vec<JoinHandle<()>>,
}

pub struct ChargePointRuntime {
    settings: RuntimeSettings,
    timings: RuntimeTimings,
    store: Store,
    clients: ClientSlot,
    connector: Arc<dyn Connector>,
    security: SharedSecurityManager,
    configuration: ConfigurationRegistry,
    transactions: SharedTransactionManager,
    keepalive: KeepaliveScheduler,
    epoch: Mutex<Option<ConnectionEpoch>>,
    this: Weak<ChargePointRuntime>,
}

pub type SharedRuntime = Arc<ChargePointRuntime>;

impl ChargePointRuntime {
    pub fn new(
        settings: RuntimeSettings,
        timings: RuntimeTimings,
        store: Store,
        connector: Arc<dyn Connector>,
        simulator: SharedMeterSimulator,
    ) -> SharedRuntime {
        let clients = ClientSlot::new();
        let security = Arc::new(SecurityManager::new(
            store.clone(),
            settings.charge_point_id.clone(),
            settings.central_system_url.clone(),
            settings.default_trust_anchor.clone(),
        ));
        let telemetry = Arc::new(TelemetryReporter::new(
            store.clone(),
            clients.clone(),
            simulator,
            timings.default_sample_interval,
        ));
        let transactions = Arc::new(TransactionManager::new(
            store.clone(),
            clients.clone(),
            telemetry,
            timings,
        ));

        Arc::new_cyclic(|this| Self {
            configuration: ConfigurationRegistry::new(store.clone(), security.clone()),
            keepalive: KeepaliveScheduler::new(
                store.clone(),
                timings.default_heartbeat_interval,
                timings.diagnostics_interval,
            ),
            settings,
            timings,
            store,
            clients,
            connector,
            security,
            transactions,
            epoch: Mutex::new(None),
            this: this.clone(),
        })
    }

    /// Owning handle for work that outlives the caller's borrow.
    pub fn shared(&self) -> Option<SharedRuntime> {
        self.this.upgrade()
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn clients(&self) -> &ClientSlot {
        &self.clients
    }

    pub fn transactions(&self) -> &SharedTransactionManager {
        &self.transactions
    }

    pub fn configuration(&self) -> &ConfigurationRegistry {
        &self.configuration
    }

    pub fn security(&self) -> &SharedSecurityManager {
        &self.security
    }

    /// Record runtime metadata and write configuration defaults that are absent.
    ///
    /// With `reset_security` the stored profile goes back to 0 and its secrets
    /// are removed.
    pub async fn seed(&self, reset_security: bool) -> AppResult<()> {
        let txn = self.store.update().await?;
        txn.set(STARTED_AT, &Utc::now()).await?;
        txn.set(CHARGE_POINT_ID, &self.settings.charge_point_id).await?;
        txn.set(CENTRAL_SYSTEM_URL, &self.settings.central_system_url)
            .await?;
        txn.set(VERSION, &env!("CARGO_PKG_VERSION").to_string())
            .await?;
        txn.set(STORE_PATH, &self.settings.store_path).await?;
        for (key, value) in configuration::DEFAULTS {
            if txn.set_raw_if_absent(key, value.to_string()).await? {
                info!(key, value, "Configuration default written");
            }
        }
        txn.commit().await?;

        if reset_security {
            self.security.reset().await?;
        }
        Ok(())
    }

    pub async fn record_stopped_at(&self) -> StoreResult<()> {
        self.store.set(STOPPED_AT, &Utc::now()).await
    }

    /// True while an epoch exists and its transport is still open.
    pub async fn is_connected(&self) -> bool {
        self.epoch
            .lock()
            .await
            .as_ref()
            .is_some_and(|epoch| epoch.client.is_connected())
    }

    /// Connect, announce the charge point and start the keepalive loops.
    ///
    /// An epoch whose transport was closed by the central system is torn down
    /// first.
    pub async fn boot(&self) -> AppResult<()> {
        let mut epoch = self.epoch.lock().await;
        if let Some(current) = epoch.take() {
            if current.client.is_connected() {
                *epoch = Some(current);
                return Err(AppError::AlreadyConnected);
            }
            warn!("Previous connection was lost, cleaning up before boot");
            self.stop_locked(current).await;
        }
        *epoch = Some(self.boot_locked().await?);
        Ok(())
    }

    /// Cancel the keepalive loops and close the connection.
    ///
    /// A lost connection is still cleaned up but reported as not connected.
    pub async fn stop(&self) -> AppResult<()> {
        let mut epoch = self.epoch.lock().await;
        let current = epoch.take().ok_or(AppError::NotConnected)?;
        let was_connected = current.client.is_connected();
        self.stop_locked(current).await;
        if !was_connected {
            return Err(AppError::NotConnected);
        }
        Ok(())
    }

    /// Stop if connected, then boot with the transport security now stored.
    pub async fn reboot(&self) -> AppResult<()> {
        let mut epoch = self.epoch.lock().await;
        info!(
            charge_point_id = self.settings.charge_point_id.as_str(),
            "Rebooting"
        );
        if let Some(current) = epoch.take() {
            self.stop_locked(current).await;
        }
        *epoch = Some(self.boot_locked().await?);
        Ok(())
    }

    /// Reboot after the configured delay, off the caller's task.
    pub fn schedule_reboot(&self) {
        let runtime = self.this.clone();
        let delay = self.timings.reboot_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(runtime) = runtime.upgrade() else {
                return;
            };
            if let Err(e) = runtime.reboot().await {
                error!(error = %e, "Scheduled reboot failed");
            }
        });
    }

    /// ChangeConfiguration, rebooting when the change needs a new connection.
    pub async fn change_configuration(
        &self,
        key: &str,
        value: &str,
    ) -> AppResult<ConfigurationChange> {
        let change = self.configuration.change_configuration(key, value).await?;
        if change.reconnect_required {
            info!(key, value, "Configuration change requires reboot");
            self.schedule_reboot();
        }
        Ok(change)
    }

    /// Send Available, pause, then Preparing for `connector_id`.
    ///
    /// Connector 0 or none means the connector of the running transaction.
    pub async fn simulate_preparing(&self, connector_id: Option<u32>) -> AppResult<()> {
        let client = self.clients.require().await?;
        let connector_id = match connector_id.filter(|id| *id > 0) {
            Some(id) => id,
            None => self
                .transactions
                .current()
                .await?
                .map(|tx| tx.connector_id)
                .unwrap_or(0),
        };

        messages::status_notification(client.as_ref(), connector_id, ChargePointStatus::Available)
            .await?;
        tokio::time::sleep(self.timings.preparing_dwell).await;
        messages::status_notification(client.as_ref(), connector_id, ChargePointStatus::Preparing)
            .await?;
        Ok(())
    }

    /// Stop the running transaction as if the EV had been unplugged.
    pub async fn ev_stop(&self) -> AppResult<StopOutcome> {
        self.transactions.stop_local().await
    }

    async fn boot_locked(&self) -> AppResult<ConnectionEpoch> {
        let security = self.security.transport_security().await?;
        let handler: Arc<dyn InboundHandler> = Arc::new(ActionDispatcher::new(self.this.clone()));

        let client = self
            .connector
            .connect(
                &self.settings.central_system_url,
                &self.settings.charge_point_id,
                security,
                handler,
            )
            .await?;
        self.clients.install(client.clone()).await;

        match self.announce(&client).await {
            Ok(epoch) => Ok(epoch),
            Err(e) => {
                error!(error = %e, "Boot failed, closing connection");
                self.clients.take().await;
                client.close().await;
                Err(e)
            }
        }
    }

    /// BootNotification on a freshly installed client, then the loops.
    async fn announce(&self, client: &SharedClient) -> AppResult<ConnectionEpoch> {
        let response =
            messages::boot_notification(client.as_ref(), &self.settings.identity).await?;

        let interval = i64::from(response.interval);
        if interval > 0 {
            self.store.set(HEARTBEAT_INTERVAL, &interval).await?;
        }
        info!(
            charge_point_id = self.settings.charge_point_id.as_str(),
            status = ?response.status,
            interval,
            "Boot notification answered"
        );

        let shutdown = ShutdownSignal::new();
        let tasks = self.keepalive.start(client.clone(), &shutdown);
        self.resume_transaction().await;
        metrics::gauge!("cp_sim_connected").set(1.0);

        Ok(ConnectionEpoch {
            client: client.clone(),
            shutdown,
            tasks,
        })
    }

    async fn stop_locked(&self, epoch: ConnectionEpoch) {
        epoch.shutdown.trigger();
        self.clients.take().await;
        epoch.client.close().await;

        for task in epoch.tasks {
            let abort = task.abort_handle();
            if tokio::time::timeout(TASK_JOIN_TIMEOUT, task).await.is_err() {
                warn!("Keepalive task did not stop in time, aborting");
                abort.abort();
            }
        }

        metrics::gauge!("cp_sim_connected").set(0.0);
        info!(
            charge_point_id = self.settings.charge_point_id.as_str(),
            "Disconnected from central system"
        );
    }

    /// Pick up a transaction that was open when the previous epoch ended.
    async fn resume_transaction(&self) {
        let transaction = match self.transactions.current().await {
            Ok(Some(transaction)) => transaction,
            Ok(None) => return,
            Err(e) => {
                error!(error = %e, "Cannot read running transaction");
                return;
            }
        };

        info!(
            transaction_id = transaction.id,
            connector_id = transaction.connector_id,
            "Resuming transaction"
        );
        self.transactions.ensure_telemetry(&transaction);
        notify_status(
            &self.clients,
            transaction.connector_id,
            ChargePointStatus::Charging,
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{CentralSystemClient, TransportSecurity};
    use crate::domain::SecurityProfile;
    use crate::infrastructure::store::schema::{
        AUTHORIZATION_KEY, CURRENT_TRANSACTION_CONNECTOR_ID, CURRENT_TRANSACTION_ID,
        CURRENT_TRANSACTION_ID_TAG, METER_VALUE_SAMPLE_INTERVAL, SECURITY_PROFILE,
    };
    use crate::testing::{FixedMeterSimulator, MockConnector};

    fn settings() -> RuntimeSettings {
        RuntimeSettings {
            charge_point_id: "CP-1".into(),
            central_system_url: "ws://cs.local/ocpp".into(),
            identity: ChargePointIdentity {
                vendor: "Vendor".into(),
                model: "Model".into(),
                firmware_version: "1.0".into(),
            },
            store_path: "db".into(),
            default_trust_anchor: None,
        }
    }

    async fn runtime() -> (Store, Arc<MockConnector>, SharedRuntime) {
        let store = Store::in_memory().await.unwrap();
        let connector = MockConnector::new();
        let runtime = ChargePointRuntime::new(
            settings(),
            RuntimeTimings::instant(),
            store.clone(),
            connector.clone(),
            Arc::new(FixedMeterSimulator::default()),
        );
        (store, connector, runtime)
    }

    #[tokio::test]
    async fn seed_records_metadata_and_keeps_existing_values() {
        let (store, _, runtime) = runtime().await;
        store.set(METER_VALUE_SAMPLE_INTERVAL, &15).await.unwrap();

        runtime.seed(false).await.unwrap();

        assert_eq!(store.get(CHARGE_POINT_ID).await.unwrap().as_deref(), Some("CP-1"));
        assert_eq!(
            store.get(CENTRAL_SYSTEM_URL).await.unwrap().as_deref(),
            Some("ws://cs.local/ocpp")
        );
        assert!(store.get(STARTED_AT).await.unwrap().is_some());
        assert_eq!(store.get(METER_VALUE_SAMPLE_INTERVAL).await.unwrap(), Some(15));
        assert_eq!(store.get(HEARTBEAT_INTERVAL).await.unwrap(), Some(300));
        assert_eq!(
            store.get(SECURITY_PROFILE).await.unwrap(),
            Some(SecurityProfile::None)
        );
    }

    #[tokio::test]
    async fn seed_with_reset_clears_security() {
        let (store, _, runtime) = runtime().await;
        store.set(AUTHORIZATION_KEY, &"secret".to_string()).await.unwrap();
        store.set(SECURITY_PROFILE, &SecurityProfile::Basic).await.unwrap();

        runtime.seed(true).await.unwrap();

        assert_eq!(
            store.get(SECURITY_PROFILE).await.unwrap(),
            Some(SecurityProfile::None)
        );
        assert_eq!(store.get(AUTHORIZATION_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn boot_announces_and_stores_interval() {
        let (store, connector, runtime) = runtime().await;

        runtime.boot().await.unwrap();

        assert!(runtime.is_connected().await);
        assert!(runtime.clients().is_connected().await);
        assert_eq!(connector.client().calls_for("BootNotification").len(), 1);
        assert_eq!(store.get(HEARTBEAT_INTERVAL).await.unwrap(), Some(300));
        assert_eq!(connector.securities(), vec![TransportSecurity::Plain]);
    }

    #[tokio::test]
    async fn boot_twice_and_stop_twice_fail() {
        let (_, _, runtime) = runtime().await;

        runtime.boot().await.unwrap();
        assert!(matches!(runtime.boot().await, Err(AppError::AlreadyConnected)));

        runtime.stop().await.unwrap();
        assert!(!runtime.clients().is_connected().await);
        assert!(matches!(runtime.stop().await, Err(AppError::NotConnected)));

        runtime.boot().await.unwrap();
        assert!(runtime.is_connected().await);
    }

    #[tokio::test]
    async fn failed_boot_notification_leaves_runtime_disconnected() {
        let (_, connector, runtime) = runtime().await;
        connector.client().fail_action("BootNotification");

        assert!(runtime.boot().await.is_err());
        assert!(!runtime.is_connected().await);
        assert!(runtime.clients().current().await.is_none());
    }

    #[tokio::test]
    async fn store_failure_after_connect_closes_the_client() {
        let (store, connector, runtime) = runtime().await;
        let client = connector.client();
        client.delay_action("BootNotification", Duration::from_millis(200));

        let booting = tokio::spawn({
            let runtime = runtime.clone();
            async move { runtime.boot().await }
        });
        for _ in 0..100 {
            if !client.calls_for("BootNotification").is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(runtime.clients().current().await.is_some());
        store.close().await.unwrap();

        let result = booting.await.unwrap();
        assert!(matches!(result, Err(AppError::Store(_))));
        assert!(runtime.clients().current().await.is_none());
        assert!(!client.is_connected());
        assert!(!runtime.is_connected().await);
    }

    #[tokio::test]
    async fn lost_connection_reads_disconnected_and_boot_recovers() {
        let (_, connector, runtime) = runtime().await;
        runtime.boot().await.unwrap();
        connector.client().set_connected(false);

        assert!(!runtime.is_connected().await);
        let err = runtime.simulate_preparing(Some(1)).await.unwrap_err();
        assert!(err.is_precondition());

        runtime.boot().await.unwrap();
        assert!(runtime.is_connected().await);
        assert_eq!(connector.connects(), 2);
        assert_eq!(connector.client().calls_for("BootNotification").len(), 2);
        runtime.simulate_preparing(Some(1)).await.unwrap();
        assert_eq!(connector.client().statuses(), vec!["Available", "Preparing"]);
    }

    #[tokio::test]
    async fn stop_after_lost_connection_cleans_up() {
        let (_, connector, runtime) = runtime().await;
        runtime.boot().await.unwrap();
        connector.client().set_connected(false);

        assert!(matches!(runtime.stop().await, Err(AppError::NotConnected)));
        assert!(runtime.clients().current().await.is_none());
        assert!(matches!(runtime.stop().await, Err(AppError::NotConnected)));

        runtime.boot().await.unwrap();
        assert!(runtime.is_connected().await);
    }

    #[tokio::test]
    async fn basic_profile_change_reboots_with_credentials() {
        let (_, connector, runtime) = runtime().await;
        runtime.boot().await.unwrap();

        runtime
            .change_configuration("AuthorizationKey", "0123456789abcdef")
            .await
            .unwrap();
        let change = runtime
            .change_configuration("SecurityProfile", "1")
            .await
            .unwrap();
        assert!(change.reconnect_required);

        for _ in 0..100 {
            if connector.securities().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let securities = connector.securities();
        assert_eq!(securities.len(), 2);
        assert_eq!(securities[1].credentials(), Some(("CP-1", "0123456789abcdef")));
        assert!(runtime.is_connected().await);
    }

    #[tokio::test]
    async fn boot_resumes_open_transaction() {
        let (store, connector, runtime) = runtime().await;
        let txn = store.update().await.unwrap();
        txn.set(CURRENT_TRANSACTION_ID, &7).await.unwrap();
        txn.set(CURRENT_TRANSACTION_CONNECTOR_ID, &2).await.unwrap();
        txn.set(CURRENT_TRANSACTION_ID_TAG, &"TAG".to_string()).await.unwrap();
        txn.commit().await.unwrap();

        runtime.boot().await.unwrap();

        let statuses = connector.client().calls_for("StatusNotification");
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0]["status"], "Charging");
        assert_eq!(statuses[0]["connectorId"], 2);
    }

    #[tokio::test]
    async fn preparing_requires_connection() {
        let (_, connector, runtime) = runtime().await;
        let err = runtime.simulate_preparing(Some(1)).await.unwrap_err();
        assert!(err.is_precondition());

        runtime.boot().await.unwrap();
        runtime.simulate_preparing(Some(1)).await.unwrap();
        assert_eq!(connector.client().statuses(), vec!["Available", "Preparing"]);
    }

    #[tokio::test]
    async fn ev_stop_without_transaction_is_precondition() {
        let (_, _, runtime) = runtime().await;
        runtime.boot().await.unwrap();
        let err = runtime.ev_stop().await.unwrap_err();
        assert!(err.is_precondition());
        assert_eq!(err.to_string(), "no transaction is running");
    }
}
