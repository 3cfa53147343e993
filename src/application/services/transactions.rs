//! Transaction Lifecycle Manager
//!
//! `Idle → Requested → Active → Stopping → Idle`. The store decides whether a
//! transaction is active; the in-memory phase only guards the window in which
//! a StartTransaction or StopTransaction is awaiting its answer.
//!
//! Start and stop return as soon as the request is accepted locally. The
//! authorization outcome arrives later through the returned pending handle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rust_ocpp::v1_6::types::{AuthorizationStatus, ChargePointStatus, Reason};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::telemetry::SharedTelemetryReporter;
use crate::application::messages;
use crate::application::ports::SharedClient;
use crate::application::runtime::RuntimeTimings;
use crate::application::session::ClientSlot;
use crate::domain::{ActiveTransaction, StopCause, TransactionError, TransactionPhase};
use crate::infrastructure::store::schema::{
    ACCUMULATORS, CURRENT_TRANSACTION_CONNECTOR_ID, CURRENT_TRANSACTION_ID,
    CURRENT_TRANSACTION_ID_TAG, ENERGY, PENDING_CONNECTOR_ID,
};
use crate::infrastructure::store::{Store, StoreResult, StoreTxn};
use crate::support::errors::AppResult;

/// Authorization outcome of a StartTransaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started(ActiveTransaction),
    NotAuthorized(String),
    Failed(String),
}

/// Outcome of a StopTransaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped(ActiveTransaction),
    NotAccepted(String),
    Failed(String),
}

/// Handle on an outcome that is still being negotiated.
pub struct Pending<T> {
    handle: JoinHandle<T>,
    failed: fn(String) -> T,
}

impl<T> Pending<T> {
    pub async fn outcome(self) -> T {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => (self.failed)(format!("outcome task aborted: {}", e)),
        }
    }
}

pub type PendingStart = Pending<StartOutcome>;
pub type PendingStop = Pending<StopOutcome>;

/// Resets the in-memory phase when the pending request settles.
struct PhaseGuard {
    phase: Arc<Mutex<TransactionPhase>>,
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = TransactionPhase::Idle;
    }
}

pub struct TransactionManager {
    store: Store,
    clients: ClientSlot,
    telemetry: SharedTelemetryReporter,
    timings: RuntimeTimings,
    phase: Arc<Mutex<TransactionPhase>>,
    telemetry_task: Mutex<Option<(i32, JoinHandle<()>)>>,
}

pub type SharedTransactionManager = Arc<TransactionManager>;

impl TransactionManager {
    pub fn new(
        store: Store,
        clients: ClientSlot,
        telemetry: SharedTelemetryReporter,
        timings: RuntimeTimings,
    ) -> Self {
        Self {
            store,
            clients,
            telemetry,
            timings,
            phase: Arc::new(Mutex::new(TransactionPhase::Idle)),
            telemetry_task: Mutex::new(None),
        }
    }

    /// The transaction the store records as running.
    pub async fn current(&self) -> StoreResult<Option<ActiveTransaction>> {
        let txn = self.store.view().await?;
        read_active(&txn).await
    }

    pub fn phase(&self) -> TransactionPhase {
        *self.lock_phase()
    }

    /// Validate a RemoteStartTransaction and send StartTransaction.
    pub async fn remote_start(
        self: &Arc<Self>,
        connector_id: Option<u32>,
        id_tag: &str,
    ) -> AppResult<PendingStart> {
        let connector_id = connector_id.ok_or(TransactionError::MissingConnector)?;
        let client = self.clients.require().await?;

        let guard = self.enter(TransactionPhase::Requested)?;
        let meter_start = {
            let txn = self.store.view().await?;
            if let Some(running) = txn.get(CURRENT_TRANSACTION_ID).await? {
                warn!(running, connector_id, id_tag, "Transaction already running");
                return Err(TransactionError::AlreadyRunning(running).into());
            }
            txn.get(ENERGY).await?.unwrap_or(0)
        };

        info!(connector_id, id_tag, meter_start, "Starting transaction");

        let manager = self.clone();
        let id_tag = id_tag.to_string();
        let handle = tokio::spawn(async move {
            let outcome = manager
                .complete_start(client, connector_id, id_tag, meter_start)
                .await;
            drop(guard);
            outcome
        });

        Ok(Pending {
            handle,
            failed: StartOutcome::Failed,
        })
    }

    /// Validate a RemoteStopTransaction and send StopTransaction.
    pub async fn remote_stop(self: &Arc<Self>, transaction_id: i32) -> AppResult<PendingStop> {
        self.begin_stop(Some(transaction_id), StopCause::Remote).await
    }

    /// Local stop simulating the EV being unplugged; waits for the outcome.
    pub async fn stop_local(self: &Arc<Self>) -> AppResult<StopOutcome> {
        let pending = self.begin_stop(None, StopCause::EvDisconnected).await?;
        Ok(pending.outcome().await)
    }

    /// Bind `connector_id` as preparing and arm the unlock timeout.
    ///
    /// The returned handle resolves when the timer has fired and acted.
    pub async fn unlock_connector(self: &Arc<Self>, connector_id: u32) -> AppResult<JoinHandle<()>> {
        self.store.set(PENDING_CONNECTOR_ID, &connector_id).await?;
        info!(connector_id, "Connector unlocked, waiting for a transaction");

        let clients = self.clients.clone();
        tokio::spawn(async move {
            notify_status(&clients, connector_id, ChargePointStatus::Preparing).await;
        });

        let manager = self.clone();
        Ok(tokio::spawn(async move {
            tokio::time::sleep(manager.timings.unlock_timeout).await;
            if let Err(e) = manager.expire_unlock(connector_id).await {
                error!(connector_id, error = %e, "Unlock timeout handling failed");
            }
        }))
    }

    /// Restart the telemetry loop of `transaction` unless it is already running.
    pub fn ensure_telemetry(&self, transaction: &ActiveTransaction) {
        let mut slot = self
            .telemetry_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some((id, handle)) = slot.as_ref() {
            if *id == transaction.id && !handle.is_finished() {
                return;
            }
        }
        if let Some((_, handle)) = slot.take() {
            handle.abort();
        }
        let handle = tokio::spawn(self.telemetry.clone().run(transaction.clone()));
        *slot = Some((transaction.id, handle));
    }

    fn cancel_telemetry(&self, transaction_id: i32) {
        let mut slot = self
            .telemetry_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if matches!(slot.as_ref(), Some((id, _)) if *id == transaction_id) {
            if let Some((_, handle)) = slot.take() {
                handle.abort();
            }
        }
    }

    async fn begin_stop(
        self: &Arc<Self>,
        requested: Option<i32>,
        cause: StopCause,
    ) -> AppResult<PendingStop> {
        let client = self.clients.require().await?;
        let guard = self.enter(TransactionPhase::Stopping)?;

        let (transaction, meter_stop) = {
            let txn = self.store.view().await?;
            let transaction = read_active(&txn)
                .await?
                .ok_or(TransactionError::NotRunning)?;
            if let Some(requested) = requested {
                if requested != transaction.id {
                    return Err(TransactionError::IdMismatch {
                        running: transaction.id,
                        requested,
                    }
                    .into());
                }
            }
            (transaction, txn.get(ENERGY).await?.unwrap_or(0))
        };

        info!(
            transaction_id = transaction.id,
            meter_stop,
            cause = ?cause,
            "Stopping transaction"
        );

        let manager = self.clone();
        let handle = tokio::spawn(async move {
            let outcome = manager
                .complete_stop(client, transaction, meter_stop, cause)
                .await;
            drop(guard);
            outcome
        });

        Ok(Pending {
            handle,
            failed: StopOutcome::Failed,
        })
    }

    async fn complete_start(
        &self,
        client: SharedClient,
        connector_id: u32,
        id_tag: String,
        meter_start: i64,
    ) -> StartOutcome {
        let response =
            match messages::start_transaction(client.as_ref(), connector_id, &id_tag, meter_start)
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    error!(connector_id, error = %e, "StartTransaction failed");
                    return StartOutcome::Failed(e.to_string());
                }
            };

        let status = response.id_tag_info.status;
        if !matches!(status, AuthorizationStatus::Accepted) {
            info!(connector_id, id_tag = id_tag.as_str(), status = ?status, "Transaction won't start");
            return StartOutcome::NotAuthorized(format!("{:?}", status));
        }

        let transaction = ActiveTransaction {
            id: response.transaction_id,
            connector_id,
            id_tag,
        };
        if let Err(e) = self.record_start(&transaction).await {
            error!(transaction_id = transaction.id, error = %e, "Cannot record transaction");
            return StartOutcome::Failed(e.to_string());
        }

        metrics::counter!("cp_sim_transactions_started_total").increment(1);
        info!(
            transaction_id = transaction.id,
            connector_id,
            "Transaction started"
        );

        self.ensure_telemetry(&transaction);
        notify_status(&self.clients, connector_id, ChargePointStatus::Charging).await;
        StartOutcome::Started(transaction)
    }

    async fn complete_stop(
        &self,
        client: SharedClient,
        transaction: ActiveTransaction,
        meter_stop: i64,
        cause: StopCause,
    ) -> StopOutcome {
        let reason = match cause {
            StopCause::Remote => Reason::Remote,
            StopCause::EvDisconnected => Reason::EVDisconnected,
        };

        let response = match messages::stop_transaction(
            client.as_ref(),
            transaction.id,
            &transaction.id_tag,
            meter_stop,
            reason,
        )
        .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(transaction_id = transaction.id, error = %e, "StopTransaction failed");
                return StopOutcome::Failed(e.to_string());
            }
        };

        // An absent idTagInfo means the stop was processed without comment.
        if let Some(info) = response.id_tag_info {
            if !matches!(info.status, AuthorizationStatus::Accepted) {
                info!(transaction_id = transaction.id, status = ?info.status, "Transaction won't stop");
                return StopOutcome::NotAccepted(format!("{:?}", info.status));
            }
        }

        if let Err(e) = self.record_stop(transaction.id).await {
            error!(transaction_id = transaction.id, error = %e, "Cannot clear transaction");
            return StopOutcome::Failed(e.to_string());
        }
        self.cancel_telemetry(transaction.id);

        metrics::counter!("cp_sim_transactions_stopped_total").increment(1);
        info!(transaction_id = transaction.id, "Transaction stopped");

        notify_status(&self.clients, transaction.connector_id, ChargePointStatus::Finishing).await;
        tokio::time::sleep(self.timings.finishing_dwell).await;
        notify_status(&self.clients, transaction.connector_id, ChargePointStatus::Available).await;

        StopOutcome::Stopped(transaction)
    }

    async fn record_start(&self, transaction: &ActiveTransaction) -> StoreResult<()> {
        let txn = self.store.update().await?;
        txn.set(CURRENT_TRANSACTION_ID, &transaction.id).await?;
        txn.set(CURRENT_TRANSACTION_CONNECTOR_ID, &transaction.connector_id)
            .await?;
        txn.set(CURRENT_TRANSACTION_ID_TAG, &transaction.id_tag).await?;
        txn.delete(PENDING_CONNECTOR_ID).await?;
        txn.commit().await
    }

    /// Clear the triple, the unlock binding and every accumulator in one
    /// transaction.
    async fn record_stop(&self, transaction_id: i32) -> StoreResult<()> {
        let txn = self.store.update().await?;
        if txn.get(CURRENT_TRANSACTION_ID).await? != Some(transaction_id) {
            warn!(transaction_id, "Transaction already cleared");
            return Ok(());
        }
        txn.delete(CURRENT_TRANSACTION_ID).await?;
        txn.delete(CURRENT_TRANSACTION_CONNECTOR_ID).await?;
        txn.delete(CURRENT_TRANSACTION_ID_TAG).await?;
        txn.delete(PENDING_CONNECTOR_ID).await?;
        for field in ACCUMULATORS {
            txn.delete(field).await?;
        }
        txn.commit().await
    }

    async fn expire_unlock(&self, connector_id: u32) -> StoreResult<()> {
        {
            let txn = self.store.update().await?;
            if txn.get(CURRENT_TRANSACTION_ID).await?.is_some() {
                return Ok(());
            }
            txn.delete(PENDING_CONNECTOR_ID).await?;
            txn.commit().await?;
        }
        info!(connector_id, "Unlock timed out without a transaction");
        notify_status(&self.clients, connector_id, ChargePointStatus::Available).await;
        Ok(())
    }

    fn enter(&self, next: TransactionPhase) -> Result<PhaseGuard, TransactionError> {
        let mut phase = self.lock_phase();
        if phase.is_pending() {
            return Err(TransactionError::Pending);
        }
        *phase = next;
        Ok(PhaseGuard {
            phase: self.phase.clone(),
        })
    }

    fn lock_phase(&self) -> MutexGuard<'_, TransactionPhase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read the (id, connector, tag) triple; all three or nothing.
pub async fn read_active(txn: &StoreTxn) -> StoreResult<Option<ActiveTransaction>> {
    let Some(id) = txn.get(CURRENT_TRANSACTION_ID).await? else {
        return Ok(None);
    };
    Ok(Some(ActiveTransaction {
        id,
        connector_id: txn.get(CURRENT_TRANSACTION_CONNECTOR_ID).await?.unwrap_or(0),
        id_tag: txn.get(CURRENT_TRANSACTION_ID_TAG).await?.unwrap_or_default(),
    }))
}

/// Best-effort StatusNotification; failures are logged.
pub async fn notify_status(clients: &ClientSlot, connector_id: u32, status: ChargePointStatus) {
    let Some(client) = clients.current().await else {
        warn!(connector_id, status = ?status, "No session, status not sent");
        return;
    };
    if let Err(e) = messages::status_notification(client.as_ref(), connector_id, status.clone()).await {
        error!(connector_id, status = ?status, error = %e, "StatusNotification failed");
    }
}
