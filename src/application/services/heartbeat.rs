//! Keepalive schedulers
//!
//! Per connection epoch the runtime starts a heartbeat loop and a diagnostics
//! loop. Both check the epoch's cancellation signal right after waking and a
//! failed send never ends them.

use std::time::Duration;

use rust_ocpp::v1_6::types::DiagnosticsStatus;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::application::messages;
use crate::application::ports::SharedClient;
use crate::infrastructure::store::schema::HEARTBEAT_INTERVAL;
use crate::infrastructure::store::Store;
use crate::support::shutdown::ShutdownSignal;

#[derive(Clone)]
pub struct KeepaliveScheduler {
    store: Store,
    default_heartbeat: Duration,
    diagnostics_interval: Duration,
}

impl KeepaliveScheduler {
    pub fn new(store: Store, default_heartbeat: Duration, diagnostics_interval: Duration) -> Self {
        Self {
            store,
            default_heartbeat,
            diagnostics_interval,
        }
    }

    /// Start both loops for one epoch.
    pub fn start(&self, client: SharedClient, shutdown: &ShutdownSignal) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(self.clone().heartbeat_loop(client.clone(), shutdown.clone())),
            tokio::spawn(self.clone().diagnostics_loop(client, shutdown.clone())),
        ]
    }

    async fn heartbeat_interval(&self) -> Duration {
        match self.store.get(HEARTBEAT_INTERVAL).await {
            Ok(Some(secs)) if secs > 0 => Duration::from_secs(secs.unsigned_abs()),
            Ok(_) => self.default_heartbeat,
            Err(e) => {
                error!(error = %e, "Cannot read heartbeat interval, using default");
                self.default_heartbeat
            }
        }
    }

    pub async fn heartbeat_loop(self, client: SharedClient, shutdown: ShutdownSignal) {
        info!("Heartbeat loop started");

        loop {
            let interval = self.heartbeat_interval().await;
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.notified().wait() => break,
            }
            if shutdown.is_triggered() {
                break;
            }

            match messages::heartbeat(client.as_ref()).await {
                Ok(response) => {
                    metrics::counter!("cp_sim_heartbeats_sent_total").increment(1);
                    debug!(current_time = %response.current_time, "Heartbeat acknowledged");
                }
                Err(e) => error!(error = %e, "Heartbeat failed"),
            }
        }

        info!("Heartbeat loop stopped");
    }

    pub async fn diagnostics_loop(self, client: SharedClient, shutdown: ShutdownSignal) {
        info!(
            interval_secs = self.diagnostics_interval.as_secs(),
            "Diagnostics loop started"
        );

        let mut ticker = interval_at(
            Instant::now() + self.diagnostics_interval,
            self.diagnostics_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.notified().wait() => break,
            }
            if shutdown.is_triggered() {
                break;
            }

            if let Err(e) =
                messages::diagnostics_status_notification(client.as_ref(), DiagnosticsStatus::Idle)
                    .await
            {
                error!(error = %e, "DiagnosticsStatusNotification failed");
            }
        }

        info!("Diagnostics loop stopped");
    }
}
