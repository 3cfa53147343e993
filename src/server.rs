//! Process-level bootstrap of one simulated charge point.
//!
//! [`SimulatorHandle`] opens the store, builds the runtime, seeds it, serves
//! the control surface and boots the central system connection. The binary
//! drives it; tests can start it against any [`Connector`].

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::messages::ChargePointIdentity;
use crate::application::ports::Connector;
use crate::application::runtime::{
    ChargePointRuntime, RuntimeSettings, RuntimeTimings, SharedRuntime,
};
use crate::application::services::simulation::SharedMeterSimulator;
use crate::config::{AppConfig, ConfigError, LogFormat, LoggingConfig};
use crate::infrastructure::store::{Store, StoreError};
use crate::interfaces::http::create_control_router;
use crate::support::errors::AppError;
use crate::support::shutdown::ShutdownSignal;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot open state store: {0}")]
    Store(#[from] StoreError),

    #[error("cannot read default root certificate {path}: {source}")]
    TrustAnchor {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot bind control surface on {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("initial boot failed: {0}")]
    Boot(AppError),

    #[error("seeding the store failed: {0}")]
    Seed(AppError),
}

/// What [`SimulatorHandle::start`] needs besides the configuration.
pub struct StartOptions {
    pub config: AppConfig,
    pub connector: Arc<dyn Connector>,
    pub simulator: SharedMeterSimulator,
    pub timings: RuntimeTimings,
    pub reset_security: bool,
}

/// A running charge point and its control surface.
pub struct SimulatorHandle {
    pub runtime: SharedRuntime,
    /// Address the control surface actually listens on.
    pub control_addr: SocketAddr,

    control_shutdown: ShutdownSignal,
    control_task: JoinHandle<()>,
}

impl SimulatorHandle {
    /// Bring the charge point up.
    ///
    /// Store and boot failures are fatal: nothing keeps running when this
    /// returns an error.
    pub async fn start(opts: StartOptions) -> Result<Self, StartupError> {
        let config = opts.config;
        let endpoint = config.endpoint()?;

        let default_trust_anchor = match &config.security.default_root_certificate {
            Some(path) => Some(read_trust_anchor(path).await?),
            None => None,
        };

        let store =
            Store::open_for_charge_point(Path::new(&config.store.path), &endpoint.charge_point_id)
                .await?;

        let runtime = ChargePointRuntime::new(
            RuntimeSettings {
                charge_point_id: endpoint.charge_point_id.clone(),
                central_system_url: endpoint.central_system_url.clone(),
                identity: ChargePointIdentity {
                    vendor: config.charge_point.vendor.clone(),
                    model: config.charge_point.model.clone(),
                    firmware_version: config.charge_point.firmware_version.clone(),
                },
                store_path: config.store.path.clone(),
                default_trust_anchor,
            },
            opts.timings,
            store,
            opts.connector,
            opts.simulator,
        );
        runtime
            .seed(opts.reset_security)
            .await
            .map_err(StartupError::Seed)?;

        let metrics = if config.control.metrics {
            prometheus_handle()
        } else {
            None
        };

        let address = config.control.address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| StartupError::Bind {
                address: address.clone(),
                source,
            })?;
        let control_addr = listener.local_addr().map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;
        info!("Control surface listening on http://{}", control_addr);

        let control_shutdown = ShutdownSignal::new();
        let router = create_control_router(runtime.clone(), metrics);
        let until = control_shutdown.clone();
        let control_task = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    until.notified().wait().await;
                    info!("Control surface received shutdown signal");
                })
                .await;
            if let Err(e) = served {
                error!(error = %e, "Control surface stopped with error");
            }
        });

        if let Err(e) = runtime.boot().await {
            control_shutdown.trigger();
            control_task.abort();
            return Err(StartupError::Boot(e));
        }

        Ok(Self {
            runtime,
            control_addr,
            control_shutdown,
            control_task,
        })
    }

    /// Orderly stop: record the stop time, close the connection and the
    /// control surface.
    pub async fn shutdown(self) {
        info!("Shutting down charge point");

        if let Err(e) = self.runtime.record_stopped_at().await {
            error!(error = %e, "Cannot record stop time");
        }
        match self.runtime.stop().await {
            Ok(()) | Err(AppError::NotConnected) => {}
            Err(e) => warn!(error = %e, "Stop failed"),
        }

        self.control_shutdown.trigger();
        if let Err(e) = self.control_task.await {
            error!("Control surface task panicked: {}", e);
        }
        info!("Charge point shutdown complete");
    }
}

async fn read_trust_anchor(path: &Path) -> Result<String, StartupError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| StartupError::TrustAnchor {
            path: path.to_path_buf(),
            source,
        })
}

/// The global recorder can only be installed once per process.
fn prometheus_handle() -> Option<PrometheusHandle> {
    static PROM_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();
    PROM_HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                info!("Prometheus metrics recorder installed");
                Some(handle)
            }
            Err(e) => {
                warn!(error = %e, "Metrics recorder unavailable");
                None
            }
        })
        .clone()
}

/// Initialize tracing from the logging section.
///
/// `RUST_LOG` wins over the configured level.
pub fn init_tracing(config: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}
