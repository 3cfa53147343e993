//! OCPP 1.6 charge point simulator
//!
//! ```sh
//! # Identity and central system on the command line
//! ocpp-cp-simulator --cp CP-1 --cs ws://localhost:9000/ocpp
//!
//! # Fixed control port, custom store root
//! ocpp-cp-simulator --cp CP-1 --cs ws://localhost:9000/ocpp --control-port 8081 --db /var/lib/cp
//! ```

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, info_span, warn, Instrument};

use ocpp_cp_sim::application::runtime::RuntimeTimings;
use ocpp_cp_sim::application::services::simulation::RandomMeterSimulator;
use ocpp_cp_sim::config::{default_config_path, AppConfig, Cli};
use ocpp_cp_sim::infrastructure::ws::WsConnector;
use ocpp_cp_sim::server::{init_tracing, SimulatorHandle, StartOptions};
use ocpp_cp_sim::support::shutdown::TerminationListener;

/// Exit code when a second signal cuts the orderly stop short.
const FORCED_EXIT_CODE: i32 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────────
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let (mut config, load_error) = match AppConfig::load(&config_path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    let overrides = config.apply_cli(&cli);

    init_tracing(&config.logging);
    match load_error {
        None => info!("Configuration loaded from {}", config_path.display()),
        Some(e) => {
            error!("Failed to load config from {}: {}", config_path.display(), e);
            error!("Using default configuration.");
        }
    }
    for applied in overrides {
        info!("CLI override: {}", applied);
    }

    let span = info_span!(
        "charge_point",
        charge_point_id = config.charge_point.id.as_deref().unwrap_or_default()
    );
    run(config, cli.reset_security).instrument(span).await
}

async fn run(config: AppConfig, reset_security: bool) -> ExitCode {
    let mut signals = match TerminationListener::install() {
        Ok(signals) => signals,
        Err(e) => {
            error!(error = %e, "Cannot install signal handlers");
            return ExitCode::FAILURE;
        }
    };

    let handle = match SimulatorHandle::start(StartOptions {
        config,
        connector: Arc::new(WsConnector::new()),
        simulator: Arc::new(RandomMeterSimulator),
        timings: RuntimeTimings::default(),
        reset_security,
    })
    .await
    {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    info!("Charge point running. Press Ctrl+C to stop.");
    signals.next().await;

    let runtime = handle.runtime.clone();
    let orderly = tokio::spawn(handle.shutdown().in_current_span());

    tokio::select! {
        result = orderly => {
            if let Err(e) = result {
                error!("Shutdown task panicked: {}", e);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        _ = signals.next() => {
            warn!("Second termination signal, exiting immediately");
            match tokio::time::timeout(Duration::from_secs(1), runtime.record_stopped_at()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "Cannot record stop time"),
                Err(_) => error!("Recording stop time timed out"),
            }
            std::process::exit(FORCED_EXIT_CODE);
        }
    }
}
