//! Telemetry Generator & Reporter
//!
//! One loop per active transaction. Every tick bumps the meter accumulators
//! and reports a random subset of the configured measurands. The loop owns no
//! cancellation channel: it exits as soon as the store no longer records its
//! transaction as the running one.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_ocpp::v1_6::types::{
    Location, Measurand as OcppMeasurand, MeterValue, Phase, ReadingContext, SampledValue,
    UnitOfMeasure, ValueFormat,
};
use tracing::{debug, error, info, warn};

use super::simulation::SharedMeterSimulator;
use crate::application::messages;
use crate::application::session::ClientSlot;
use crate::domain::{ActiveTransaction, Measurand, MeterSnapshot};
use crate::infrastructure::store::schema::{
    BATTERY_PERCENTAGE, CURRENT_TRANSACTION_ID, ENERGY, INSTANTANEOUS_CURRENT,
    INSTANTANEOUS_POWER, INSTANTANEOUS_TEMPERATURE, INSTANTANEOUS_VOLTAGE,
    METER_VALUES_SAMPLED_DATA, METER_VALUE_SAMPLE_INTERVAL,
};
use crate::infrastructure::store::Store;
use crate::support::errors::AppResult;

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The transaction is no longer running; nothing was incremented.
    TransactionEnded,
    /// No measurand was selected this tick.
    Skipped,
    /// A report with this many samples was accepted by the transport.
    Sent(usize),
    /// The report could not be delivered.
    SendFailed,
}

pub struct TelemetryReporter {
    store: Store,
    clients: ClientSlot,
    simulator: SharedMeterSimulator,
    default_interval: Duration,
}

pub type SharedTelemetryReporter = Arc<TelemetryReporter>;

impl TelemetryReporter {
    pub fn new(
        store: Store,
        clients: ClientSlot,
        simulator: SharedMeterSimulator,
        default_interval: Duration,
    ) -> Self {
        Self {
            store,
            clients,
            simulator,
            default_interval,
        }
    }

    /// Sample interval from `MeterValueSampleInterval`, re-read every tick.
    pub async fn sample_interval(&self) -> Duration {
        match self.store.get(METER_VALUE_SAMPLE_INTERVAL).await {
            Ok(Some(secs)) if secs > 0 => Duration::from_secs(secs.unsigned_abs()),
            Ok(_) => self.default_interval,
            Err(e) => {
                error!(error = %e, "Cannot read sample interval, using default");
                self.default_interval
            }
        }
    }

    /// Run until the transaction stops being the running one.
    pub async fn run(self: Arc<Self>, transaction: ActiveTransaction) {
        info!(
            transaction_id = transaction.id,
            connector_id = transaction.connector_id,
            "Telemetry started"
        );

        loop {
            tokio::time::sleep(self.sample_interval().await).await;

            match self.tick(&transaction).await {
                Ok(TickOutcome::TransactionEnded) => break,
                Ok(outcome) => debug!(transaction_id = transaction.id, ?outcome, "Telemetry tick"),
                Err(e) => error!(
                    transaction_id = transaction.id,
                    error = %e,
                    "Telemetry tick failed"
                ),
            }
        }

        info!(transaction_id = transaction.id, "Telemetry stopped");
    }

    /// Increment the accumulators and send one report.
    ///
    /// The running-transaction check and the increments share one store
    /// transaction, so a stopped transaction never has its accumulators
    /// recreated.
    pub async fn tick(&self, transaction: &ActiveTransaction) -> AppResult<TickOutcome> {
        let delta = self.simulator.next_delta();

        let (snapshot, sampled_data) = {
            let txn = self.store.update().await?;
            if txn.get(CURRENT_TRANSACTION_ID).await? != Some(transaction.id) {
                return Ok(TickOutcome::TransactionEnded);
            }

            let snapshot = MeterSnapshot {
                energy: txn.increment(ENERGY, delta.energy).await?,
                power: txn.increment(INSTANTANEOUS_POWER, delta.power).await?,
                voltage: txn.increment(INSTANTANEOUS_VOLTAGE, delta.voltage).await?,
                current: txn.increment(INSTANTANEOUS_CURRENT, delta.current).await?,
                temperature: txn
                    .increment(INSTANTANEOUS_TEMPERATURE, delta.temperature)
                    .await?,
                battery: txn.increment(BATTERY_PERCENTAGE, delta.battery).await?,
            };
            let sampled_data = txn.get(METER_VALUES_SAMPLED_DATA).await?.unwrap_or_default();
            txn.commit().await?;
            (snapshot, sampled_data)
        };

        let sampled_value: Vec<SampledValue> = Measurand::parse_list(&sampled_data)
            .into_iter()
            .filter(|measurand| self.simulator.include(*measurand))
            .map(|measurand| sampled_value(measurand, &snapshot))
            .collect();

        if sampled_value.is_empty() {
            return Ok(TickOutcome::Skipped);
        }
        let count = sampled_value.len();

        let Some(client) = self.clients.current().await else {
            warn!(transaction_id = transaction.id, "No session, meter values dropped");
            return Ok(TickOutcome::SendFailed);
        };

        let meter_value = MeterValue {
            timestamp: Utc::now(),
            sampled_value,
        };

        match messages::meter_values(
            client.as_ref(),
            transaction.connector_id,
            transaction.id,
            meter_value,
        )
        .await
        {
            Ok(_) => {
                metrics::counter!("cp_sim_meter_values_sent_total").increment(1);
                Ok(TickOutcome::Sent(count))
            }
            Err(e) => {
                error!(transaction_id = transaction.id, error = %e, "MeterValues failed");
                Ok(TickOutcome::SendFailed)
            }
        }
    }
}

fn sampled_value(measurand: Measurand, snapshot: &MeterSnapshot) -> SampledValue {
    let (ocpp_measurand, unit) = match measurand {
        Measurand::Energy => (OcppMeasurand::EnergyActiveImportRegister, UnitOfMeasure::Wh),
        Measurand::Power => (OcppMeasurand::PowerActiveImport, UnitOfMeasure::W),
        Measurand::Current => (OcppMeasurand::CurrentImport, UnitOfMeasure::A),
        Measurand::Voltage => (OcppMeasurand::Voltage, UnitOfMeasure::V),
        Measurand::Temperature => (OcppMeasurand::Temperature, UnitOfMeasure::Celsius),
        Measurand::StateOfCharge => (OcppMeasurand::SoC, UnitOfMeasure::Percent),
    };

    SampledValue {
        value: snapshot.value_of(measurand).to_string(),
        context: Some(ReadingContext::SamplePeriodic),
        format: Some(ValueFormat::Raw),
        measurand: Some(ocpp_measurand),
        phase: Some(Phase::L1),
        location: Some(Location::Outlet),
        unit: Some(unit),
    }
}
