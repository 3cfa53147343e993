//! Simulated meter readings

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;

use crate::domain::meter::{ENERGY_DELTA_RANGE, POWER_RANGE, TEMPERATURE_DELTA_RANGE};
use crate::domain::{Measurand, MeterDelta, PowerBand};

/// Source of simulated meter increments and sample selection.
pub trait MeterSimulator: Send + Sync {
    /// Increments to apply on one tick.
    fn next_delta(&self) -> MeterDelta;

    /// Whether `measurand` appears in this tick's report.
    fn include(&self, measurand: Measurand) -> bool;
}

pub type SharedMeterSimulator = Arc<dyn MeterSimulator>;

/// Uniformly random readings with a fair coin per measurand.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomMeterSimulator;

impl MeterSimulator for RandomMeterSimulator {
    fn next_delta(&self) -> MeterDelta {
        let mut rng = rand::thread_rng();

        let power = rng.gen_range(POWER_RANGE);
        let band = PowerBand::classify(power);
        // Upper bound cycles with the wall clock so SoC grows unevenly.
        let battery_ceiling = Utc::now().timestamp().rem_euclid(100);

        MeterDelta {
            energy: rng.gen_range(ENERGY_DELTA_RANGE),
            power,
            voltage: rng.gen_range(band.voltage_range()),
            current: rng.gen_range(band.current_range()),
            temperature: rng.gen_range(TEMPERATURE_DELTA_RANGE),
            battery: rng.gen_range(0..=battery_ceiling),
        }
    }

    fn include(&self, _measurand: Measurand) -> bool {
        rand::thread_rng().gen_bool(0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_stay_in_their_bands() {
        let simulator = RandomMeterSimulator;
        for _ in 0..500 {
            let delta = simulator.next_delta();
            assert!(POWER_RANGE.contains(&delta.power));
            assert!(ENERGY_DELTA_RANGE.contains(&delta.energy));
            assert!(TEMPERATURE_DELTA_RANGE.contains(&delta.temperature));
            assert!((0..100).contains(&delta.battery));

            let band = PowerBand::classify(delta.power);
            assert!(band.voltage_range().contains(&delta.voltage));
            assert!(band.current_range().contains(&delta.current));
        }
    }
}
