//! Simulated metering model

use std::ops::RangeInclusive;

/// Instantaneous power draw range in W.
pub const POWER_RANGE: RangeInclusive<i64> = 1_000..=360_000;
/// Energy added per tick in Wh.
pub const ENERGY_DELTA_RANGE: RangeInclusive<i64> = 200..=1_000;
/// Temperature delta per tick in °C.
pub const TEMPERATURE_DELTA_RANGE: RangeInclusive<i64> = 20..=50;

/// Measurands the charge point can report, named as in `MeterValuesSampledData`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Measurand {
    Energy,
    Power,
    Current,
    Voltage,
    Temperature,
    StateOfCharge,
}

impl Measurand {
    pub fn from_config_name(name: &str) -> Option<Self> {
        match name.trim() {
            "Energy.Active.Import.Register" => Some(Self::Energy),
            "Power.Active.Import" => Some(Self::Power),
            "Current.Import" => Some(Self::Current),
            "Voltage" => Some(Self::Voltage),
            "Temperature" => Some(Self::Temperature),
            "SoC" => Some(Self::StateOfCharge),
            _ => None,
        }
    }

    /// Parse a comma separated list, skipping names we don't simulate.
    pub fn parse_list(csv: &str) -> Vec<Self> {
        csv.split(',').filter_map(Self::from_config_name).collect()
    }
}

/// Power bucket deciding the plausible voltage/current pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerBand {
    /// Single phase household style charging.
    Low,
    /// AC charging.
    Medium,
    /// DC fast charging.
    High,
}

impl PowerBand {
    pub fn classify(power_w: i64) -> Self {
        match power_w {
            p if p < 3_300 => Self::Low,
            p if p < 19_200 => Self::Medium,
            _ => Self::High,
        }
    }

    pub fn voltage_range(self) -> RangeInclusive<i64> {
        match self {
            Self::Low => 120..=120,
            Self::Medium => 208..=240,
            Self::High => 380..=800,
        }
    }

    pub fn current_range(self) -> RangeInclusive<i64> {
        match self {
            Self::Low => 1..=12,
            Self::Medium => 16..=79,
            Self::High => 80..=500,
        }
    }
}

/// Increments applied to the accumulators on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeterDelta {
    pub energy: i64,
    pub power: i64,
    pub voltage: i64,
    pub current: i64,
    pub temperature: i64,
    pub battery: i64,
}

/// Accumulator values after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeterSnapshot {
    pub energy: i64,
    pub power: i64,
    pub voltage: i64,
    pub current: i64,
    pub temperature: i64,
    pub battery: i64,
}

impl MeterSnapshot {
    pub fn value_of(&self, measurand: Measurand) -> i64 {
        match measurand {
            Measurand::Energy => self.energy,
            Measurand::Power => self.power,
            Measurand::Current => self.current,
            Measurand::Voltage => self.voltage,
            Measurand::Temperature => self.temperature,
            Measurand::StateOfCharge => self.battery,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_follow_power_thresholds() {
        assert_eq!(PowerBand::classify(1_000), PowerBand::Low);
        assert_eq!(PowerBand::classify(3_299), PowerBand::Low);
        assert_eq!(PowerBand::classify(3_300), PowerBand::Medium);
        assert_eq!(PowerBand::classify(19_199), PowerBand::Medium);
        assert_eq!(PowerBand::classify(19_200), PowerBand::High);
        assert_eq!(PowerBand::classify(360_000), PowerBand::High);
    }

    #[test]
    fn band_ranges_increase_with_power() {
        let bands = [PowerBand::Low, PowerBand::Medium, PowerBand::High];
        for pair in bands.windows(2) {
            assert!(pair[0].voltage_range().end() < pair[1].voltage_range().start());
            assert!(pair[0].current_range().end() < pair[1].current_range().start());
        }
    }

    #[test]
    fn parses_sampled_data_list() {
        let list = Measurand::parse_list("Energy.Active.Import.Register, Voltage,Bogus,SoC");
        assert_eq!(
            list,
            vec![Measurand::Energy, Measurand::Voltage, Measurand::StateOfCharge]
        );
        assert!(Measurand::parse_list("").is_empty());
    }
}
