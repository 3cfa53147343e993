//! Typed store schema
//!
//! Every durable key has a [`Field`] constant naming its value type. Values
//! are encoded to strings only here, at the store boundary.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};

use crate::domain::configuration;
use crate::domain::SecurityProfile;

/// Conversion between a typed value and its stored string form.
pub trait StoreValue: Sized {
    fn encode(&self) -> String;
    fn decode(raw: &str) -> Result<Self, String>;
}

impl StoreValue for String {
    fn encode(&self) -> String {
        self.clone()
    }

    fn decode(raw: &str) -> Result<Self, String> {
        Ok(raw.to_string())
    }
}

macro_rules! integer_store_value {
    ($($ty:ty),*) => {
        $(
            impl StoreValue for $ty {
                fn encode(&self) -> String {
                    self.to_string()
                }

                fn decode(raw: &str) -> Result<Self, String> {
                    raw.trim()
                        .parse::<$ty>()
                        .map_err(|e| format!("{:?} is not a valid {}: {}", raw, stringify!($ty), e))
                }
            }
        )*
    };
}

integer_store_value!(i32, i64, u32);

impl StoreValue for DateTime<Utc> {
    fn encode(&self) -> String {
        self.to_rfc3339()
    }

    fn decode(raw: &str) -> Result<Self, String> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| format!("{:?} is not an RFC 3339 timestamp: {}", raw, e))
    }
}

impl StoreValue for SecurityProfile {
    fn encode(&self) -> String {
        self.level().to_string()
    }

    fn decode(raw: &str) -> Result<Self, String> {
        SecurityProfile::parse(raw).map_err(|e| e.to_string())
    }
}

/// A durable key together with the type stored under it.
pub struct Field<T> {
    pub key: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Field<T> {
    pub const fn new(key: &'static str) -> Self {
        Self {
            key,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Field<T> {}

impl<T> std::fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Field({})", self.key)
    }
}

// Runtime metadata
pub const STARTED_AT: Field<DateTime<Utc>> = Field::new("started_at");
pub const STOPPED_AT: Field<DateTime<Utc>> = Field::new("stopped_at");
pub const CHARGE_POINT_ID: Field<String> = Field::new("charge_point_id");
pub const CENTRAL_SYSTEM_URL: Field<String> = Field::new("cs_url");
pub const VERSION: Field<String> = Field::new("cp_version");
pub const STORE_PATH: Field<String> = Field::new("db_path");

// Security
pub const SECURITY_PROFILE: Field<SecurityProfile> = Field::new(configuration::SECURITY_PROFILE);
pub const AUTHORIZATION_KEY: Field<String> = Field::new(configuration::AUTHORIZATION_KEY);
pub const ROOT_CERTIFICATE: Field<String> = Field::new("root_certificate");
pub const CERTIFICATE_STORE_MAX_LENGTH: Field<i64> =
    Field::new(configuration::CERTIFICATE_STORE_MAX_LENGTH);

// Scheduling
pub const HEARTBEAT_INTERVAL: Field<i64> = Field::new(configuration::HEARTBEAT_INTERVAL);
pub const METER_VALUE_SAMPLE_INTERVAL: Field<i64> =
    Field::new(configuration::METER_VALUE_SAMPLE_INTERVAL);
pub const METER_VALUES_SAMPLED_DATA: Field<String> =
    Field::new(configuration::METER_VALUES_SAMPLED_DATA);

// Transaction triple, always written and cleared together
pub const CURRENT_TRANSACTION_ID: Field<i32> = Field::new("current_transaction_id");
pub const CURRENT_TRANSACTION_CONNECTOR_ID: Field<u32> =
    Field::new("current_transaction_connector_id");
pub const CURRENT_TRANSACTION_ID_TAG: Field<String> = Field::new("current_transaction_idTag");

/// Connector bound by UnlockConnector while no transaction runs.
pub const PENDING_CONNECTOR_ID: Field<u32> = Field::new("pending_connector_id");

// Meter accumulators
pub const ENERGY: Field<i64> = Field::new("meter_value__energy");
pub const INSTANTANEOUS_POWER: Field<i64> = Field::new("meter_value__instantaneous_power");
pub const INSTANTANEOUS_VOLTAGE: Field<i64> = Field::new("meter_value__instantaneous_voltage");
pub const INSTANTANEOUS_CURRENT: Field<i64> = Field::new("meter_value__instantaneous_current");
pub const INSTANTANEOUS_TEMPERATURE: Field<i64> =
    Field::new("meter_value__instantaneous_temperature");
pub const BATTERY_PERCENTAGE: Field<i64> = Field::new("meter_value__battery_percentage");

pub const ACCUMULATORS: [Field<i64>; 6] = [
    ENERGY,
    INSTANTANEOUS_POWER,
    INSTANTANEOUS_VOLTAGE,
    INSTANTANEOUS_CURRENT,
    INSTANTANEOUS_TEMPERATURE,
    BATTERY_PERCENTAGE,
];
