pub mod handlers;
pub mod messages;
pub mod ports;
pub mod runtime;
pub mod services;
pub mod session;

pub use runtime::{ChargePointRuntime, RuntimeSettings, RuntimeTimings, SharedRuntime};
