//! # OCPP charge point simulator
//!
//! Simulates one OCPP 1.6 charge point against a remote central system.
//!
//! ## Architecture
//!
//! - **domain**: security profiles, configuration keys, transaction phases, meter types
//! - **application**: the charge point runtime, its services and the inbound handlers
//! - **infrastructure**: the SQLite state store and the WebSocket client
//! - **interfaces**: the HTTP control surface
//! - **support**: OCPP-J framing and cancellation signals
//! - **server**: process bootstrap shared by the binary and the tests

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod support;

#[cfg(test)]
mod testing;

pub use config::{default_config_path, AppConfig, Cli};
pub use server::{init_tracing, SimulatorHandle, StartOptions};
