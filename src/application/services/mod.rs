//! Application services

pub mod configuration;
pub mod heartbeat;
pub mod security;
pub mod simulation;
pub mod telemetry;
pub mod transactions;
