//! Domain layer
//!
//! Pure types and rules with no I/O.

pub mod configuration;
pub mod error;
pub mod meter;
pub mod security_profile;
pub mod transaction;

pub use error::{SecurityError, TransactionError};
pub use meter::{Measurand, MeterDelta, MeterSnapshot, PowerBand};
pub use security_profile::{ProfileTransition, SecurityProfile, SecurityState};
pub use transaction::{ActiveTransaction, StopCause, TransactionPhase};
