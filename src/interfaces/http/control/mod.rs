//! Control surface handlers

mod connection;
mod simulation;
mod store;

pub use connection::{list_endpoints, reboot, start, stop};
pub use simulation::{ev_stop, preparing, PreparingParams};
pub use store::{list_db, render_entries, VALUE_DISPLAY_LIMIT};
