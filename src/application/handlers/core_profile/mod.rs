//! Core profile actions

mod handle_change_availability;
mod handle_change_configuration;
mod handle_clear_cache;
mod handle_data_transfer;
mod handle_get_configuration;
mod handle_get_diagnostics;
mod handle_remote_start;
mod handle_remote_stop;
mod handle_reset;
mod handle_trigger_message;
mod handle_unlock_connector;
mod handle_update_firmware;

pub use handle_change_availability::handle_change_availability;
pub use handle_change_configuration::handle_change_configuration;
pub use handle_clear_cache::handle_clear_cache;
pub use handle_data_transfer::handle_data_transfer;
pub use handle_get_configuration::handle_get_configuration;
pub use handle_get_diagnostics::handle_get_diagnostics;
pub use handle_remote_start::handle_remote_start;
pub use handle_remote_stop::handle_remote_stop;
pub use handle_reset::handle_reset;
pub use handle_trigger_message::handle_trigger_message;
pub use handle_unlock_connector::handle_unlock_connector;
pub use handle_update_firmware::handle_update_firmware;
