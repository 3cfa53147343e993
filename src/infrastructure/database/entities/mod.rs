//! Database entities module

pub mod state_entry;

pub use state_entry::Entity as StateEntry;
