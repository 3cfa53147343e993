//! Infrastructure layer - external concerns

pub mod database;
pub mod store;
pub mod ws;

pub use database::{init_database, DatabaseConfig};
pub use store::Store;
pub use ws::WsConnector;
