pub mod entities;
pub mod migrator;

use std::path::{Path, PathBuf};
use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use migrator::Migrator;

/// Where the state database lives.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://db/CP-1/state.db?mode=rwc")
    pub url: String,
}

impl DatabaseConfig {
    /// One SQLite file per charge point identity under `root`.
    pub fn for_charge_point(root: &Path, charge_point_id: &str) -> Self {
        Self::sqlite(&state_file(root, charge_point_id))
    }

    pub fn sqlite(path: &Path) -> Self {
        Self {
            url: format!("sqlite://{}?mode=rwc", path.display()),
        }
    }

    /// Private in-memory database, used by tests.
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
        }
    }
}

pub fn state_file(root: &Path, charge_point_id: &str) -> PathBuf {
    root.join(charge_point_id).join("state.db")
}

/// Connect and bring the schema up to date.
///
/// The pool holds exactly one connection, which serializes every store
/// transaction.
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    info!(url = config.url.as_str(), "Opening state database");

    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(1)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    Migrator::up(&db, None).await?;
    info!("State database ready");
    Ok(db)
}
