//! Durable state store
//!
//! A transactional key/value store over the `state_entries` table. Callers
//! open a [`StoreTxn`] with [`Store::view`] or [`Store::update`], perform any
//! number of typed reads and writes, then commit. Dropping an update without
//! committing rolls it back.
//!
//! The connection pool has a single connection, so a task must never await
//! another store operation while it holds an open transaction.

pub mod schema;

use std::path::Path;

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue::Set, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait, QueryOrder,
    TransactionTrait,
};
use thiserror::Error;
use tracing::debug;

use super::database::entities::{state_entry, StateEntry};
use super::database::{init_database, DatabaseConfig};
use schema::{Field, StoreValue};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("corrupt value for key {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("cannot write key {0} inside a read-only view")]
    ReadOnly(String),

    #[error("cannot prepare store directory: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Handle to the state database. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    db: DatabaseConnection,
}

impl Store {
    pub async fn open(config: &DatabaseConfig) -> StoreResult<Self> {
        let db = init_database(config).await?;
        Ok(Self { db })
    }

    /// Open `<root>/<charge_point_id>/state.db`, creating directories as needed.
    pub async fn open_for_charge_point(root: &Path, charge_point_id: &str) -> StoreResult<Self> {
        tokio::fs::create_dir_all(root.join(charge_point_id)).await?;
        Self::open(&DatabaseConfig::for_charge_point(root, charge_point_id)).await
    }

    pub async fn in_memory() -> StoreResult<Self> {
        Self::open(&DatabaseConfig::in_memory()).await
    }

    /// Begin a read-only transaction.
    pub async fn view(&self) -> StoreResult<StoreTxn> {
        Ok(StoreTxn {
            txn: self.db.begin().await?,
            read_only: true,
        })
    }

    /// Begin a read-write transaction.
    pub async fn update(&self) -> StoreResult<StoreTxn> {
        Ok(StoreTxn {
            txn: self.db.begin().await?,
            read_only: false,
        })
    }

    pub async fn get<T: StoreValue>(&self, field: Field<T>) -> StoreResult<Option<T>> {
        self.view().await?.get(field).await
    }

    pub async fn set<T: StoreValue>(&self, field: Field<T>, value: &T) -> StoreResult<()> {
        let txn = self.update().await?;
        txn.set(field, value).await?;
        txn.commit().await
    }

    pub async fn delete<T>(&self, field: Field<T>) -> StoreResult<()> {
        let txn = self.update().await?;
        txn.delete(field).await?;
        txn.commit().await
    }

    pub async fn increment(&self, field: Field<i64>, delta: i64) -> StoreResult<i64> {
        let txn = self.update().await?;
        let value = txn.increment(field, delta).await?;
        txn.commit().await?;
        Ok(value)
    }

    /// Close the pool; every later operation fails.
    #[cfg(test)]
    pub async fn close(&self) -> StoreResult<()> {
        self.db.clone().close().await?;
        Ok(())
    }

    /// Every stored row ordered by key.
    pub async fn entries(&self) -> StoreResult<Vec<(String, String)>> {
        let rows = StateEntry::find()
            .order_by_asc(state_entry::Column::Key)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(|row| (row.key, row.value)).collect())
    }
}

/// An open store transaction.
pub struct StoreTxn {
    txn: DatabaseTransaction,
    read_only: bool,
}

impl StoreTxn {
    pub async fn get<T: StoreValue>(&self, field: Field<T>) -> StoreResult<Option<T>> {
        match self.get_raw(field.key).await? {
            Some(raw) => T::decode(&raw).map(Some).map_err(|reason| StoreError::Corrupt {
                key: field.key.to_string(),
                reason,
            }),
            None => Ok(None),
        }
    }

    pub async fn set<T: StoreValue>(&self, field: Field<T>, value: &T) -> StoreResult<()> {
        self.set_raw(field.key, value.encode()).await
    }

    pub async fn delete<T>(&self, field: Field<T>) -> StoreResult<()> {
        self.delete_raw(field.key).await
    }

    /// Write `value` only when the key is absent. Returns whether it wrote.
    pub async fn set_if_absent<T: StoreValue>(
        &self,
        field: Field<T>,
        value: &T,
    ) -> StoreResult<bool> {
        self.set_raw_if_absent(field.key, value.encode()).await
    }

    /// Add `delta` to an integer key, starting from `delta` when absent.
    ///
    /// A delta of zero counts as one so every call makes visible progress.
    pub async fn increment(&self, field: Field<i64>, delta: i64) -> StoreResult<i64> {
        let delta = if delta == 0 { 1 } else { delta };
        let next = match self.get(field).await? {
            Some(current) => current.checked_add(delta).ok_or_else(|| StoreError::Corrupt {
                key: field.key.to_string(),
                reason: format!("{} + {} overflows", current, delta),
            })?,
            None => delta,
        };
        self.set(field, &next).await?;
        Ok(next)
    }

    pub async fn get_raw(&self, key: &str) -> StoreResult<Option<String>> {
        let row = StateEntry::find_by_id(key.to_string()).one(&self.txn).await?;
        Ok(row.map(|row| row.value))
    }

    pub async fn set_raw(&self, key: &str, value: String) -> StoreResult<()> {
        self.ensure_writable(key)?;
        let model = state_entry::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value),
            updated_at: Set(Utc::now()),
        };
        StateEntry::insert(model)
            .on_conflict(
                OnConflict::column(state_entry::Column::Key)
                    .update_columns([state_entry::Column::Value, state_entry::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.txn)
            .await?;
        debug!(key, "Store key written");
        Ok(())
    }

    pub async fn set_raw_if_absent(&self, key: &str, value: String) -> StoreResult<bool> {
        self.ensure_writable(key)?;
        if self.get_raw(key).await?.is_some() {
            return Ok(false);
        }
        self.set_raw(key, value).await?;
        Ok(true)
    }

    pub async fn delete_raw(&self, key: &str) -> StoreResult<()> {
        self.ensure_writable(key)?;
        StateEntry::delete_by_id(key.to_string())
            .exec(&self.txn)
            .await?;
        debug!(key, "Store key deleted");
        Ok(())
    }

    pub async fn commit(self) -> StoreResult<()> {
        self.txn.commit().await?;
        Ok(())
    }

    fn ensure_writable(&self, key: &str) -> StoreResult<()> {
        if self.read_only {
            return Err(StoreError::ReadOnly(key.to_string()));
        }
        Ok(())
    }
}
