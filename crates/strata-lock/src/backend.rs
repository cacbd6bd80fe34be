use strata_core::LockConfig;

use crate::dynamodb::DynamoDbLockTable;
use crate::error::{HolderDiagnostics, LockError, TableError};
use crate::record::LockRecord;
use crate::table::LockTable;

/// Cooperative lock over one key of a [`LockTable`].
///
/// Every transition is a single conditional write, so exclusion holds across
/// processes without any client-side coordination. Acquire fails fast; there
/// is no lease, no expiry and no retry. A crashed holder leaves the record
/// behind until [`LockBackend::force_unlock`] clears it.
pub struct LockBackend<T> {
    table: T,
    lock_key: String,
}

/// The production backend: lock records in DynamoDB.
pub type DynamoDbLockBackend = LockBackend<DynamoDbLockTable>;

impl LockBackend<DynamoDbLockTable> {
    pub async fn from_config(config: &LockConfig) -> Result<Self, LockError> {
        config.validate()?;
        let table = DynamoDbLockTable::from_config(config).await;
        Ok(Self::new(table, config.lock_key.clone()))
    }
}

impl<T: LockTable> LockBackend<T> {
    pub fn new(table: T, lock_key: impl Into<String>) -> Self {
        Self {
            table,
            lock_key: lock_key.into(),
        }
    }

    pub fn lock_key(&self) -> &str {
        &self.lock_key
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    /// Acquire the lock for `holder_id`.
    ///
    /// Fails with [`LockError::Held`] if any record exists for the key,
    /// including one held by the same `holder_id`.
    pub async fn lock(&self, holder_id: &str) -> Result<(), LockError> {
        match self.table.put_if_absent(&self.lock_key, holder_id).await {
            Ok(()) => {
                tracing::info!(lock_key = %self.lock_key, holder_id, "lock acquired");
                Ok(())
            }
            Err(TableError::ConditionFailed) => {
                let current = self.diagnose().await;
                tracing::debug!(lock_key = %self.lock_key, holder_id, %current, "lock busy");
                Err(LockError::Held {
                    lock_key: self.lock_key.clone(),
                    current,
                })
            }
            Err(TableError::Unavailable(msg)) => Err(LockError::BackendUnavailable(msg)),
        }
    }

    /// Release the lock. Only the current holder may.
    pub async fn unlock(&self, holder_id: &str) -> Result<(), LockError> {
        match self.table.delete_if_holder(&self.lock_key, holder_id).await {
            Ok(()) => {
                tracing::info!(lock_key = %self.lock_key, holder_id, "lock released");
                Ok(())
            }
            Err(err) => Err(self.ownership_error(holder_id, err).await),
        }
    }

    /// Replace the holder-supplied info string. Only the current holder may.
    pub async fn update_lock_info(&self, holder_id: &str, info: &str) -> Result<(), LockError> {
        match self
            .table
            .update_info_if_holder(&self.lock_key, holder_id, info)
            .await
        {
            Ok(()) => {
                tracing::debug!(lock_key = %self.lock_key, holder_id, info, "lock info updated");
                Ok(())
            }
            Err(err) => Err(self.ownership_error(holder_id, err).await),
        }
    }

    /// Read the current record, if any.
    pub async fn current_holder(&self) -> Result<Option<LockRecord>, LockError> {
        self.table
            .get(&self.lock_key)
            .await
            .map_err(|e| LockError::BackendUnavailable(e.to_string()))
    }

    /// Clear a leaked lock regardless of who holds it.
    ///
    /// The delete is conditioned on the holder just read, so a lock that
    /// changes hands in between is left alone and reported as
    /// [`LockError::Ownership`]. Returns the cleared record, or `None` if the
    /// key was already free.
    pub async fn force_unlock(&self) -> Result<Option<LockRecord>, LockError> {
        let Some(record) = self.current_holder().await? else {
            return Ok(None);
        };

        match self
            .table
            .delete_if_holder(&self.lock_key, &record.holder_id)
            .await
        {
            Ok(()) => {
                tracing::warn!(
                    lock_key = %self.lock_key,
                    holder_id = %record.holder_id,
                    info = ?record.info,
                    "lock forcibly released"
                );
                Ok(Some(record))
            }
            Err(err) => Err(self.ownership_error(&record.holder_id, err).await),
        }
    }

    async fn ownership_error(&self, holder_id: &str, err: TableError) -> LockError {
        match err {
            TableError::ConditionFailed => LockError::Ownership {
                lock_key: self.lock_key.clone(),
                holder_id: holder_id.to_string(),
                current: self.diagnose().await,
            },
            TableError::Unavailable(msg) => LockError::BackendUnavailable(msg),
        }
    }

    /// Best-effort read of the current record for error messages. A failed
    /// read is logged and reported as [`HolderDiagnostics::Unknown`].
    async fn diagnose(&self) -> HolderDiagnostics {
        match self.table.get(&self.lock_key).await {
            Ok(Some(record)) => HolderDiagnostics::Held(record),
            Ok(None) => HolderDiagnostics::Unlocked,
            Err(err) => {
                tracing::warn!(
                    lock_key = %self.lock_key,
                    error = %err,
                    "could not read lock record for diagnostics"
                );
                HolderDiagnostics::Unknown
            }
        }
    }
}
