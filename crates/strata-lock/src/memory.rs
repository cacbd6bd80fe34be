use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::TableError;
use crate::record::LockRecord;
use crate::table::{BoxFuture, LockTable};

/// In-process lock table for tests and single-machine runs.
///
/// Each call evaluates its condition and applies its mutation under one
/// mutex, matching the store's per-request atomicity. Clones share the same
/// records, so several backends over clones behave like several processes
/// over one remote table.
#[derive(Clone, Default)]
pub struct MemoryLockTable {
    records: Arc<Mutex<HashMap<String, LockRecord>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing conditions.
    pub fn insert(&self, record: LockRecord) {
        self.records().insert(record.lock_key.clone(), record);
    }

    /// Peek at a record without going through the table interface.
    pub fn record(&self, lock_key: &str) -> Option<LockRecord> {
        self.records().get(lock_key).cloned()
    }

    /// Make every `get` fail as if the store were unreachable.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every conditional write fail as if the store were unreachable.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, LockRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_writes(&self) -> Result<(), TableError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TableError::Unavailable(
                "memory table: writes disabled".into(),
            ));
        }
        Ok(())
    }

    fn held_by(records: &HashMap<String, LockRecord>, lock_key: &str, holder_id: &str) -> bool {
        records
            .get(lock_key)
            .is_some_and(|record| record.holder_id == holder_id)
    }
}

impl LockTable for MemoryLockTable {
    fn put_if_absent<'a>(
        &'a self,
        lock_key: &'a str,
        holder_id: &'a str,
    ) -> BoxFuture<'a, Result<(), TableError>> {
        Box::pin(async move {
            self.check_writes()?;
            let mut records = self.records();
            if records.contains_key(lock_key) {
                return Err(TableError::ConditionFailed);
            }
            records.insert(lock_key.to_string(), LockRecord::new(lock_key, holder_id));
            Ok(())
        })
    }

    fn delete_if_holder<'a>(
        &'a self,
        lock_key: &'a str,
        holder_id: &'a str,
    ) -> BoxFuture<'a, Result<(), TableError>> {
        Box::pin(async move {
            self.check_writes()?;
            let mut records = self.records();
            if !Self::held_by(&records, lock_key, holder_id) {
                return Err(TableError::ConditionFailed);
            }
            records.remove(lock_key);
            Ok(())
        })
    }

    fn update_info_if_holder<'a>(
        &'a self,
        lock_key: &'a str,
        holder_id: &'a str,
        info: &'a str,
    ) -> BoxFuture<'a, Result<(), TableError>> {
        Box::pin(async move {
            self.check_writes()?;
            let mut records = self.records();
            match records.get_mut(lock_key) {
                Some(record) if record.holder_id == holder_id => {
                    record.info = Some(info.to_string());
                    Ok(())
                }
                _ => Err(TableError::ConditionFailed),
            }
        })
    }

    fn get<'a>(
        &'a self,
        lock_key: &'a str,
    ) -> BoxFuture<'a, Result<Option<LockRecord>, TableError>> {
        Box::pin(async move {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(TableError::Unavailable(
                    "memory table: reads disabled".into(),
                ));
            }
            Ok(self.record(lock_key))
        })
    }
}
