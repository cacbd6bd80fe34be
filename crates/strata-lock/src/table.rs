use std::future::Future;
use std::pin::Pin;

use crate::error::TableError;
use crate::record::LockRecord;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Key-value store holding lock records.
///
/// Every write evaluates its condition atomically with the mutation on the
/// store side; a failed condition is reported as
/// [`TableError::ConditionFailed`], never as a partial write.
///
/// Methods return boxed futures for dyn compatibility.
pub trait LockTable: Send + Sync {
    /// Create the record for `lock_key` only if none exists.
    fn put_if_absent<'a>(
        &'a self,
        lock_key: &'a str,
        holder_id: &'a str,
    ) -> BoxFuture<'a, Result<(), TableError>>;

    /// Delete the record only if it is held by `holder_id`.
    fn delete_if_holder<'a>(
        &'a self,
        lock_key: &'a str,
        holder_id: &'a str,
    ) -> BoxFuture<'a, Result<(), TableError>>;

    /// Set `info` on the record only if it is held by `holder_id`.
    fn update_info_if_holder<'a>(
        &'a self,
        lock_key: &'a str,
        holder_id: &'a str,
        info: &'a str,
    ) -> BoxFuture<'a, Result<(), TableError>>;

    /// Strongly consistent read of the current record.
    fn get<'a>(
        &'a self,
        lock_key: &'a str,
    ) -> BoxFuture<'a, Result<Option<LockRecord>, TableError>>;
}
