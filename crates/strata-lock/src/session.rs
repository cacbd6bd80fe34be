use std::future::Future;

use crate::backend::LockBackend;
use crate::error::LockError;
use crate::table::LockTable;

/// Run `body` while holding the lock as `holder_id`.
///
/// Release is attempted whether or not `body` succeeds. A failed release
/// after a successful body is returned as the error. If both fail, the
/// body's error is returned and the release failure is logged.
pub async fn with_lock<T, F, Fut, R, E>(
    backend: &LockBackend<T>,
    holder_id: &str,
    body: F,
) -> Result<R, E>
where
    T: LockTable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: From<LockError>,
{
    backend.lock(holder_id).await?;

    let outcome = body().await;
    let released = backend.unlock(holder_id).await;

    match (outcome, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(release_err)) => Err(release_err.into()),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(release_err)) => {
            tracing::warn!(
                lock_key = %backend.lock_key(),
                holder_id,
                error = %release_err,
                "failed to release lock after failed run"
            );
            Err(err)
        }
    }
}
