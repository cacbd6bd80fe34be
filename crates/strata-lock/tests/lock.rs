use std::cell::Cell;
use std::sync::Arc;

use strata_lock::table::BoxFuture;
use strata_lock::{
    HolderDiagnostics, LockBackend, LockError, LockRecord, LockTable, MemoryLockTable, TableError,
    with_lock,
};
use tokio::sync::Barrier;

fn backend(table: &MemoryLockTable) -> LockBackend<MemoryLockTable> {
    LockBackend::new(table.clone(), "default")
}

/// Writes go to the real table, but `get` keeps serving a record read
/// earlier: the lock changed hands between the read and the next write.
struct StaleReads {
    inner: MemoryLockTable,
    stale: LockRecord,
}

impl LockTable for StaleReads {
    fn put_if_absent<'a>(
        &'a self,
        lock_key: &'a str,
        holder_id: &'a str,
    ) -> BoxFuture<'a, Result<(), TableError>> {
        self.inner.put_if_absent(lock_key, holder_id)
    }

    fn delete_if_holder<'a>(
        &'a self,
        lock_key: &'a str,
        holder_id: &'a str,
    ) -> BoxFuture<'a, Result<(), TableError>> {
        self.inner.delete_if_holder(lock_key, holder_id)
    }

    fn update_info_if_holder<'a>(
        &'a self,
        lock_key: &'a str,
        holder_id: &'a str,
        info: &'a str,
    ) -> BoxFuture<'a, Result<(), TableError>> {
        self.inner.update_info_if_holder(lock_key, holder_id, info)
    }

    fn get<'a>(
        &'a self,
        _lock_key: &'a str,
    ) -> BoxFuture<'a, Result<Option<LockRecord>, TableError>> {
        Box::pin(async move { Ok(Some(self.stale.clone())) })
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_acquires_have_exactly_one_winner() {
    const CALLERS: usize = 16;
    let table = MemoryLockTable::new();
    let start = Arc::new(Barrier::new(CALLERS));
    let mut handles = Vec::new();

    for i in 0..CALLERS {
        // one backend per caller, as if each were its own process
        let backend = backend(&table);
        let start = Arc::clone(&start);
        handles.push(tokio::spawn(async move {
            start.wait().await;
            backend.lock(&format!("holder-{i}")).await
        }));
    }

    let mut winners = 0;
    let mut held = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => winners += 1,
            Err(LockError::Held { .. }) => held += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(held, CALLERS - 1);
    assert!(table.record("default").is_some());
}

#[tokio::test]
async fn held_error_names_current_holder_and_info() {
    let table = MemoryLockTable::new();
    let lock = backend(&table);
    lock.lock("ci-run-7").await.unwrap();
    lock.update_lock_info("ci-run-7", "applying ecr_repository.app")
        .await
        .unwrap();

    let err = lock.lock("laptop-alice").await.unwrap_err();
    let LockError::Held { lock_key, current } = &err else {
        panic!("expected Held, got {err:?}");
    };
    assert_eq!(lock_key, "default");
    let expected = LockRecord::new("default", "ci-run-7")
        .with_info("applying ecr_repository.app");
    assert_eq!(current.record(), Some(&expected));

    let msg = err.to_string();
    assert!(msg.contains("ci-run-7"));
    assert!(msg.contains("applying ecr_repository.app"));
}

#[tokio::test]
async fn same_holder_cannot_acquire_twice() {
    let table = MemoryLockTable::new();
    let lock = backend(&table);
    lock.lock("run-1").await.unwrap();

    assert!(matches!(lock.lock("run-1").await, Err(LockError::Held { .. })));
}

#[tokio::test]
async fn unlock_by_other_holder_is_refused() {
    let table = MemoryLockTable::new();
    let lock = backend(&table);
    lock.lock("id1").await.unwrap();

    let err = lock.unlock("id2").await.unwrap_err();
    match err {
        LockError::Ownership {
            holder_id, current, ..
        } => {
            assert_eq!(holder_id, "id2");
            assert_eq!(
                current,
                HolderDiagnostics::Held(LockRecord::new("default", "id1"))
            );
        }
        other => panic!("expected Ownership, got {other:?}"),
    }

    assert_eq!(
        table.record("default"),
        Some(LockRecord::new("default", "id1"))
    );
}

#[tokio::test]
async fn unlock_of_free_key_is_refused() {
    let table = MemoryLockTable::new();
    let err = backend(&table).unlock("id1").await.unwrap_err();

    assert!(matches!(
        err,
        LockError::Ownership {
            current: HolderDiagnostics::Unlocked,
            ..
        }
    ));
}

#[tokio::test]
async fn info_updates_belong_to_the_holder() {
    let table = MemoryLockTable::new();
    let lock = backend(&table);
    lock.lock("id1").await.unwrap();

    lock.update_lock_info("id1", "x").await.unwrap();
    lock.update_lock_info("id1", "y").await.unwrap();

    let err = lock.update_lock_info("id2", "z").await.unwrap_err();
    assert!(matches!(err, LockError::Ownership { .. }));

    let record = lock.current_holder().await.unwrap().unwrap();
    assert_eq!(record.info.as_deref(), Some("y"));
}

#[tokio::test]
async fn update_on_free_key_does_not_create_a_record() {
    let table = MemoryLockTable::new();
    let lock = backend(&table);

    assert!(lock.update_lock_info("id1", "x").await.is_err());
    assert_eq!(table.record("default"), None);
}

#[tokio::test]
async fn release_leaves_no_residue() {
    let table = MemoryLockTable::new();
    let lock = backend(&table);

    lock.lock("id1").await.unwrap();
    lock.unlock("id1").await.unwrap();
    lock.lock("id1").await.unwrap();

    let record = lock.current_holder().await.unwrap().unwrap();
    assert_eq!(record.holder_id, "id1");
}

#[tokio::test]
async fn keys_are_independent() {
    let table = MemoryLockTable::new();
    let prod = LockBackend::new(table.clone(), "prod");
    let staging = LockBackend::new(table.clone(), "staging");

    prod.lock("id1").await.unwrap();
    staging.lock("id2").await.unwrap();

    assert!(matches!(prod.unlock("id2").await, Err(LockError::Ownership { .. })));
    staging.unlock("id2").await.unwrap();
    assert!(table.record("prod").is_some());
}

#[tokio::test]
async fn failed_diagnostic_read_still_returns_primary_error() {
    let table = MemoryLockTable::new();
    let lock = backend(&table);
    lock.lock("id1").await.unwrap();
    table.set_fail_reads(true);

    let err = lock.lock("id2").await.unwrap_err();
    assert!(matches!(
        err,
        LockError::Held {
            current: HolderDiagnostics::Unknown,
            ..
        }
    ));
    assert!(err.to_string().contains("current holder unknown"));

    let err = lock.unlock("id2").await.unwrap_err();
    assert!(matches!(
        err,
        LockError::Ownership {
            current: HolderDiagnostics::Unknown,
            ..
        }
    ));
}

#[tokio::test]
async fn store_outage_is_backend_unavailable() {
    let table = MemoryLockTable::new();
    let lock = backend(&table);
    table.set_fail_writes(true);

    assert!(matches!(
        lock.lock("id1").await,
        Err(LockError::BackendUnavailable(_))
    ));
    assert!(matches!(
        lock.unlock("id1").await,
        Err(LockError::BackendUnavailable(_))
    ));
    assert!(matches!(
        lock.update_lock_info("id1", "x").await,
        Err(LockError::BackendUnavailable(_))
    ));
}

#[tokio::test]
async fn force_unlock_clears_leaked_lock() {
    let table = MemoryLockTable::new();
    table.insert(LockRecord::new("default", "crashed-run").with_info("apply"));
    let lock = backend(&table);

    let cleared = lock.force_unlock().await.unwrap();
    assert_eq!(cleared.unwrap().holder_id, "crashed-run");
    assert_eq!(lock.force_unlock().await.unwrap(), None);

    lock.lock("next-run").await.unwrap();
}

#[tokio::test]
async fn force_unlock_leaves_a_reacquired_lock_alone() {
    let table = MemoryLockTable::new();
    table.insert(LockRecord::new("default", "next-run"));
    let stale = StaleReads {
        inner: table.clone(),
        stale: LockRecord::new("default", "crashed-run"),
    };
    let lock = LockBackend::new(stale, "default");

    let err = lock.force_unlock().await.unwrap_err();
    match err {
        LockError::Ownership { holder_id, .. } => assert_eq!(holder_id, "crashed-run"),
        other => panic!("expected Ownership, got {other:?}"),
    }

    assert_eq!(
        table.record("default"),
        Some(LockRecord::new("default", "next-run"))
    );
}

#[tokio::test]
async fn with_lock_releases_after_success() {
    let table = MemoryLockTable::new();
    let lock = backend(&table);

    let lock_ref = &lock;
    let value = with_lock(&lock, "run-1", || async move {
        lock_ref.update_lock_info("run-1", "converging").await?;
        Ok::<_, LockError>(42)
    })
    .await
    .unwrap();

    assert_eq!(value, 42);
    assert_eq!(table.record("default"), None);
}

#[derive(Debug)]
enum RunError {
    Lock(LockError),
    Apply(&'static str),
}

impl From<LockError> for RunError {
    fn from(err: LockError) -> Self {
        RunError::Lock(err)
    }
}

#[tokio::test]
async fn with_lock_releases_after_failure() {
    let table = MemoryLockTable::new();
    let lock = backend(&table);

    let err = with_lock(&lock, "run-1", || async {
        Err::<(), _>(RunError::Apply("ssm_parameter.db_password failed"))
    })
    .await
    .unwrap_err();

    assert!(matches!(err, RunError::Apply(msg) if msg.starts_with("ssm_parameter")));
    assert_eq!(table.record("default"), None);
}

#[tokio::test]
async fn with_lock_reports_release_failure_after_success() {
    let table = MemoryLockTable::new();
    let lock = backend(&table);

    let table_ref = &table;
    let err = with_lock(&lock, "run-1", || async move {
        table_ref.set_fail_writes(true);
        Ok::<_, LockError>(1)
    })
    .await
    .unwrap_err();

    assert!(matches!(err, LockError::BackendUnavailable(_)));
    assert_eq!(table.record("default").unwrap().holder_id, "run-1");
}

#[tokio::test]
async fn with_lock_keeps_body_error_when_release_also_fails() {
    let table = MemoryLockTable::new();
    let lock = backend(&table);

    let table_ref = &table;
    let err = with_lock(&lock, "run-1", || async move {
        table_ref.set_fail_writes(true);
        Err::<(), _>(RunError::Apply("dlm_policy.snapshots failed"))
    })
    .await
    .unwrap_err();

    assert!(matches!(err, RunError::Apply(msg) if msg.starts_with("dlm_policy")));
    assert_eq!(table.record("default").unwrap().holder_id, "run-1");
}

#[tokio::test]
async fn with_lock_does_not_run_body_when_busy() {
    let table = MemoryLockTable::new();
    table.insert(LockRecord::new("default", "someone-else"));
    let lock = backend(&table);

    let ran = Cell::new(false);
    let ran_ref = &ran;
    let err = with_lock(&lock, "run-1", || async move {
        ran_ref.set(true);
        Ok::<_, RunError>(())
    })
    .await
    .unwrap_err();

    assert!(matches!(err, RunError::Lock(LockError::Held { .. })));
    assert!(!ran.get());
    assert_eq!(table.record("default").unwrap().holder_id, "someone-else");
}
