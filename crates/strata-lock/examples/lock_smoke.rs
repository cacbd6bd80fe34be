//! Smoke test for the DynamoDB lock backend.
//!
//! Acquires the lock, publishes progress, shows that a second holder is
//! refused, then releases. The table must already exist with a string
//! partition key named `lock_key`.
//!
//! Usage:
//!   AWS_REGION=us-east-1 \
//!   STRATA_LOCK_TABLE=strata-locks \
//!   cargo run -p strata-lock --example lock_smoke

use std::collections::BTreeMap;

use strata_core::BackendConfig;
use strata_lock::{DynamoDbLockBackend, LockError};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let table = std::env::var("STRATA_LOCK_TABLE")
        .map_err(|_| eyre::eyre!("set STRATA_LOCK_TABLE env var"))?;

    let mut props = BTreeMap::from([("lock.table".to_string(), table)]);
    for (var, key) in [
        ("AWS_REGION", "aws.region"),
        ("STRATA_ENDPOINT", "aws.endpoint"),
        ("STRATA_LOCK_KEY", "lock.lock_key"),
    ] {
        if let Ok(value) = std::env::var(var) {
            props.insert(key.to_string(), value);
        }
    }

    let config = BackendConfig::from_properties(&props)?;
    let lock_config = config
        .lock
        .ok_or_else(|| eyre::eyre!("lock section missing from config"))?;
    let backend = DynamoDbLockBackend::from_config(&lock_config).await?;

    let holder = format!("lock-smoke-{}", std::process::id());
    println!("Acquiring {:?} as {holder}...", backend.lock_key());
    backend.lock(&holder).await?;

    backend
        .update_lock_info(&holder, "smoke test in progress")
        .await?;
    if let Some(record) = backend.current_holder().await? {
        println!("  Current holder: {record}");
    }

    match backend.lock("lock-smoke-intruder").await {
        Err(LockError::Held { current, .. }) => println!("  Second acquire refused: {current}"),
        Ok(()) => {
            backend.unlock("lock-smoke-intruder").await?;
            return Err(eyre::eyre!("second acquire unexpectedly succeeded"));
        }
        Err(other) => return Err(other.into()),
    }

    backend.unlock(&holder).await?;
    println!("Released.");

    Ok(())
}
