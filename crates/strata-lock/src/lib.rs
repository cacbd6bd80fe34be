//! strata-lock
//!
//! Distributed mutual exclusion over a single DynamoDB item per lock key.
//!
//! Public API:
//! - `LockBackend::lock()`: create the lock record, fail fast if present
//! - `LockBackend::unlock()`: delete the record, holder only
//! - `LockBackend::update_lock_info()`: publish progress, holder only
//! - `with_lock()`: run a closure inside an acquire/release pair

pub mod backend;
pub mod dynamodb;
pub mod error;
pub mod memory;
pub mod record;
pub mod session;
pub mod table;

pub use crate::backend::{DynamoDbLockBackend, LockBackend};
pub use crate::dynamodb::DynamoDbLockTable;
pub use crate::error::{HolderDiagnostics, LockError, TableError};
pub use crate::memory::MemoryLockTable;
pub use crate::record::LockRecord;
pub use crate::session::with_lock;
pub use crate::table::LockTable;
