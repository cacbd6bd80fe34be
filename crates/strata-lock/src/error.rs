use std::fmt;

use thiserror::Error;

use crate::record::LockRecord;

/// What a best-effort read of the lock record turned up, attached to
/// conflict errors for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HolderDiagnostics {
    Held(LockRecord),
    /// The read succeeded and found no record.
    Unlocked,
    /// The read itself failed; see the logged warning.
    Unknown,
}

impl HolderDiagnostics {
    pub fn record(&self) -> Option<&LockRecord> {
        match self {
            Self::Held(record) => Some(record),
            Self::Unlocked | Self::Unknown => None,
        }
    }
}

impl fmt::Display for HolderDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Held(record) => write!(f, "held by {record}"),
            Self::Unlocked => write!(f, "not currently held"),
            Self::Unknown => write!(f, "current holder unknown"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock {lock_key:?} is already held: {current}")]
    Held {
        lock_key: String,
        current: HolderDiagnostics,
    },

    #[error("lock {lock_key:?} is not held by {holder_id}: {current}")]
    Ownership {
        lock_key: String,
        holder_id: String,
        current: HolderDiagnostics,
    },

    #[error("lock backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("config error: {0}")]
    Config(#[from] strata_core::ConfigError),
}

/// Outcome of a single conditional table call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("conditional check failed")]
    ConditionFailed,

    #[error("{0}")]
    Unavailable(String),
}
