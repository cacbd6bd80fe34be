//! strata-core
//!
//! Configuration and shared error plumbing for the strata backends.

pub mod aws;
pub mod config;
pub mod error;

pub use crate::config::{AwsSettings, BackendConfig, LockConfig, S3BackendConfig};
pub use crate::error::{ConfigError, format_err_chain};
