//! strata-storage
//!
//! S3-backed file storage for engine state. Thin wrapper around the AWS S3
//! SDK, plus a lazily paginating cursor for listings.

pub mod backend;
pub mod error;
pub mod iterator;
pub mod listing;
pub mod memory;
pub mod objects;

pub use crate::backend::S3FileBackend;
pub use crate::error::StorageError;
pub use crate::iterator::S3ObjectIterator;
pub use crate::listing::{ListRequest, ObjectLister, ObjectMeta, ObjectPage};
pub use crate::memory::MemoryLister;
