use std::future::Future;
use std::pin::Pin;

use aws_sdk_s3::Client;
use strata_core::format_err_chain;

use crate::error::StorageError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Metadata for a single listed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
}

impl ObjectMeta {
    pub fn new(key: impl Into<String>, size: i64) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified: None,
            etag: None,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
    pub entries: Vec<ObjectMeta>,
    /// `None` means this was the last page.
    pub next_continuation_token: Option<String>,
}

/// Parameters for a single page fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub bucket: String,
    pub prefix: String,
    pub continuation_token: Option<String>,
    pub max_keys: i32,
}

/// A remote API that lists objects one bounded page at a time.
///
/// Methods return boxed futures for dyn compatibility.
pub trait ObjectLister: Send + Sync {
    fn list_page<'a>(
        &'a self,
        request: &'a ListRequest,
    ) -> BoxFuture<'a, Result<ObjectPage, StorageError>>;
}

impl ObjectLister for Client {
    fn list_page<'a>(
        &'a self,
        request: &'a ListRequest,
    ) -> BoxFuture<'a, Result<ObjectPage, StorageError>> {
        Box::pin(async move {
            let resp = self
                .list_objects_v2()
                .bucket(&request.bucket)
                .prefix(&request.prefix)
                .max_keys(request.max_keys)
                .set_continuation_token(request.continuation_token.clone())
                .send()
                .await
                .map_err(|e| StorageError::ListObjects(format_err_chain(&e.into_service_error())))?;

            let entries = resp
                .contents()
                .iter()
                .filter_map(|obj| {
                    obj.key().map(|key| ObjectMeta {
                        key: key.to_string(),
                        size: obj.size().unwrap_or(0),
                        last_modified: obj.last_modified().map(|t| t.to_string()),
                        etag: obj.e_tag().map(|s| s.to_string()),
                    })
                })
                .collect();

            let next_continuation_token = resp
                .next_continuation_token()
                .filter(|token| !token.is_empty())
                .map(|token| token.to_string());

            Ok(ObjectPage {
                entries,
                next_continuation_token,
            })
        })
    }
}
