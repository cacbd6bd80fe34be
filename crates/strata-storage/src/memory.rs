use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::StorageError;
use crate::listing::{BoxFuture, ListRequest, ObjectLister, ObjectMeta, ObjectPage};

/// Scripted in-process page source.
///
/// Each page is registered under the continuation token that requests it
/// (`None` for the first page). Requests are recorded so callers can check
/// exactly what was fetched. Clones share the same script.
#[derive(Clone, Default)]
pub struct MemoryLister {
    inner: Arc<Mutex<Script>>,
}

#[derive(Default)]
struct Script {
    pages: HashMap<Option<String>, ObjectPage>,
    failures: VecDeque<String>,
    requests: Vec<ListRequest>,
}

impl MemoryLister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the page served for `token`.
    pub fn with_page(
        self,
        token: Option<&str>,
        entries: Vec<ObjectMeta>,
        next: Option<&str>,
    ) -> Self {
        self.script().pages.insert(
            token.map(str::to_string),
            ObjectPage {
                entries,
                next_continuation_token: next.map(str::to_string),
            },
        );
        self
    }

    /// Chop `keys` into pages of `page_size`, chained by tokens
    /// `page-2`, `page-3`, ... The last page carries no token.
    pub fn from_keys<I, S>(keys: I, page_size: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries: Vec<ObjectMeta> = keys.into_iter().map(|k| ObjectMeta::new(k, 0)).collect();
        let chunks: Vec<&[ObjectMeta]> = entries.chunks(page_size.max(1)).collect();
        let mut lister = Self::new();

        if chunks.is_empty() {
            return lister.with_page(None, Vec::new(), None);
        }
        for (i, chunk) in chunks.iter().enumerate() {
            let token = (i > 0).then(|| format!("page-{}", i + 1));
            let next = (i + 1 < chunks.len()).then(|| format!("page-{}", i + 2));
            lister = lister.with_page(token.as_deref(), chunk.to_vec(), next.as_deref());
        }
        lister
    }

    /// Make the next `list_page` call fail with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.script().failures.push_back(message.into());
    }

    /// Every request served so far, in order.
    pub fn requests(&self) -> Vec<ListRequest> {
        self.script().requests.clone()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ObjectLister for MemoryLister {
    fn list_page<'a>(
        &'a self,
        request: &'a ListRequest,
    ) -> BoxFuture<'a, Result<ObjectPage, StorageError>> {
        Box::pin(async move {
            let mut script = self.script();
            script.requests.push(request.clone());

            if let Some(message) = script.failures.pop_front() {
                return Err(StorageError::ListObjects(message));
            }

            script
                .pages
                .get(&request.continuation_token)
                .cloned()
                .ok_or_else(|| {
                    StorageError::ListObjects(format!(
                        "unknown continuation token: {:?}",
                        request.continuation_token
                    ))
                })
        })
    }
}
