use aws_sdk_s3::Client;
use futures::Stream;
use strata_core::config::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

use crate::error::StorageError;
use crate::listing::{ListRequest, ObjectLister, ObjectMeta};

/// Where the cursor stands relative to the remote listing.
#[derive(Debug)]
enum Cursor {
    /// Nothing fetched yet.
    Fresh,
    /// At least one page fetched. `index == buffer.len()` means the buffer
    /// is spent and the next page (if `continuation_token` is set) is due.
    Paged {
        buffer: Vec<ObjectMeta>,
        index: usize,
        continuation_token: Option<String>,
    },
    /// The service reported no further pages and the buffer is spent.
    Terminal,
}

/// Lazy, single-pass listing of every object under `bucket`/`prefix`.
///
/// Pages are fetched on demand from `has_next`. The cursor is finite and not
/// restartable; build a new one to list again.
pub struct S3ObjectIterator<L = Client> {
    lister: L,
    bucket: String,
    prefix: String,
    page_size: i32,
    cursor: Cursor,
    pages_fetched: usize,
}

impl<L: ObjectLister> S3ObjectIterator<L> {
    pub fn new(lister: L, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            lister,
            bucket: bucket.into(),
            prefix: prefix.into(),
            page_size: DEFAULT_PAGE_SIZE,
            cursor: Cursor::Fresh,
            pages_fetched: 0,
        }
    }

    /// Entries requested per page, clamped to what ListObjectsV2 accepts.
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Number of pages requested from the service so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Whether another entry is available, fetching pages as needed.
    ///
    /// Listing errors propagate unchanged and leave the cursor where it was,
    /// so a later call retries the same page.
    pub async fn has_next(&mut self) -> Result<bool, StorageError> {
        loop {
            match &self.cursor {
                Cursor::Terminal => return Ok(false),
                Cursor::Paged { buffer, index, .. } if *index < buffer.len() => return Ok(true),
                Cursor::Paged {
                    continuation_token: None,
                    ..
                } => {
                    self.cursor = Cursor::Terminal;
                    return Ok(false);
                }
                Cursor::Fresh | Cursor::Paged { .. } => self.fetch_next_page().await?,
            }
        }
    }

    /// Return the next entry, or [`StorageError::ExhaustedIterator`] once the
    /// listing is spent.
    pub async fn next(&mut self) -> Result<ObjectMeta, StorageError> {
        if self.has_next().await?
            && let Cursor::Paged { buffer, index, .. } = &mut self.cursor
        {
            let entry = buffer[*index].clone();
            *index += 1;
            return Ok(entry);
        }

        Err(StorageError::ExhaustedIterator {
            bucket: self.bucket.clone(),
            prefix: self.prefix.clone(),
        })
    }

    /// Drain the remaining entries into a `Vec`.
    pub async fn collect_all(mut self) -> Result<Vec<ObjectMeta>, StorageError> {
        let mut entries = Vec::new();
        while self.has_next().await? {
            entries.push(self.next().await?);
        }
        Ok(entries)
    }

    /// Adapt the cursor into a `Stream`. Ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<ObjectMeta, StorageError>> {
        futures::stream::try_unfold(self, |mut iter| async move {
            if !iter.has_next().await? {
                return Ok(None);
            }
            let entry = iter.next().await?;
            Ok::<_, StorageError>(Some((entry, iter)))
        })
    }

    /// Fetch one page and move the cursor.
    ///
    /// A non-empty page replaces the buffer wholesale. An empty page keeps
    /// the spent buffer as is (never replayed): with a token the cursor stays
    /// due for another fetch, without one it becomes terminal.
    async fn fetch_next_page(&mut self) -> Result<(), StorageError> {
        let continuation_token = match &self.cursor {
            Cursor::Paged {
                continuation_token, ..
            } => continuation_token.clone(),
            Cursor::Fresh | Cursor::Terminal => None,
        };
        let request = ListRequest {
            bucket: self.bucket.clone(),
            prefix: self.prefix.clone(),
            continuation_token,
            max_keys: self.page_size,
        };

        let page = self.lister.list_page(&request).await?;
        self.pages_fetched += 1;
        tracing::debug!(
            bucket = %self.bucket,
            prefix = %self.prefix,
            page = self.pages_fetched,
            entries = page.entries.len(),
            more = page.next_continuation_token.is_some(),
            "fetched listing page"
        );

        let previous = std::mem::replace(&mut self.cursor, Cursor::Fresh);
        self.cursor = match (page.entries.is_empty(), page.next_continuation_token) {
            (false, continuation_token) => Cursor::Paged {
                buffer: page.entries,
                index: 0,
                continuation_token,
            },
            (true, None) => Cursor::Terminal,
            (true, Some(token)) => match previous {
                Cursor::Paged { buffer, index, .. } => Cursor::Paged {
                    buffer,
                    index,
                    continuation_token: Some(token),
                },
                Cursor::Fresh | Cursor::Terminal => Cursor::Paged {
                    buffer: Vec::new(),
                    index: 0,
                    continuation_token: Some(token),
                },
            },
        };

        Ok(())
    }
}
