use aws_sdk_s3::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use strata_core::S3BackendConfig;
use strata_core::aws::build_sdk_config;

use crate::error::StorageError;
use crate::iterator::S3ObjectIterator;
use crate::objects;

/// File storage rooted at `s3://bucket/prefix`.
///
/// Paths are relative to the prefix; listing yields full object keys, which
/// [`S3FileBackend::relative_path`] maps back.
#[derive(Clone)]
pub struct S3FileBackend {
    client: Client,
    bucket: String,
    prefix: String,
    page_size: i32,
}

impl S3FileBackend {
    pub fn new(client: Client, config: &S3BackendConfig) -> Self {
        Self {
            client,
            bucket: config.bucket.clone(),
            prefix: config.prefix.trim_matches('/').to_string(),
            page_size: config.page_size,
        }
    }

    /// Build the S3 client from the config's AWS settings.
    ///
    /// Custom endpoints (MinIO, LocalStack) get path-style addressing.
    pub async fn from_config(config: &S3BackendConfig) -> Result<Self, StorageError> {
        config.validate()?;
        let sdk_config = build_sdk_config(&config.aws).await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.aws.endpoint.is_some())
            .build();
        Ok(Self::new(Client::from_conf(s3_config), config))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full object key for a backend-relative path.
    pub fn key_for(&self, path: &str) -> String {
        join_key(&self.prefix, path)
    }

    /// Strip the backend prefix from a listed key.
    pub fn relative_path<'a>(&self, key: &'a str) -> &'a str {
        if self.prefix.is_empty() {
            return key;
        }
        key.strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(key)
    }

    pub async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let key = self.key_for(path);
        let output = objects::get_object(&self.client, &self.bucket, &key).await?;
        tracing::debug!(
            bucket = %self.bucket,
            key = %key,
            bytes = output.body.len(),
            "read object"
        );
        Ok(output.body)
    }

    /// Write `body` at `path`. Returns the new ETag.
    pub async fn write(
        &self,
        path: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<String, StorageError> {
        let key = self.key_for(path);
        let etag =
            objects::put_object(&self.client, &self.bucket, &key, body, content_type, None).await?;
        tracing::debug!(bucket = %self.bucket, key = %key, etag = %etag, "wrote object");
        Ok(etag)
    }

    pub async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let key = self.key_for(path);
        objects::delete_object(&self.client, &self.bucket, &key).await?;
        tracing::debug!(bucket = %self.bucket, key = %key, "deleted object");
        Ok(())
    }

    pub async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        objects::object_exists(&self.client, &self.bucket, &self.key_for(path)).await
    }

    /// Lazily list everything under `sub_prefix` (relative to the backend
    /// prefix). Pass `""` for the whole backend.
    pub fn list(&self, sub_prefix: &str) -> S3ObjectIterator<Client> {
        S3ObjectIterator::new(
            self.client.clone(),
            self.bucket.clone(),
            self.key_for(sub_prefix),
        )
        .with_page_size(self.page_size)
    }

    /// Load a JSON document. Returns the value and its ETag.
    pub async fn read_json<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<(T, String), StorageError> {
        let output = objects::get_object(&self.client, &self.bucket, &self.key_for(path)).await?;
        let value: T = serde_json::from_slice(&output.body)?;
        Ok((value, output.etag.unwrap_or_default()))
    }

    /// Save a JSON document. Returns the new ETag.
    pub async fn write_json<T: Serialize>(
        &self,
        path: &str,
        value: &T,
    ) -> Result<String, StorageError> {
        let body = serde_json::to_vec_pretty(value)?;
        self.write(path, body, Some("application/json")).await
    }

    /// Save a JSON document only if the stored ETag still equals
    /// `expected_etag`.
    pub async fn write_json_if_match<T: Serialize>(
        &self,
        path: &str,
        value: &T,
        expected_etag: &str,
    ) -> Result<String, StorageError> {
        let body = serde_json::to_vec_pretty(value)?;
        objects::put_object(
            &self.client,
            &self.bucket,
            &self.key_for(path),
            body,
            Some("application/json"),
            Some(expected_etag),
        )
        .await
    }
}

fn join_key(prefix: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (false, true) => format!("{prefix}/"),
        (false, false) => format!("{prefix}/{path}"),
    }
}
