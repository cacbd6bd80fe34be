use aws_sdk_s3::Client;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use strata_core::format_err_chain;

use crate::error::StorageError;

/// A fetched object: its bytes and the ETag to pass back on a conditional
/// write.
#[derive(Debug, Clone)]
pub struct FetchedObject {
    pub body: Vec<u8>,
    pub etag: Option<String>,
    pub content_type: Option<String>,
}

/// Fetch an object. A missing key is [`StorageError::NotFound`].
pub async fn get_object(
    client: &Client,
    bucket: &str,
    key: &str,
) -> Result<FetchedObject, StorageError> {
    let resp = match client.get_object().bucket(bucket).key(key).send().await {
        Ok(resp) => resp,
        Err(e) => {
            let err = e.into_service_error();
            if err.is_no_such_key() {
                return Err(StorageError::NotFound {
                    key: key.to_string(),
                });
            }
            return Err(StorageError::GetObject(format_err_chain(&err)));
        }
    };

    let etag = resp.e_tag().map(str::to_string);
    let content_type = resp.content_type().map(str::to_string);
    let bytes = resp.body.collect().await.map_err(|e| {
        StorageError::GetObject(format!("reading body of {key}: {}", format_err_chain(&e)))
    })?;

    Ok(FetchedObject {
        body: bytes.to_vec(),
        etag,
        content_type,
    })
}

/// Put an object to S3. Returns the new ETag.
///
/// With `expected_etag` set the write carries an `If-Match` precondition
/// and fails with [`StorageError::PreconditionFailed`] when the stored
/// object has moved on.
pub async fn put_object(
    client: &Client,
    bucket: &str,
    key: &str,
    body: Vec<u8>,
    content_type: Option<&str>,
    expected_etag: Option<&str>,
) -> Result<String, StorageError> {
    let resp = client
        .put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(body))
        .set_content_type(content_type.map(str::to_string))
        .set_if_match(expected_etag.map(str::to_string))
        .send()
        .await
        .map_err(|e| {
            let err = e.into_service_error();
            // S3 has no typed variant for 412; it only shows up in the code
            if err.code() == Some("PreconditionFailed") {
                StorageError::PreconditionFailed {
                    key: key.to_string(),
                }
            } else {
                StorageError::PutObject(format_err_chain(&err))
            }
        })?;

    Ok(resp.e_tag().unwrap_or_default().to_string())
}

/// Delete an object from S3. Deleting a missing key succeeds.
pub async fn delete_object(client: &Client, bucket: &str, key: &str) -> Result<(), StorageError> {
    client
        .delete_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| StorageError::DeleteObject(format_err_chain(&e.into_service_error())))?;

    Ok(())
}

/// Check whether an object exists.
pub async fn object_exists(client: &Client, bucket: &str, key: &str) -> Result<bool, StorageError> {
    match client.head_object().bucket(bucket).key(key).send().await {
        Ok(_) => Ok(true),
        Err(e) => {
            let err = e.into_service_error();
            if err.is_not_found() {
                Ok(false)
            } else {
                Err(StorageError::HeadObject(format_err_chain(&err)))
            }
        }
    }
}
