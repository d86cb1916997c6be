use crate::{ByteStream, ObjectStore, StoreError, StoredObject};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream as S3Body;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tracing::{debug, info, warn};

/// S3 requires every part but the last to be at least 5 MiB.
const PART_SIZE: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn from_endpoint(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: impl Into<String>,
    ) -> Self {
        let credentials = aws_sdk_s3::config::Credentials::new(
            access_key,
            secret_key,
            None,
            None,
            "airgrid-static",
        );
        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version_latest()
            .region(aws_sdk_s3::config::Region::new(region.to_string()))
            .endpoint_url(endpoint.to_string())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self::new(Client::from_conf(config), bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Creates the bucket when it does not exist yet.
    pub async fn ensure_bucket(&self) -> Result<(), StoreError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(()),
            Err(error) if is_not_found_code(service_code(&error)) => {
                self.client
                    .create_bucket()
                    .bucket(&self.bucket)
                    .send()
                    .await
                    .map_err(|e| {
                        StoreError::Other(format!("create bucket {} failed: {e}", self.bucket))
                    })?;
                info!(bucket = %self.bucket, "created missing bucket");
                Ok(())
            }
            Err(error) => Err(StoreError::Other(format!(
                "head bucket {} failed: {error}",
                self.bucket
            ))),
        }
    }

    async fn upload_and_complete(
        &self,
        key: &str,
        upload_id: &str,
        mut body: ByteStream,
    ) -> Result<StoredObject, StoreError> {
        let mut parts = Vec::new();
        let mut buffer = BytesMut::with_capacity(PART_SIZE);
        let mut size = 0u64;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| StoreError::Source {
                key: key.to_string(),
                message: e.to_string(),
            })?;
            size += chunk.len() as u64;
            buffer.extend_from_slice(&chunk);
            while buffer.len() >= PART_SIZE {
                let part_number = next_part_number(&parts);
                let part = buffer.split_to(PART_SIZE).freeze();
                parts.push(self.upload_part(key, upload_id, part_number, part).await?);
            }
        }
        drop(body);

        // An empty payload still needs one (empty) part to complete.
        if !buffer.is_empty() || parts.is_empty() {
            let part_number = next_part_number(&parts);
            parts.push(
                self.upload_part(key, upload_id, part_number, buffer.freeze())
                    .await?,
            );
        }

        let response = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .if_none_match("*")
            .send()
            .await
            .map_err(|e| map_complete_error(key, &e))?;

        let etag = response
            .e_tag()
            .map(|value| value.trim_matches('"').to_string())
            .unwrap_or_default();
        Ok(StoredObject {
            key: key.to_string(),
            size,
            etag,
        })
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<CompletedPart, StoreError> {
        debug!(key, part_number, bytes = body.len(), "uploading part");
        let response = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(S3Body::from(body))
            .send()
            .await
            .map_err(|e| {
                StoreError::Other(format!(
                    "upload part {part_number} failed for {key}: {e}"
                ))
            })?;

        Ok(CompletedPart::builder()
            .set_e_tag(response.e_tag().map(str::to_string))
            .part_number(part_number)
            .build())
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_stream(&self, key: &str, body: ByteStream) -> Result<StoredObject, StoreError> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/octet-stream")
            .send()
            .await
            .map_err(|e| {
                StoreError::Other(format!("create multipart upload failed for {key}: {e}"))
            })?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| {
                StoreError::Other(format!("multipart upload for {key} returned no upload id"))
            })?
            .to_string();

        match self.upload_and_complete(key, &upload_id, body).await {
            Ok(stored) => Ok(stored),
            Err(error) => {
                if let Err(abort_error) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(key, error = %abort_error, "failed to abort multipart upload");
                }
                Err(error)
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if is_not_found_code(service_code(&e)) {
                    StoreError::NotFound(key.to_string())
                } else {
                    StoreError::Other(format!("get object failed for {key}: {e}"))
                }
            })?;

        let collected = response
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Other(format!("failed to read body stream: {e}")))?;
        Ok(collected.into_bytes())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(error) if is_not_found_code(service_code(&error)) => Ok(false),
            Err(error) => Err(StoreError::Other(format!(
                "head object failed for {key}: {error}"
            ))),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut continuation: Option<String> = None;
        let mut keys = Vec::new();

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(token) = continuation.as_ref() {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| StoreError::Other(format!("list failed: {e}")))?;

            for object in response.contents() {
                if let Some(key) = object.key() {
                    keys.push(key.to_string());
                }
            }

            if response.is_truncated().unwrap_or(false) {
                continuation = response
                    .next_continuation_token()
                    .map(std::string::ToString::to_string);
            } else {
                break;
            }
        }

        Ok(keys)
    }
}

fn next_part_number(parts: &[CompletedPart]) -> i32 {
    i32::try_from(parts.len() + 1).unwrap_or(i32::MAX)
}

fn service_code<E: ProvideErrorMetadata>(error: &SdkError<E>) -> Option<&str> {
    error
        .as_service_error()
        .and_then(ProvideErrorMetadata::code)
}

fn map_complete_error<E: ProvideErrorMetadata + std::error::Error + 'static>(
    key: &str,
    error: &SdkError<E>,
) -> StoreError {
    if is_precondition_failed_code(service_code(error)) {
        return StoreError::AlreadyExists(key.to_string());
    }
    StoreError::Other(format!("complete multipart upload failed for {key}: {error}"))
}

fn is_not_found_code(code: Option<&str>) -> bool {
    matches!(code, Some("NotFound" | "NoSuchKey" | "NoSuchBucket"))
}

fn is_precondition_failed_code(code: Option<&str>) -> bool {
    matches!(
        code,
        Some("PreconditionFailed" | "ConditionalRequestConflict")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_classification_matches_expected_values() {
        assert!(is_not_found_code(Some("NoSuchKey")));
        assert!(is_not_found_code(Some("NotFound")));
        assert!(is_not_found_code(Some("NoSuchBucket")));
        assert!(!is_not_found_code(Some("AccessDenied")));
        assert!(!is_not_found_code(None));

        assert!(is_precondition_failed_code(Some("PreconditionFailed")));
        assert!(is_precondition_failed_code(Some(
            "ConditionalRequestConflict"
        )));
        assert!(!is_precondition_failed_code(Some("NoSuchKey")));
    }

    #[test]
    fn part_numbers_start_at_one() {
        assert_eq!(next_part_number(&[]), 1);
        let parts = vec![CompletedPart::builder().part_number(1).build()];
        assert_eq!(next_part_number(&parts), 2);
    }
}
