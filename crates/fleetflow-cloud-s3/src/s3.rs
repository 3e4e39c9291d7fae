//! S3 session
//!
//! [`ObjectStore`] over the AWS SDK. Every SDK error is mapped to an
//! [`S3Error`] carrying the bucket and key it concerned.

use crate::error::{Result, S3Error};
use crate::store::{DELETE_BATCH_SIZE, ObjectStore, UploadedPart};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Error;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, Delete, ObjectIdentifier};

/// Session bound to one bucket
#[derive(Debug, Clone)]
pub struct S3Session {
    client: Client,
    bucket: String,
}

impl S3Session {
    /// Open a session, checking that the bucket exists and is reachable
    ///
    /// # Errors
    ///
    /// - [`S3Error::BucketMissing`] if the bucket does not exist
    /// - [`S3Error::AuthenticationFailed`] if the store rejects the keys
    /// - [`S3Error::Connectivity`] on any other failure
    pub async fn open(client: Client, bucket: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();

        match client.head_bucket().bucket(&bucket).send().await {
            Ok(_) => {
                tracing::debug!("Opened session for bucket {}", bucket);
                Ok(Self { client, bucket })
            }
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    return Err(S3Error::BucketMissing(bucket));
                }
                match err.raw_response().map(|r| r.status().as_u16()) {
                    Some(401 | 403) => Err(S3Error::AuthenticationFailed(format!(
                        "access to bucket '{}' denied: {}",
                        bucket,
                        DisplayErrorContext(&err)
                    ))),
                    _ => Err(S3Error::Connectivity(format!(
                        "bucket '{}': {}",
                        bucket,
                        DisplayErrorContext(&err)
                    ))),
                }
            }
        }
    }

    fn transfer_error<E>(&self, key: &str, err: E) -> S3Error
    where
        E: std::error::Error,
    {
        S3Error::transfer(&self.bucket, key, DisplayErrorContext(&err))
    }
}

/// Token for the next listing page
///
/// A truncated page without a continuation token ends the listing instead
/// of requesting the first page again.
fn next_page_token(is_truncated: Option<bool>, token: Option<&str>) -> Option<String> {
    match (is_truncated, token) {
        (Some(true), Some(token)) if !token.is_empty() => Some(token.to_string()),
        _ => None,
    }
}

#[async_trait]
impl ObjectStore for S3Session {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn bucket_location(&self) -> Result<String> {
        let output = self
            .client
            .get_bucket_location()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| self.transfer_error("", e))?;

        Ok(output
            .location_constraint()
            .map(|c| c.as_str().to_string())
            .unwrap_or_default())
    }

    async fn key_exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(HeadObjectError::is_not_found)
                {
                    return Ok(false);
                }
                Err(self.transfer_error(key, err))
            }
        }
    }

    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| self.transfer_error(key, e))?;
        Ok(())
    }

    async fn create_multipart_upload(&self, key: &str) -> Result<String> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| self.transfer_error(key, e))?;

        output
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| S3Error::transfer(&self.bucket, key, "no upload id returned"))
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<UploadedPart> {
        let output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| self.transfer_error(key, e))?;

        let e_tag = output.e_tag().ok_or_else(|| {
            S3Error::transfer(
                &self.bucket,
                key,
                format!("no ETag returned for part {}", part_number),
            )
        })?;

        Ok(UploadedPart {
            part_number,
            e_tag: e_tag.to_string(),
        })
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<()> {
        let parts = parts
            .into_iter()
            .map(|p| {
                CompletedPart::builder()
                    .part_number(p.part_number)
                    .e_tag(p.e_tag)
                    .build()
            })
            .collect();

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|e| self.transfer_error(key, e))?;
        Ok(())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| self.transfer_error(key, e))?;
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let output = match request.send().await {
                Ok(output) => output,
                Err(err) => {
                    if err
                        .as_service_error()
                        .is_some_and(ListObjectsV2Error::is_no_such_bucket)
                    {
                        return Err(S3Error::BucketMissing(self.bucket.clone()));
                    }
                    return Err(self.transfer_error(prefix, err));
                }
            };

            keys.extend(
                output
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(str::to_string)),
            );

            continuation_token =
                next_page_token(output.is_truncated(), output.next_continuation_token());
            if continuation_token.is_none() {
                break;
            }
        }

        tracing::debug!(
            "Found {} objects under s3://{}/{}",
            keys.len(),
            self.bucket,
            prefix
        );
        Ok(keys)
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<()> {
        for batch in keys.chunks(DELETE_BATCH_SIZE) {
            let objects = batch
                .iter()
                .map(|key| {
                    ObjectIdentifier::builder()
                        .key(key)
                        .build()
                        .map_err(|e| self.transfer_error(key, e))
                })
                .collect::<Result<Vec<_>>>()?;

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|e| self.transfer_error("", e))?;

            let output = self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| self.transfer_error("", e))?;

            if let Some(failed) = output.errors().first() {
                return Err(S3Error::transfer(
                    &self.bucket,
                    failed.key().unwrap_or_default(),
                    failed.message().unwrap_or("delete failed"),
                ));
            }
        }
        Ok(())
    }
}
