//! Object storage session abstraction
//!
//! A session is bound to one bucket. [`crate::s3::S3Session`] talks to S3;
//! `MemoryStore` (test builds only) keeps objects in memory and records every
//! call, which is what the convergence tests run against.

use crate::error::Result;
use async_trait::async_trait;

/// Maximum number of keys per `DeleteObjects` request
pub const DELETE_BATCH_SIZE: usize = 1000;

/// A part accepted by the store during a multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPart {
    pub part_number: i32,
    pub e_tag: String,
}

/// Bucket-scoped object storage operations
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket this session is bound to
    fn bucket(&self) -> &str;

    /// Location constraint of the bucket ("" for us-east-1)
    async fn bucket_location(&self) -> Result<String>;

    /// Whether an object exists under `key`
    async fn key_exists(&self, key: &str) -> Result<bool>;

    /// Single-request upload of a whole object
    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<()>;

    /// Start a multipart upload and return its upload id
    async fn create_multipart_upload(&self, key: &str) -> Result<String>;

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<UploadedPart>;

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<()>;

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<()>;

    /// All keys starting with `prefix`
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Delete keys, at most [`DELETE_BATCH_SIZE`] per call
    async fn delete_keys(&self, keys: &[String]) -> Result<()>;
}
