//! In-memory object store
//!
//! Keeps objects in memory and records every call made against it. Clones
//! share the same bucket, so a test can hand one clone to the resource and
//! inspect another.

use crate::connector::{ConnectRequest, StorageConnector};
use crate::error::{Result, S3Error};
use crate::store::{ObjectStore, UploadedPart};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// A call recorded by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    KeyExists(String),
    Put { key: String, size: usize },
    CreateMultipart(String),
    UploadPart { key: String, part_number: i32, size: usize },
    CompleteMultipart { key: String, parts: usize },
    AbortMultipart(String),
    List(String),
    Delete(Vec<String>),
}

#[derive(Debug, Default)]
struct Pending {
    key: String,
    parts: BTreeMap<i32, Vec<u8>>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<String, Vec<u8>>,
    pending: HashMap<String, Pending>,
    ops: Vec<StoreOp>,
    missing: bool,
    location: String,
    /// Fail the Nth object write (puts and parts counted together, from 1)
    fail_write_at: Option<usize>,
    writes: usize,
    next_upload: usize,
}

/// Bucket kept in memory
#[derive(Debug, Clone)]
pub struct MemoryStore {
    bucket: String,
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Location constraint reported by [`ObjectStore::bucket_location`]
    pub fn with_location(self, location: impl Into<String>) -> Self {
        self.lock().location = location.into();
        self
    }

    /// Make the bucket behave as if it had been deleted
    pub fn set_missing(&self, missing: bool) {
        self.lock().missing = missing;
    }

    /// Fail the `n`th object write from now on (puts and parts, from 1)
    pub fn fail_write_at(&self, n: usize) {
        let mut inner = self.lock();
        inner.writes = 0;
        inner.fail_write_at = Some(n);
    }

    pub fn clear_failure(&self) {
        self.lock().fail_write_at = None;
    }

    /// Store an object directly, without recording an operation
    pub fn insert(&self, key: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.lock().objects.insert(key.into(), body.into());
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    pub fn operations(&self) -> Vec<StoreOp> {
        self.lock().ops.clone()
    }

    pub fn clear_operations(&self) {
        self.lock().ops.clear();
    }

    /// Number of single-request puts recorded
    pub fn put_count(&self) -> usize {
        self.count(|op| matches!(op, StoreOp::Put { .. }))
    }

    /// Number of multipart parts recorded
    pub fn part_count(&self) -> usize {
        self.count(|op| matches!(op, StoreOp::UploadPart { .. }))
    }

    /// Multipart uploads started but neither completed nor aborted
    pub fn pending_uploads(&self) -> usize {
        self.lock().pending.len()
    }

    fn count(&self, pred: impl Fn(&StoreOp) -> bool) -> usize {
        self.lock().ops.iter().filter(|op| pred(op)).count()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_bucket(&self, inner: &Inner) -> Result<()> {
        if inner.missing {
            return Err(S3Error::BucketMissing(self.bucket.clone()));
        }
        Ok(())
    }

    fn register_write(&self, inner: &mut Inner, key: &str) -> Result<()> {
        inner.writes += 1;
        if inner.fail_write_at == Some(inner.writes) {
            return Err(S3Error::transfer(&self.bucket, key, "connection reset"));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn bucket_location(&self) -> Result<String> {
        let inner = self.lock();
        self.check_bucket(&inner)?;
        Ok(inner.location.clone())
    }

    async fn key_exists(&self, key: &str) -> Result<bool> {
        let mut inner = self.lock();
        self.check_bucket(&inner)?;
        inner.ops.push(StoreOp::KeyExists(key.to_string()));
        Ok(inner.objects.contains_key(key))
    }

    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let mut inner = self.lock();
        self.check_bucket(&inner)?;
        self.register_write(&mut inner, key)?;
        inner.ops.push(StoreOp::Put {
            key: key.to_string(),
            size: body.len(),
        });
        inner.objects.insert(key.to_string(), body);
        Ok(())
    }

    async fn create_multipart_upload(&self, key: &str) -> Result<String> {
        let mut inner = self.lock();
        self.check_bucket(&inner)?;
        inner.next_upload += 1;
        let upload_id = format!("upload-{}", inner.next_upload);
        inner.pending.insert(
            upload_id.clone(),
            Pending {
                key: key.to_string(),
                parts: BTreeMap::new(),
            },
        );
        inner.ops.push(StoreOp::CreateMultipart(key.to_string()));
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<UploadedPart> {
        let mut inner = self.lock();
        self.check_bucket(&inner)?;
        self.register_write(&mut inner, key)?;
        inner.ops.push(StoreOp::UploadPart {
            key: key.to_string(),
            part_number,
            size: body.len(),
        });
        let pending = inner
            .pending
            .get_mut(upload_id)
            .filter(|p| p.key == key)
            .ok_or_else(|| S3Error::transfer(&self.bucket, key, "no such upload"))?;
        pending.parts.insert(part_number, body);
        Ok(UploadedPart {
            part_number,
            e_tag: format!("\"{}-{}\"", upload_id, part_number),
        })
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<()> {
        let mut inner = self.lock();
        self.check_bucket(&inner)?;
        let pending = inner
            .pending
            .remove(upload_id)
            .ok_or_else(|| S3Error::transfer(&self.bucket, key, "no such upload"))?;

        let mut body = Vec::new();
        for part in &parts {
            let chunk = pending.parts.get(&part.part_number).ok_or_else(|| {
                S3Error::transfer(
                    &self.bucket,
                    key,
                    format!("part {} was never uploaded", part.part_number),
                )
            })?;
            body.extend_from_slice(chunk);
        }

        inner.ops.push(StoreOp::CompleteMultipart {
            key: key.to_string(),
            parts: parts.len(),
        });
        inner.objects.insert(pending.key, body);
        Ok(())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.pending.remove(upload_id);
        inner.ops.push(StoreOp::AbortMultipart(key.to_string()));
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut inner = self.lock();
        self.check_bucket(&inner)?;
        inner.ops.push(StoreOp::List(prefix.to_string()));
        Ok(inner
            .objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<()> {
        let mut inner = self.lock();
        self.check_bucket(&inner)?;
        inner.ops.push(StoreOp::Delete(keys.to_vec()));
        for key in keys {
            inner.objects.remove(key);
        }
        Ok(())
    }
}

/// Connector handing out [`MemoryStore`] sessions
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    buckets: Arc<Mutex<HashMap<String, MemoryStore>>>,
    connects: Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bucket and return a handle sharing its contents
    pub fn add_bucket(&self, store: MemoryStore) -> MemoryStore {
        self.buckets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(store.bucket.clone(), store.clone());
        store
    }

    /// Number of sessions opened so far
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageConnector for MemoryConnector {
    async fn connect(&self, request: &ConnectRequest<'_>) -> Result<Box<dyn ObjectStore>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let store = self
            .buckets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(request.bucket_name)
            .cloned()
            .ok_or_else(|| S3Error::BucketMissing(request.bucket_name.to_string()))?;

        if store.lock().missing {
            return Err(S3Error::BucketMissing(request.bucket_name.to_string()));
        }
        Ok(Box::new(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_multipart_assembles_parts_in_order() {
        let store = MemoryStore::new("assets");
        let id = store.create_multipart_upload("big").await.unwrap();
        let one = store.upload_part("big", &id, 1, b"ab".to_vec()).await.unwrap();
        let two = store.upload_part("big", &id, 2, b"cd".to_vec()).await.unwrap();
        store
            .complete_multipart_upload("big", &id, vec![one, two])
            .await
            .unwrap();

        assert_eq!(store.object("big"), Some(b"abcd".to_vec()));
        assert_eq!(store.pending_uploads(), 0);
        assert_eq!(store.part_count(), 2);
    }

    #[tokio::test]
    async fn test_fail_write_at() {
        let store = MemoryStore::new("assets");
        store.fail_write_at(2);
        store.put_object("a", vec![1]).await.unwrap();
        assert!(store.put_object("b", vec![2]).await.is_err());
        store.put_object("c", vec![3]).await.unwrap();
        assert_eq!(store.keys(), vec!["a".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn test_connector_missing_bucket() {
        let connector = MemoryConnector::new();
        let request = ConnectRequest {
            bucket_name: "nope",
            region: "eu-west-1",
            access_key_id: "AKIA1",
        };
        let err = connector.connect(&request).await.err().unwrap();
        assert!(matches!(err, S3Error::BucketMissing(_)));
        assert_eq!(connector.connect_count(), 1);
    }
}
