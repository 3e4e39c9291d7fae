//! Upload engine
//!
//! Transfers pairs one after another in enumeration order. A key that
//! already exists in the bucket is skipped without comparing content. Files
//! larger than the multipart threshold are sent as numbered parts.

use crate::enumerate::TransferPair;
use crate::error::Result;
use crate::progress::TransferProgress;
use crate::store::{ObjectStore, UploadedPart};
use std::fmt;
use tokio::fs;
use tokio::io::AsyncReadExt;

/// Files strictly larger than this many bytes use multipart transfer
pub const MULTIPART_THRESHOLD: u64 = 20_000_000;

/// Size of every multipart part except the last
pub const PART_SIZE: u64 = 6_000_000;

/// Transfer tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    pub multipart_threshold: u64,
    pub part_size: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            multipart_threshold: MULTIPART_THRESHOLD,
            part_size: PART_SIZE,
        }
    }
}

impl UploadPolicy {
    pub fn uses_multipart(&self, size: u64) -> bool {
        size > self.multipart_threshold
    }

    /// Number of parts a multipart transfer of `size` bytes takes
    pub fn part_count(&self, size: u64) -> u64 {
        size.div_ceil(self.part_size.max(1))
    }
}

/// Outcome of one upload pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadStats {
    /// Objects transferred (single and multipart)
    pub uploaded: usize,
    /// Objects whose key already existed
    pub skipped: usize,
    /// Objects transferred as multipart
    pub multipart: usize,
    /// Bytes transferred
    pub bytes: u64,
}

impl fmt::Display for UploadStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} uploaded ({} multipart), {} skipped, {} bytes",
            self.uploaded, self.multipart, self.skipped, self.bytes
        )
    }
}

/// Runs upload passes against a session
#[derive(Debug, Clone, Default)]
pub struct Uploader {
    policy: UploadPolicy,
    show_progress: bool,
}

impl Uploader {
    pub fn new(policy: UploadPolicy) -> Self {
        Self {
            policy,
            show_progress: false,
        }
    }

    /// Draw a progress bar for multipart transfers
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Upload every pair that is not already present
    ///
    /// Stops at the first failure. Objects uploaded before the failure stay
    /// in the bucket, so a retry only sends what is still missing.
    pub async fn upload(
        &self,
        store: &dyn ObjectStore,
        pairs: &[TransferPair],
    ) -> Result<UploadStats> {
        let mut stats = UploadStats::default();

        for pair in pairs {
            let key = pair.destination_key.as_str();

            if store.key_exists(key).await? {
                tracing::debug!("Skipping s3://{}/{}: already exists", store.bucket(), key);
                stats.skipped += 1;
                continue;
            }

            let size = fs::metadata(&pair.source_path).await?.len();
            if self.policy.uses_multipart(size) {
                self.upload_multipart(store, pair, size).await?;
                stats.multipart += 1;
            } else {
                let body = fs::read(&pair.source_path).await?;
                store.put_object(key, body).await?;
            }

            stats.uploaded += 1;
            stats.bytes += size;
        }

        tracing::info!("Upload to s3://{} finished: {}", store.bucket(), stats);
        Ok(stats)
    }

    async fn upload_multipart(
        &self,
        store: &dyn ObjectStore,
        pair: &TransferPair,
        size: u64,
    ) -> Result<()> {
        let key = pair.destination_key.as_str();
        let upload_id = store.create_multipart_upload(key).await?;
        let progress = TransferProgress::new(key, size, self.show_progress);

        tracing::debug!(
            "Started multipart upload {} for s3://{}/{} ({} parts)",
            upload_id,
            store.bucket(),
            key,
            self.policy.part_count(size)
        );

        match self.send_parts(store, pair, &upload_id, size, &progress).await {
            Ok(()) => {
                progress.finish_success();
                Ok(())
            }
            Err(err) => {
                progress.finish_error(&err.to_string());
                if let Err(abort_err) = store.abort_multipart_upload(key, &upload_id).await {
                    tracing::warn!(
                        "Failed to abort multipart upload {} for {}: {}",
                        upload_id,
                        key,
                        abort_err
                    );
                }
                Err(err)
            }
        }
    }

    async fn send_parts(
        &self,
        store: &dyn ObjectStore,
        pair: &TransferPair,
        upload_id: &str,
        size: u64,
        progress: &TransferProgress,
    ) -> Result<()> {
        let key = pair.destination_key.as_str();
        let mut file = fs::File::open(&pair.source_path).await?;
        let mut parts: Vec<UploadedPart> = Vec::new();
        let mut part_number: i32 = 1;

        loop {
            let mut chunk = Vec::new();
            (&mut file)
                .take(self.policy.part_size)
                .read_to_end(&mut chunk)
                .await?;
            if chunk.is_empty() {
                break;
            }

            let len = chunk.len() as u64;
            let part = store.upload_part(key, upload_id, part_number, chunk).await?;
            parts.push(part);
            progress.advance(len);
            tracing::debug!(
                "Sent part {} of {} ({}/{} bytes)",
                part_number,
                key,
                progress.position(),
                size
            );
            part_number += 1;
        }

        store.complete_multipart_upload(key, upload_id, parts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryStore, StoreOp};
    use std::path::Path;

    fn pair(path: &Path, key: &str) -> TransferPair {
        TransferPair {
            source_path: path.to_path_buf(),
            destination_key: key.to_string(),
        }
    }

    fn small_policy() -> UploadPolicy {
        UploadPolicy {
            multipart_threshold: 10,
            part_size: 4,
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = UploadPolicy::default();
        assert!(!policy.uses_multipart(20_000_000));
        assert!(policy.uses_multipart(20_000_001));
        assert_eq!(policy.part_count(20_000_001), 4);
    }

    #[tokio::test]
    async fn test_existing_key_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "new content").unwrap();

        let store = MemoryStore::new("assets");
        store.insert("a.txt", "old content");

        let stats = Uploader::default()
            .upload(&store, &[pair(&file, "a.txt")])
            .await
            .unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.uploaded, 0);
        assert_eq!(store.object("a.txt"), Some(b"old content".to_vec()));
    }

    #[tokio::test]
    async fn test_multipart_parts_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.bin");
        std::fs::write(&file, b"0123456789A").unwrap();

        let store = MemoryStore::new("assets");
        let stats = Uploader::new(small_policy())
            .upload(&store, &[pair(&file, "big.bin")])
            .await
            .unwrap();

        assert_eq!(stats.multipart, 1);
        assert_eq!(stats.bytes, 11);
        assert_eq!(store.part_count(), 3);
        assert_eq!(store.put_count(), 0);
        assert_eq!(store.object("big.bin"), Some(b"0123456789A".to_vec()));

        let numbers: Vec<i32> = store
            .operations()
            .into_iter()
            .filter_map(|op| match op {
                StoreOp::UploadPart { part_number, .. } => Some(part_number),
                _ => None,
            })
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_failed_multipart_is_aborted() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.bin");
        std::fs::write(&file, b"0123456789A").unwrap();

        let store = MemoryStore::new("assets");
        store.fail_write_at(2);

        let result = Uploader::new(small_policy())
            .upload(&store, &[pair(&file, "big.bin")])
            .await;
        assert!(result.is_err());
        assert!(store.object("big.bin").is_none());
        assert_eq!(store.pending_uploads(), 0);
        assert!(
            store
                .operations()
                .contains(&StoreOp::AbortMultipart("big.bin".to_string()))
        );
    }

    #[test]
    fn test_stats_display() {
        let stats = UploadStats {
            uploaded: 3,
            skipped: 2,
            multipart: 1,
            bytes: 42,
        };
        assert_eq!(stats.to_string(), "3 uploaded (1 multipart), 2 skipped, 42 bytes");
    }
}
