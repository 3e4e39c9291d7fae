//! Bucket upload lifecycle
//!
//! [`BucketUpload`] moves one upload between `Missing` and `Up`. It holds the
//! last applied snapshot in memory; the caller persists it through
//! [`BucketUpload::record`] after a successful `create` and drops the record
//! after a successful `destroy`.

use crate::connector::{ConnectRequest, StorageConnector};
use crate::credentials::CredentialSource;
use crate::definition::{BucketUploadDefinition, UPLOAD_RESOURCE_TYPE};
use crate::enumerate::{enumerate, key_prefix};
use crate::error::{Result, S3Error};
use crate::region::region_to_s3_location;
use crate::source::SourceResolver;
use crate::store::ObjectStore;
use crate::upload::{UploadStats, Uploader};
use fleetflow_cloud::{Action, ActionType, ResourceState, ResourceStatus};
use serde_json::json;
use std::sync::Arc;

const ATTR_UPLOAD_ID: &str = "uploadId";
const ATTR_BUCKET_NAME: &str = "bucketName";
const ATTR_SOURCE: &str = "source";
const ATTR_PREFIX: &str = "prefix";
const ATTR_REGION: &str = "region";
const ATTR_ACCESS_KEY_ID: &str = "accessKeyId";

/// Last successfully applied snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketUploadState {
    pub status: ResourceStatus,
    pub upload_id: Option<String>,
    pub bucket_name: Option<String>,
    pub source: Option<String>,
    pub prefix: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
}

impl BucketUploadState {
    /// Snapshot of a definition that was just applied
    pub fn applied(defn: &BucketUploadDefinition) -> Self {
        Self {
            status: ResourceStatus::Up,
            upload_id: Some(defn.upload_id.clone()),
            bucket_name: Some(defn.bucket_name.clone()),
            source: Some(defn.source.clone()),
            prefix: Some(defn.prefix.clone()),
            region: Some(defn.region.clone()),
            access_key_id: defn.access_key_id.clone(),
        }
    }

    /// Load from a persisted record; no record means `Missing`
    pub fn load(record: Option<&ResourceState>) -> Self {
        let Some(record) = record else {
            return Self::default();
        };
        Self {
            status: record.status,
            upload_id: record.get_attribute(ATTR_UPLOAD_ID),
            bucket_name: record.get_attribute(ATTR_BUCKET_NAME),
            source: record.get_attribute(ATTR_SOURCE),
            prefix: record.get_attribute(ATTR_PREFIX),
            region: record.get_attribute(ATTR_REGION),
            access_key_id: record.get_attribute(ATTR_ACCESS_KEY_ID),
        }
    }

    pub fn to_resource_state(&self) -> ResourceState {
        let mut record = ResourceState::new(
            self.upload_id.clone().unwrap_or_default(),
            UPLOAD_RESOURCE_TYPE,
        )
        .with_status(self.status);

        let fields = [
            (ATTR_UPLOAD_ID, &self.upload_id),
            (ATTR_BUCKET_NAME, &self.bucket_name),
            (ATTR_SOURCE, &self.source),
            (ATTR_PREFIX, &self.prefix),
            (ATTR_REGION, &self.region),
            (ATTR_ACCESS_KEY_ID, &self.access_key_id),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                record.set_attribute(key, json!(value));
            }
        }
        record
    }

    pub fn is_up(&self) -> bool {
        self.status == ResourceStatus::Up
    }

    /// Fields of `defn` that differ from the snapshot and force a new pass
    fn drift(&self, defn: &BucketUploadDefinition) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.prefix.as_deref() != Some(defn.prefix.as_str()) {
            changed.push(ATTR_PREFIX);
        }
        if self.source.as_deref() != Some(defn.source.as_str()) {
            changed.push(ATTR_SOURCE);
        }
        changed
    }
}

/// Result of a `create` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Snapshot matched the definition, nothing was contacted
    Unchanged,
    /// An upload pass ran to completion
    Applied(UploadStats),
}

/// Read-only view of the remote side of an `Up` upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub bucket_exists: bool,
    /// Objects found under the applied prefix
    pub objects_under_prefix: usize,
    /// Location constraint reported by the bucket
    pub location: Option<String>,
    /// Whether `location` matches the applied region
    pub location_matches: bool,
}

/// Collaborators shared by every upload of a run
#[derive(Clone)]
pub struct BucketUploadContext {
    connector: Arc<dyn StorageConnector>,
    credentials: Arc<dyn CredentialSource>,
    sources: SourceResolver,
    uploader: Uploader,
}

impl BucketUploadContext {
    pub fn new(
        connector: Arc<dyn StorageConnector>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        Self {
            connector,
            credentials,
            sources: SourceResolver::default(),
            uploader: Uploader::default(),
        }
    }

    pub fn with_source_resolver(mut self, sources: SourceResolver) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_uploader(mut self, uploader: Uploader) -> Self {
        self.uploader = uploader;
        self
    }

    fn access_key_id(&self, explicit: Option<&str>) -> Result<String> {
        self.credentials.access_key_id(explicit).ok_or_else(|| {
            S3Error::InvalidConfig(
                "please set 'access-key-id', $EC2_ACCESS_KEY or $AWS_ACCESS_KEY_ID".to_string(),
            )
        })
    }
}

/// One bucket upload and its applied state
pub struct BucketUpload {
    name: String,
    state: BucketUploadState,
    ctx: BucketUploadContext,
}

impl BucketUpload {
    pub fn new(
        name: impl Into<String>,
        state: BucketUploadState,
        ctx: BucketUploadContext,
    ) -> Self {
        Self {
            name: name.into(),
            state,
            ctx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// State key of this upload
    pub fn key(&self) -> String {
        format!("{}:{}", UPLOAD_RESOURCE_TYPE, self.name)
    }

    pub fn state(&self) -> &BucketUploadState {
        &self.state
    }

    /// Record to persist, or `None` once the upload is `Missing`
    pub fn record(&self) -> Option<ResourceState> {
        self.state.is_up().then(|| self.state.to_resource_state())
    }

    /// What `create` would do with `defn`, without contacting anything
    pub fn plan(&self, defn: &BucketUploadDefinition) -> Action {
        if !self.state.is_up() {
            return Action::new(
                ActionType::Create,
                UPLOAD_RESOURCE_TYPE,
                &self.name,
                format!(
                    "upload {} to s3://{}/{}",
                    defn.source, defn.bucket_name, defn.prefix
                ),
            )
            .with_detail("bucket", json!(defn.bucket_name));
        }

        let changed = self.state.drift(defn);
        if changed.is_empty() {
            return Action::new(
                ActionType::NoOp,
                UPLOAD_RESOURCE_TYPE,
                &self.name,
                "up to date",
            );
        }

        Action::new(
            ActionType::Update,
            UPLOAD_RESOURCE_TYPE,
            &self.name,
            format!("{} changed", changed.join(", ")),
        )
        .with_detail("changed", json!(changed))
        .with_detail("bucket", json!(defn.bucket_name))
    }

    /// What `destroy` would do
    pub fn plan_destroy(&self) -> Action {
        if !self.state.is_up() {
            return Action::new(ActionType::NoOp, UPLOAD_RESOURCE_TYPE, &self.name, "not uploaded");
        }
        Action::new(
            ActionType::Delete,
            UPLOAD_RESOURCE_TYPE,
            &self.name,
            format!(
                "delete objects under s3://{}/{}",
                self.state.bucket_name.as_deref().unwrap_or_default(),
                self.state.prefix.as_deref().unwrap_or_default()
            ),
        )
    }

    /// Converge the bucket to `defn`
    ///
    /// Runs a pass when `force_check` is set, the upload is not `Up`, or the
    /// prefix or source changed. The in-memory snapshot is replaced only
    /// after the pass succeeds.
    ///
    /// # Errors
    ///
    /// [`S3Error::InvalidConfig`] is returned before anything is contacted
    /// when no access key id resolves, the region is empty, or the bucket
    /// name is too long. Resolution, connection and transfer errors propagate
    /// unchanged.
    pub async fn create(
        &mut self,
        defn: &BucketUploadDefinition,
        force_check: bool,
    ) -> Result<CreateOutcome> {
        let access_key_id = self.ctx.access_key_id(defn.access_key_id.as_deref())?;
        defn.validate()?;

        let needs_pass = force_check || !self.state.is_up() || !self.state.drift(defn).is_empty();
        if !needs_pass {
            tracing::debug!("Bucket upload {} is up to date", self.name);
            return Ok(CreateOutcome::Unchanged);
        }

        let source = self.ctx.sources.resolve(&defn.source).await?;
        tracing::info!(
            "Uploading '{}' to s3://{}/{}",
            source.display(),
            defn.bucket_name,
            defn.prefix
        );
        let pairs = enumerate(&source, &defn.prefix)?;

        let store = self
            .ctx
            .connector
            .connect(&ConnectRequest {
                bucket_name: &defn.bucket_name,
                region: &defn.region,
                access_key_id: &access_key_id,
            })
            .await?;

        let stats = self.ctx.uploader.upload(store.as_ref(), &pairs).await?;

        self.state = BucketUploadState::applied(defn);
        Ok(CreateOutcome::Applied(stats))
    }

    /// Delete every object under the applied prefix
    ///
    /// A bucket that no longer exists counts as already cleaned up. Returns
    /// `true` once the upload is `Missing`.
    pub async fn destroy(&mut self) -> Result<bool> {
        if self.state.is_up() {
            tracing::info!(
                "Destroying bucket upload {}",
                self.state.upload_id.as_deref().unwrap_or(&self.name)
            );
            match self.delete_applied_objects().await {
                Ok(deleted) => tracing::debug!("Deleted {} objects", deleted),
                Err(S3Error::BucketMissing(bucket)) => {
                    tracing::warn!("Bucket {} no longer exists, nothing to delete", bucket);
                }
                Err(err) => return Err(err),
            }
        }

        self.state = BucketUploadState::default();
        Ok(true)
    }

    async fn delete_applied_objects(&self) -> Result<usize> {
        let store = self.connect_applied().await?;
        let keys = self.applied_keys(store.as_ref()).await?;
        if !keys.is_empty() {
            store.delete_keys(&keys).await?;
        }
        Ok(keys.len())
    }

    /// Inspect the bucket of an `Up` upload without changing anything
    ///
    /// Returns `None` when the upload is not `Up`.
    pub async fn check(&self) -> Result<Option<CheckReport>> {
        if !self.state.is_up() {
            return Ok(None);
        }

        let store = match self.connect_applied().await {
            Ok(store) => store,
            Err(S3Error::BucketMissing(_)) => {
                return Ok(Some(CheckReport {
                    bucket_exists: false,
                    objects_under_prefix: 0,
                    location: None,
                    location_matches: false,
                }));
            }
            Err(err) => return Err(err),
        };

        let objects_under_prefix = self.applied_keys(store.as_ref()).await?.len();
        let location = store.bucket_location().await?;
        let expected = region_to_s3_location(self.state.region.as_deref().unwrap_or_default());

        Ok(Some(CheckReport {
            bucket_exists: true,
            objects_under_prefix,
            location_matches: location == expected,
            location: Some(location),
        }))
    }

    /// Keys this upload may have written under its applied prefix
    ///
    /// A prefix without a trailing `/` covers the keys below `prefix/` and
    /// the object named `prefix` itself (a single-file source), never a
    /// sibling that merely starts with the same characters.
    async fn applied_keys(&self, store: &dyn ObjectStore) -> Result<Vec<String>> {
        let prefix = self.state.prefix.as_deref().unwrap_or_default();
        let listing = key_prefix(prefix);
        let mut keys = store.list_keys(&listing).await?;
        if listing != prefix && store.key_exists(prefix).await? {
            keys.insert(0, prefix.to_string());
        }
        Ok(keys)
    }

    async fn connect_applied(&self) -> Result<Box<dyn ObjectStore>> {
        let access_key_id = self.ctx.access_key_id(self.state.access_key_id.as_deref())?;
        let bucket_name = self.state.bucket_name.as_deref().ok_or_else(|| {
            S3Error::InvalidConfig(format!("bucket upload '{}' has no applied bucket", self.name))
        })?;
        let region = self.state.region.as_deref().unwrap_or_default();

        self.ctx
            .connector
            .connect(&ConnectRequest {
                bucket_name,
                region,
                access_key_id: &access_key_id,
            })
            .await
    }
}
