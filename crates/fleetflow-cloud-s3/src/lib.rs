//! FleetFlow S3 bucket upload resource
//!
//! Keeps a bucket prefix in sync with a local directory tree (or a realised
//! derivation). Each pass uploads the keys that are not in the bucket yet,
//! using multipart transfer for large files, and `destroy` removes every
//! object under the prefix.
//!
//! ```text
//! BucketUpload::create
//!   ├─ SourceResolver   path or .drv → local path
//!   ├─ enumerate        local tree   → sorted (file, key) pairs
//!   ├─ StorageConnector              → ObjectStore session
//!   └─ Uploader         skip / put / multipart
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use fleetflow_cloud_s3::{BucketUpload, BucketUploadContext, BucketUploadState};
//!
//! let upload = BucketUpload::new("site", BucketUploadState::default(), ctx);
//! upload.create(&definition, false).await?;
//! ```

pub mod connector;
pub mod credentials;
pub mod definition;
pub mod enumerate;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod progress;
pub mod region;
pub mod resource;
pub mod s3;
pub mod source;
pub mod store;
pub mod upload;

pub use connector::{ConnectRequest, S3Connector, StorageConnector};
pub use credentials::{CredentialSource, Credentials, EnvCredentialSource, StaticCredentials};
pub use definition::{
    BUCKET_RESOURCE_TYPE, BucketReference, BucketUploadDefinition, MAX_BUCKET_NAME_LEN,
    UPLOAD_RESOURCE_TYPE, UploadProject, parse_project, parse_project_file,
};
pub use enumerate::{TransferPair, destination_key, enumerate, key_prefix};
pub use error::{Result, S3Error};
#[cfg(any(test, feature = "test-utils"))]
pub use memory::{MemoryConnector, MemoryStore, StoreOp};
pub use region::{AddressingStyle, region_to_s3_location};
pub use resource::{
    BucketUpload, BucketUploadContext, BucketUploadState, CheckReport, CreateOutcome,
};
pub use source::{BuildStep, ExternalBuild, SourceResolver};
pub use store::ObjectStore;
pub use upload::{MULTIPART_THRESHOLD, PART_SIZE, UploadPolicy, UploadStats, Uploader};
