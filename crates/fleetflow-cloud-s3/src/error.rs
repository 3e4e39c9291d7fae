//! S3 bucket upload error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum S3Error {
    /// Missing or invalid definition field
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("source directory for bucket upload '{}' does not exist", .0.display())]
    SourceNotFound(PathBuf),

    #[error("unable to build '{reference}': {output}")]
    Build { reference: String, output: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Cannot reach object storage: {0}")]
    Connectivity(String),

    #[error("Transfer failed for s3://{bucket}/{key}: {message}")]
    Transfer {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Bucket does not exist: {0}")]
    BucketMissing(String),

    #[error("KDL parse error: {0}")]
    Kdl(#[from] kdl::KdlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl S3Error {
    pub(crate) fn transfer(
        bucket: impl Into<String>,
        key: impl Into<String>,
        message: impl std::fmt::Display,
    ) -> Self {
        S3Error::Transfer {
            bucket: bucket.into(),
            key: key.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, S3Error>;
