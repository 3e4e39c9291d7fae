//! Storage connector
//!
//! Opens a fresh bucket session for each operation that needs one. Sessions
//! are never cached.

use crate::credentials::CredentialSource;
use crate::error::{Result, S3Error};
use crate::region::{AddressingStyle, is_valid_region};
use crate::s3::S3Session;
use crate::store::ObjectStore;
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials as SdkCredentials;
use std::sync::Arc;

/// What a session is opened for
#[derive(Debug, Clone, Copy)]
pub struct ConnectRequest<'a> {
    pub bucket_name: &'a str,
    pub region: &'a str,
    pub access_key_id: &'a str,
}

/// Opens bucket sessions
#[async_trait]
pub trait StorageConnector: Send + Sync {
    /// Open a session for `request.bucket_name`
    ///
    /// # Errors
    ///
    /// - [`S3Error::AuthenticationFailed`] if no key pair can be resolved
    /// - [`S3Error::Connectivity`] if the region or endpoint is unreachable
    /// - [`S3Error::BucketMissing`] if the bucket does not exist
    async fn connect(&self, request: &ConnectRequest<'_>) -> Result<Box<dyn ObjectStore>>;
}

/// Connector for AWS S3 and S3-compatible endpoints
pub struct S3Connector {
    credentials: Arc<dyn CredentialSource>,
    endpoint: Option<String>,
}

impl S3Connector {
    pub fn new(credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            credentials,
            endpoint: None,
        }
    }

    /// Use a custom endpoint (MinIO, R2, ...). Implies path-style addressing.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    fn addressing_style(&self, bucket_name: &str) -> AddressingStyle {
        if self.endpoint.is_some() {
            AddressingStyle::Path
        } else {
            AddressingStyle::for_bucket(bucket_name)
        }
    }
}

#[async_trait]
impl StorageConnector for S3Connector {
    async fn connect(&self, request: &ConnectRequest<'_>) -> Result<Box<dyn ObjectStore>> {
        if !is_valid_region(request.region) {
            return Err(S3Error::Connectivity(format!(
                "unknown region '{}'",
                request.region
            )));
        }

        let creds = self.credentials.resolve(request.access_key_id)?;
        let style = self.addressing_style(request.bucket_name);

        tracing::debug!(
            "Connecting to bucket {} in {} ({:?} addressing)",
            request.bucket_name,
            request.region,
            style
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(request.region.to_string()))
            .credentials_provider(SdkCredentials::new(
                creds.access_key_id,
                creds.secret_access_key,
                None,
                None,
                "fleetflow",
            ))
            .retry_config(RetryConfig::disabled())
            .force_path_style(style.is_path());

        if let Some(endpoint) = &self.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let client = aws_sdk_s3::Client::from_conf(builder.build());
        let session = S3Session::open(client, request.bucket_name).await?;
        Ok(Box::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::EnvCredentialSource;

    fn connector() -> S3Connector {
        S3Connector::new(Arc::new(EnvCredentialSource::with_vars(Vec::<(String, String)>::new())))
    }

    #[test]
    fn test_endpoint_forces_path_style() {
        let plain = connector();
        assert_eq!(plain.addressing_style("assets"), AddressingStyle::VirtualHost);
        assert_eq!(plain.addressing_style("assets.example.com"), AddressingStyle::Path);

        let custom = connector().with_endpoint("http://localhost:9000");
        assert_eq!(custom.addressing_style("assets"), AddressingStyle::Path);
    }

    #[tokio::test]
    async fn test_invalid_region_is_connectivity_error() {
        let request = ConnectRequest {
            bucket_name: "assets",
            region: "Not A Region",
            access_key_id: "AKIA1",
        };
        let err = connector().connect(&request).await.err().unwrap();
        assert!(matches!(err, S3Error::Connectivity(_)));
    }

    #[tokio::test]
    async fn test_missing_secret_is_authentication_error() {
        let request = ConnectRequest {
            bucket_name: "assets",
            region: "eu-west-1",
            access_key_id: "AKIA1",
        };
        let err = connector().connect(&request).await.err().unwrap();
        assert!(matches!(err, S3Error::AuthenticationFailed(_)));
    }
}
