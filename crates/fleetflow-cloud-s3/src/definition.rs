//! Resource definitions
//!
//! Parses `bucket` and `bucket-upload` nodes out of a KDL project file.
//!
//! ```kdl
//! bucket "assets.example.com" {
//!     region "eu-west-1"
//! }
//!
//! bucket-upload "site" {
//!     bucket "assets.example.com"
//!     source "./public"
//!     prefix "site/"
//!     region "eu-west-1"
//! }
//! ```

use crate::error::{Result, S3Error};
use fleetflow_cloud::ManagedResource;
use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// State type of bucket uploads
pub const UPLOAD_RESOURCE_TYPE: &str = "s3-bucket-upload";

/// State type of bucket resources
pub const BUCKET_RESOURCE_TYPE: &str = "s3-bucket";

/// Longest bucket name S3 accepts
pub const MAX_BUCKET_NAME_LEN: usize = 63;

/// Desired state of one bucket upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketUploadDefinition {
    /// Name declared in the project file
    pub name: String,
    pub upload_id: String,
    pub bucket_name: String,
    /// Directory, single file, or `.drv` derivation reference
    pub source: String,
    pub prefix: String,
    pub region: String,
    pub access_key_id: Option<String>,
}

impl BucketUploadDefinition {
    pub fn new(
        name: impl Into<String>,
        bucket_name: impl Into<String>,
        source: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            upload_id: name.clone(),
            name,
            bucket_name: bucket_name.into(),
            source: source.into(),
            prefix: String::new(),
            region: region.into(),
            access_key_id: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_access_key_id(mut self, access_key_id: impl Into<String>) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self
    }

    pub fn with_upload_id(mut self, upload_id: impl Into<String>) -> Self {
        self.upload_id = upload_id.into();
        self
    }

    /// Checks that need no credentials or network
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(S3Error::InvalidConfig(format!(
                "bucket upload '{}': please set 'region'",
                self.name
            )));
        }
        if self.bucket_name.is_empty() {
            return Err(S3Error::InvalidConfig(format!(
                "bucket upload '{}': please set 'bucket'",
                self.name
            )));
        }
        if self.bucket_name.len() > MAX_BUCKET_NAME_LEN {
            return Err(S3Error::InvalidConfig(format!(
                "bucket name '{}' is longer than {} characters",
                self.bucket_name, MAX_BUCKET_NAME_LEN
            )));
        }
        Ok(())
    }
}

impl ManagedResource for BucketUploadDefinition {
    fn resource_type(&self) -> &str {
        UPLOAD_RESOURCE_TYPE
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn create_after(&self, resources: &[&dyn ManagedResource]) -> Vec<String> {
        resources
            .iter()
            .filter(|r| r.provides_bucket().is_some())
            .map(|r| r.key())
            .collect()
    }

    fn show_type(&self) -> String {
        format!("{} [{}]", UPLOAD_RESOURCE_TYPE, self.region)
    }
}

/// A bucket managed elsewhere, referenced by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketReference {
    pub name: String,
    pub region: Option<String>,
}

impl ManagedResource for BucketReference {
    fn resource_type(&self) -> &str {
        BUCKET_RESOURCE_TYPE
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn provides_bucket(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn show_type(&self) -> String {
        match &self.region {
            Some(region) => format!("{} [{}]", BUCKET_RESOURCE_TYPE, region),
            None => BUCKET_RESOURCE_TYPE.to_string(),
        }
    }
}

/// Resources declared in one project file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadProject {
    pub buckets: Vec<BucketReference>,
    pub uploads: Vec<BucketUploadDefinition>,
}

impl UploadProject {
    /// Every declared resource, buckets first
    pub fn resources(&self) -> Vec<&dyn ManagedResource> {
        self.buckets
            .iter()
            .map(|b| b as &dyn ManagedResource)
            .chain(self.uploads.iter().map(|u| u as &dyn ManagedResource))
            .collect()
    }

    pub fn upload(&self, name: &str) -> Option<&BucketUploadDefinition> {
        self.uploads.iter().find(|u| u.name == name)
    }
}

/// Parse a project file from disk
pub fn parse_project_file(path: &Path) -> Result<UploadProject> {
    let content = std::fs::read_to_string(path)?;
    parse_project(&content)
}

/// Parse a project from KDL text
pub fn parse_project(content: &str) -> Result<UploadProject> {
    let doc: KdlDocument = content.parse()?;
    let mut project = UploadProject::default();

    for node in doc.nodes() {
        match node.name().value() {
            "bucket" => project.buckets.push(parse_bucket(node)?),
            "bucket-upload" | "bucket_upload" => project.uploads.push(parse_bucket_upload(node)?),
            other => {
                tracing::debug!("Ignoring unknown node: {}", other);
            }
        }
    }

    Ok(project)
}

fn node_name(node: &KdlNode, kind: &str) -> Result<String> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
        .ok_or_else(|| S3Error::InvalidConfig(format!("{} requires a name", kind)))
}

fn string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

/// bucket ノードをパース
pub fn parse_bucket(node: &KdlNode) -> Result<BucketReference> {
    let name = node_name(node, "bucket")?;
    let mut bucket = BucketReference { name, region: None };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() == "region" {
                bucket.region = string_arg(child);
            }
        }
    }

    Ok(bucket)
}

/// bucket-upload ノードをパース
pub fn parse_bucket_upload(node: &KdlNode) -> Result<BucketUploadDefinition> {
    let name = node_name(node, "bucket-upload")?;
    let mut upload_id = None;
    let mut bucket_name = None;
    let mut source = None;
    let mut prefix = String::new();
    let mut region = String::new();
    let mut access_key_id = None;

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "bucket" | "bucket_name" | "bucket-name" => bucket_name = string_arg(child),
                "source" => source = string_arg(child),
                "prefix" => prefix = string_arg(child).unwrap_or_default(),
                "region" => region = string_arg(child).unwrap_or_default(),
                "access_key_id" | "access-key-id" => access_key_id = string_arg(child),
                "upload_id" | "upload-id" => upload_id = string_arg(child),
                other => {
                    return Err(S3Error::InvalidConfig(format!(
                        "bucket-upload '{}': unknown field '{}'",
                        name, other
                    )));
                }
            }
        }
    }

    let bucket_name = bucket_name.ok_or_else(|| {
        S3Error::InvalidConfig(format!("bucket-upload '{}' requires a bucket", name))
    })?;
    let source = source.ok_or_else(|| {
        S3Error::InvalidConfig(format!("bucket-upload '{}' requires a source", name))
    })?;

    Ok(BucketUploadDefinition {
        upload_id: upload_id.unwrap_or_else(|| name.clone()),
        name,
        bucket_name,
        source,
        prefix,
        region,
        access_key_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetflow_cloud::creation_order;

    const PROJECT: &str = r#"
bucket "assets.example.com" {
    region "eu-west-1"
}

bucket-upload "site" {
    bucket "assets.example.com"
    source "./public"
    prefix "site/"
    region "eu-west-1"
    access-key-id "AKIA1"
    upload-id "site-v1"
}

bucket_upload "docs" {
    bucket_name "docs-bucket"
    source "/nix/store/abc-docs.drv"
    region "us-east-1"
}
"#;

    #[test]
    fn test_parse_project() {
        let project = parse_project(PROJECT).unwrap();
        assert_eq!(project.buckets.len(), 1);
        assert_eq!(project.buckets[0].region.as_deref(), Some("eu-west-1"));

        let site = project.upload("site").unwrap();
        assert_eq!(site.upload_id, "site-v1");
        assert_eq!(site.bucket_name, "assets.example.com");
        assert_eq!(site.prefix, "site/");
        assert_eq!(site.access_key_id.as_deref(), Some("AKIA1"));

        let docs = project.upload("docs").unwrap();
        assert_eq!(docs.upload_id, "docs");
        assert_eq!(docs.prefix, "");
        assert!(docs.access_key_id.is_none());
    }

    #[test]
    fn test_missing_source_rejected() {
        let err = parse_project(r#"bucket-upload "x" { bucket "b"; region "eu-west-1" }"#)
            .unwrap_err();
        assert!(matches!(err, S3Error::InvalidConfig(_)));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = parse_project(
            r#"bucket-upload "x" { bucket "b"; source "."; region "eu-west-1"; checksum "md5" }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_invalid_kdl() {
        assert!(matches!(parse_project("bucket {"), Err(S3Error::Kdl(_))));
    }

    #[test]
    fn test_validate() {
        let ok = BucketUploadDefinition::new("site", "assets", "./public", "eu-west-1");
        assert!(ok.validate().is_ok());

        let no_region = BucketUploadDefinition::new("site", "assets", "./public", "");
        assert!(matches!(no_region.validate(), Err(S3Error::InvalidConfig(_))));

        let long = BucketUploadDefinition::new("site", "a".repeat(64), "./public", "eu-west-1");
        assert!(matches!(long.validate(), Err(S3Error::InvalidConfig(_))));

        let limit = BucketUploadDefinition::new("site", "a".repeat(63), "./public", "eu-west-1");
        assert!(limit.validate().is_ok());
    }

    #[test]
    fn test_uploads_created_after_buckets() {
        let project = parse_project(PROJECT).unwrap();
        let resources = project.resources();

        let site = project.upload("site").unwrap();
        assert_eq!(
            site.create_after(&resources),
            vec!["s3-bucket:assets.example.com".to_string()]
        );

        let order = creation_order(&resources).unwrap();
        assert_eq!(order[0], 0);
        assert_eq!(site.show_type(), "s3-bucket-upload [eu-west-1]");
    }
}
