//! Source resolution
//!
//! A source is either a filesystem path, used verbatim, or a derivation
//! reference ending in `.drv` that must be realised into a store path first.

use crate::error::{Result, S3Error};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

const DERIVATION_SUFFIX: &str = ".drv";

/// External step turning a derivation reference into a path
#[async_trait]
pub trait BuildStep: Send + Sync {
    /// Realise `reference` and return the produced path
    async fn realise(&self, reference: &str) -> Result<String>;
}

/// Build step that runs an external command with the reference appended
#[derive(Debug, Clone)]
pub struct ExternalBuild {
    program: String,
    args: Vec<String>,
}

impl Default for ExternalBuild {
    fn default() -> Self {
        Self::new("nix-store", ["--realise"])
    }
}

impl ExternalBuild {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl BuildStep for ExternalBuild {
    async fn realise(&self, reference: &str) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.arg(reference);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!(
            "Running: {} {} {}",
            self.program,
            self.args.join(" "),
            reference
        );

        let output = cmd.output().await.map_err(|e| S3Error::Build {
            reference: reference.to_string(),
            output: format!("failed to run {}: {}", self.program, e),
        })?;

        if !output.status.success() {
            return Err(S3Error::Build {
                reference: reference.to_string(),
                output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        // the produced path is the last line printed
        let path = stdout.lines().map(str::trim).rev().find(|l| !l.is_empty());
        path.map(str::to_string).ok_or_else(|| S3Error::Build {
            reference: reference.to_string(),
            output: format!("{} printed no output path", self.program),
        })
    }
}

/// Whether a source names a derivation
pub fn is_derivation(source: &str) -> bool {
    source.ends_with(DERIVATION_SUFFIX)
}

/// Maps a source reference to an existing local path
#[derive(Clone)]
pub struct SourceResolver {
    build: Arc<dyn BuildStep>,
}

impl SourceResolver {
    pub fn new(build: Arc<dyn BuildStep>) -> Self {
        Self { build }
    }

    /// Resolve `source` to a local path that exists
    ///
    /// # Errors
    ///
    /// - [`S3Error::Build`] if realising a derivation fails
    /// - [`S3Error::SourceNotFound`] if the resulting path does not exist
    pub async fn resolve(&self, source: &str) -> Result<PathBuf> {
        let path = if is_derivation(source) {
            let realised = self.build.realise(source).await?;
            tracing::info!("Realised {} to {}", source, realised);
            PathBuf::from(realised)
        } else {
            PathBuf::from(source)
        };

        if !path.exists() {
            return Err(S3Error::SourceNotFound(path));
        }
        Ok(path)
    }
}

impl Default for SourceResolver {
    fn default() -> Self {
        Self::new(Arc::new(ExternalBuild::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedBuild(PathBuf);

    #[async_trait]
    impl BuildStep for FixedBuild {
        async fn realise(&self, _reference: &str) -> Result<String> {
            Ok(self.0.display().to_string())
        }
    }

    #[test]
    fn test_is_derivation() {
        assert!(is_derivation("/nix/store/abc-site.drv"));
        assert!(!is_derivation("/srv/site"));
        assert!(!is_derivation("site.drv.d"));
    }

    #[tokio::test]
    async fn test_plain_path_used_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = SourceResolver::new(Arc::new(FixedBuild(PathBuf::from("/unused"))));

        let resolved = resolver
            .resolve(dir.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(resolved, dir.path());
    }

    #[tokio::test]
    async fn test_missing_path() {
        let resolver = SourceResolver::default();
        let err = resolver.resolve("/definitely/not/here").await.unwrap_err();
        assert!(matches!(err, S3Error::SourceNotFound(_)));
    }

    #[tokio::test]
    async fn test_derivation_goes_through_build_step() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = SourceResolver::new(Arc::new(FixedBuild(dir.path().to_path_buf())));

        let resolved = resolver.resolve("/nix/store/abc-site.drv").await.unwrap();
        assert_eq!(resolved, dir.path());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_build_success() {
        let build = ExternalBuild::new(
            "sh",
            ["-c", "echo building >&2; echo /nix/store/xyz-site", "sh"],
        );
        let path = build.realise("/nix/store/abc-site.drv").await.unwrap();
        assert_eq!(path, "/nix/store/xyz-site");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_build_failure_carries_stderr() {
        let build = ExternalBuild::new(
            "sh",
            ["-c", "echo 'error: no such derivation' >&2; exit 1", "sh"],
        );
        let err = build.realise("/nix/store/abc-site.drv").await.unwrap_err();
        match err {
            S3Error::Build { reference, output } => {
                assert_eq!(reference, "/nix/store/abc-site.drv");
                assert_eq!(output, "error: no such derivation");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
