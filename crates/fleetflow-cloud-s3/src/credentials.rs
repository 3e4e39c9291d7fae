//! Access key resolution
//!
//! The connector never reads the process environment itself. It is handed a
//! [`CredentialSource`] at construction, and every lookup goes through the
//! same fixed precedence:
//!
//! | Step | Access key id | Secret key |
//! |---|---|---|
//! | 1 | `access-key-id` from the definition | `~/.ec2-keys` entry matching the id or alias |
//! | 2 | `EC2_ACCESS_KEY` | `EC2_SECRET_KEY` |
//! | 3 | `AWS_ACCESS_KEY_ID` | `AWS_SECRET_ACCESS_KEY` |

use crate::error::{Result, S3Error};
use std::collections::HashMap;
use std::path::PathBuf;

/// Environment variables consulted for the access key id, in order
pub const ACCESS_KEY_VARS: [&str; 2] = ["EC2_ACCESS_KEY", "AWS_ACCESS_KEY_ID"];

/// Environment variables consulted for the secret key, in order
pub const SECRET_KEY_VARS: [&str; 2] = ["EC2_SECRET_KEY", "AWS_SECRET_ACCESS_KEY"];

const KEYS_FILE: &str = ".ec2-keys";

/// Resolved key pair
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .finish()
    }
}

/// Source of access keys
pub trait CredentialSource: Send + Sync {
    /// Access key id to use, given the one declared in the definition
    fn access_key_id(&self, explicit: Option<&str>) -> Option<String>;

    /// Resolve the key pair for an access key id (or alias)
    fn resolve(&self, access_key_id: &str) -> Result<Credentials>;
}

/// Credentials from `~/.ec2-keys` and a snapshot of the environment
#[derive(Debug, Clone, Default)]
pub struct EnvCredentialSource {
    vars: HashMap<String, String>,
    keys_file: Option<PathBuf>,
}

impl EnvCredentialSource {
    /// Snapshot the credential variables of the current process
    pub fn from_env() -> Self {
        let vars = ACCESS_KEY_VARS
            .iter()
            .chain(SECRET_KEY_VARS.iter())
            .filter_map(|name| std::env::var(name).ok().map(|v| (name.to_string(), v)))
            .collect();

        Self {
            vars,
            keys_file: dirs::home_dir().map(|home| home.join(KEYS_FILE)),
        }
    }

    /// Build from explicit variables (no keys file)
    pub fn with_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            keys_file: None,
        }
    }

    pub fn with_keys_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.keys_file = Some(path.into());
        self
    }

    fn var(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn lookup_keys_file(&self, identifier: &str) -> Result<Option<Credentials>> {
        let Some(path) = &self.keys_file else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Ok(parse_keys_file(&content, identifier))
    }
}

impl CredentialSource for EnvCredentialSource {
    fn access_key_id(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| {
                ACCESS_KEY_VARS
                    .iter()
                    .find_map(|name| self.var(name))
                    .map(str::to_string)
            })
    }

    fn resolve(&self, access_key_id: &str) -> Result<Credentials> {
        if let Some(creds) = self.lookup_keys_file(access_key_id)? {
            tracing::debug!("Using secret key for {} from keys file", creds.access_key_id);
            return Ok(creds);
        }

        if let Some(secret) = SECRET_KEY_VARS.iter().find_map(|name| self.var(name)) {
            return Ok(Credentials {
                access_key_id: access_key_id.to_string(),
                secret_access_key: secret.to_string(),
            });
        }

        Err(S3Error::AuthenticationFailed(format!(
            "please set $EC2_SECRET_KEY or $AWS_SECRET_ACCESS_KEY, or add '{}' to ~/{}",
            access_key_id, KEYS_FILE
        )))
    }
}

/// Fixed key pair
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Credentials);

impl StaticCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self(Credentials {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        })
    }
}

impl CredentialSource for StaticCredentials {
    fn access_key_id(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| Some(self.0.access_key_id.clone()))
    }

    fn resolve(&self, _access_key_id: &str) -> Result<Credentials> {
        Ok(self.0.clone())
    }
}

/// Find `identifier` in `<access-key-id> <secret> [alias]` lines
fn parse_keys_file(content: &str, identifier: &str) -> Option<Credentials> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .find_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 2 {
                return None;
            }
            let alias_matches = parts.get(2).is_some_and(|alias| *alias == identifier);
            (parts[0] == identifier || alias_matches).then(|| Credentials {
                access_key_id: parts[0].to_string(),
                secret_access_key: parts[1].to_string(),
            })
        })
}
