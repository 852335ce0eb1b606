use std::env;
use std::fs;
use std::path::Path;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// JASMIN object store endpoint for use within the JASMIN computing environment.
pub const INTERNAL_ENDPOINT_URL: &str = "http://caf-o.s3.jc.rl.ac.uk";

/// JASMIN object store endpoint for use from other locations.
pub const EXTERNAL_ENDPOINT_URL: &str = "https://caf-o.s3-ext.jc.rl.ac.uk";

pub const DEFAULT_BUCKET: &str = "caf-data";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Connection parameters for a store. Fixed at store construction; there are
/// no process-wide defaults beyond `Default::default()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub bucket: String,
    pub endpoint: String,
    /// Directory for local copies of dataset files. `None` means a process
    /// temp directory owned by the store.
    pub cache_dir: Option<Utf8PathBuf>,
    /// Anonymous access is read-only; write operations require credentials.
    pub anonymous: bool,
    pub credentials: Option<Credentials>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            endpoint: EXTERNAL_ENDPOINT_URL.to_string(),
            cache_dir: None,
            anonymous: true,
            credentials: None,
        }
    }
}

impl StoreConfig {
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let content =
            fs::read_to_string(path).map_err(|_| StoreError::ConfigRead(path.to_path_buf()))?;
        serde_json::from_str(&content).map_err(|err| StoreError::ConfigParse(err.to_string()))
    }

    /// Resolves credentials in precedence order: explicit in-config values,
    /// then environment variables, then the `[default]` profile of
    /// `~/.aws/credentials`.
    pub fn resolve_credentials(&self) -> Option<Credentials> {
        self.credentials
            .clone()
            .or_else(env_credentials)
            .or_else(file_credentials)
    }
}

fn env_credentials() -> Option<Credentials> {
    let access_key_id = env::var("AWS_ACCESS_KEY_ID").ok()?;
    let secret_access_key = env::var("AWS_SECRET_ACCESS_KEY").ok()?;
    if access_key_id.trim().is_empty() || secret_access_key.trim().is_empty() {
        return None;
    }
    Some(Credentials {
        access_key_id,
        secret_access_key,
    })
}

fn file_credentials() -> Option<Credentials> {
    let dirs = BaseDirs::new()?;
    let path = dirs.home_dir().join(".aws").join("credentials");
    let content = fs::read_to_string(path).ok()?;
    parse_credentials_profile(&content, "default")
}

fn parse_credentials_profile(content: &str, profile: &str) -> Option<Credentials> {
    let section = format!("[{profile}]");
    let mut in_profile = false;
    let mut access_key_id = None;
    let mut secret_access_key = None;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') {
            in_profile = line == section;
            continue;
        }
        if !in_profile {
            continue;
        }
        if let Some((name, value)) = line.split_once('=') {
            match name.trim() {
                "aws_access_key_id" => access_key_id = Some(value.trim().to_string()),
                "aws_secret_access_key" => secret_access_key = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }
    Some(Credentials {
        access_key_id: access_key_id?,
        secret_access_key: secret_access_key?,
    })
}
