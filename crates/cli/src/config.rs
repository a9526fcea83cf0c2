//! Service configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, an optional
//! TOML file (`--config`), then command-line flags and their environment
//! variables. Secret values are never part of the configuration; only the
//! *name* of a secret (`api_key_secret`) is.
//!
//! ```toml
//! port = 8080
//! allowed_origin = "https://app.example.com"
//! table_name = "provisioning-requests"
//! region = "us-east-2"
//! timeout_secs = 120
//! bucket_prefix = "demo-bucket"
//! api_key_secret = "provisioner/api-key"
//!
//! [routines.object-store]
//! role_arn = "arn:aws:iam::123456789012:role/provisioner-object-store"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use provisioner_aws::{RegistryOptions, DEFAULT_BUCKET_PREFIX};
use serde::Deserialize;

pub(crate) const DEFAULT_PORT: u16 = 8080;
pub(crate) const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";
pub(crate) const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct RoutineConfig {
    /// IAM role the routine assumes for its calls.
    pub(crate) role_arn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ServerConfig {
    pub(crate) port: u16,
    pub(crate) allowed_origin: String,
    /// DynamoDB table for request records. Required unless running dry.
    pub(crate) table_name: Option<String>,
    pub(crate) region: String,
    pub(crate) timeout_secs: u64,
    pub(crate) bucket_prefix: String,
    /// Name of the secret holding the API key. No key means no auth.
    pub(crate) api_key_secret: Option<String>,
    /// Per-tag routine settings, keyed by canonical tag.
    pub(crate) routines: BTreeMap<String, RoutineConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            allowed_origin: DEFAULT_ALLOWED_ORIGIN.to_string(),
            table_name: None,
            region: DEFAULT_REGION.to_string(),
            timeout_secs: provisioner_core::DEFAULT_TIMEOUT.as_secs(),
            bucket_prefix: DEFAULT_BUCKET_PREFIX.to_string(),
            api_key_secret: None,
            routines: BTreeMap::new(),
        }
    }
}

/// Values given on the command line (or via their environment variables).
#[derive(Debug, Clone, Default)]
pub(crate) struct Overrides {
    pub(crate) port: Option<u16>,
    pub(crate) allowed_origin: Option<String>,
    pub(crate) table_name: Option<String>,
    pub(crate) region: Option<String>,
    pub(crate) api_key_secret: Option<String>,
}

impl ServerConfig {
    /// Load from `path`, or defaults when no file is given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub(crate) fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(origin) = overrides.allowed_origin {
            self.allowed_origin = origin;
        }
        if let Some(table) = overrides.table_name {
            self.table_name = Some(table);
        }
        if let Some(region) = overrides.region {
            self.region = region;
        }
        if let Some(secret) = overrides.api_key_secret {
            self.api_key_secret = Some(secret);
        }
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".into()));
        }
        if self.allowed_origin.is_empty() || self.allowed_origin == "*" {
            return Err(ConfigError::Invalid(
                "allowed_origin must name exactly one origin".into(),
            ));
        }
        if self.bucket_prefix.is_empty() {
            return Err(ConfigError::Invalid("bucket_prefix must not be empty".into()));
        }
        Ok(())
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub(crate) fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            bucket_prefix: self.bucket_prefix.clone(),
            role_arns: self
                .routines
                .iter()
                .filter_map(|(tag, r)| r.role_arn.clone().map(|arn| (tag.clone(), arn)))
                .collect(),
        }
    }
}
