//! Runtime secret access.
//!
//! Secret material never appears in code or configuration files. Consumers
//! name the secrets they need, and receive a [`ScopedSecrets`] view that can
//! resolve exactly those names from the process-wide [`SecretSource`].

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

/// Errors returned while resolving a secret.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecretError {
    #[error("secret '{name}' not found")]
    NotFound { name: String },

    /// The consumer did not declare this secret.
    #[error("secret '{name}' is outside this scope")]
    OutOfScope { name: String },

    #[error("secret backend error: {0}")]
    Backend(String),
}

/// A resolved secret value. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        SecretString(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

/// Resolves secrets by name at runtime.
#[async_trait]
pub trait SecretSource: Send + Sync {
    async fn get_secret(&self, name: &str) -> Result<SecretString, SecretError>;

    /// Returns this source's identifier (e.g. "env", "secretsmanager").
    fn source_id(&self) -> &str;
}

// ──────────────────────────────────────────────
// EnvSecretSource
// ──────────────────────────────────────────────

/// Reads secrets from environment variables.
///
/// A secret named `github-token` is read from `<PREFIX>_GITHUB_TOKEN`
/// (uppercased; `-`, `.` and `/` replaced with `_`).
#[derive(Debug, Clone)]
pub struct EnvSecretSource {
    prefix: String,
}

impl EnvSecretSource {
    pub const DEFAULT_PREFIX: &'static str = "PROVISIONER_SECRET";

    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn env_var_name(&self, name: &str) -> String {
        let suffix: String = name
            .chars()
            .map(|c| match c {
                '-' | '.' | '/' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();
        format!("{}_{}", self.prefix, suffix)
    }
}

impl Default for EnvSecretSource {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PREFIX)
    }
}

#[async_trait]
impl SecretSource for EnvSecretSource {
    async fn get_secret(&self, name: &str) -> Result<SecretString, SecretError> {
        match std::env::var(self.env_var_name(name)) {
            Ok(v) if !v.is_empty() => Ok(SecretString::new(v)),
            _ => Err(SecretError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    fn source_id(&self) -> &str {
        "env"
    }
}

// ──────────────────────────────────────────────
// ScopedSecrets
// ──────────────────────────────────────────────

/// A view of a [`SecretSource`] restricted to a declared set of names.
#[derive(Clone)]
pub struct ScopedSecrets {
    source: Arc<dyn SecretSource>,
    allowed: BTreeSet<String>,
}

impl ScopedSecrets {
    pub fn new<I, S>(source: Arc<dyn SecretSource>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source,
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    pub async fn get(&self, name: &str) -> Result<SecretString, SecretError> {
        if !self.allowed.contains(name) {
            return Err(SecretError::OutOfScope {
                name: name.to_string(),
            });
        }
        self.source.get_secret(name).await
    }

    pub fn allowed(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(|s| s.as_str())
    }
}

impl fmt::Debug for ScopedSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedSecrets")
            .field("source", &self.source.source_id())
            .field("allowed", &self.allowed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapSource(HashMap<String, String>);

    #[async_trait]
    impl SecretSource for MapSource {
        async fn get_secret(&self, name: &str) -> Result<SecretString, SecretError> {
            self.0
                .get(name)
                .map(SecretString::new)
                .ok_or_else(|| SecretError::NotFound {
                    name: name.to_string(),
                })
        }

        fn source_id(&self) -> &str {
            "map"
        }
    }

    fn source() -> Arc<dyn SecretSource> {
        Arc::new(MapSource(
            [
                ("api-key".to_string(), "k-123".to_string()),
                ("github-token".to_string(), "ghp-xyz".to_string()),
            ]
            .into_iter()
            .collect(),
        ))
    }

    #[tokio::test]
    async fn scoped_secrets_resolve_declared_names() {
        let scoped = ScopedSecrets::new(source(), ["api-key"]);
        assert_eq!(scoped.get("api-key").await.unwrap().expose(), "k-123");
    }

    #[tokio::test]
    async fn scoped_secrets_refuse_undeclared_names() {
        let scoped = ScopedSecrets::new(source(), ["api-key"]);
        assert_eq!(
            scoped.get("github-token").await,
            Err(SecretError::OutOfScope {
                name: "github-token".to_string()
            })
        );
    }

    #[tokio::test]
    async fn missing_declared_secret_is_not_found() {
        let scoped = ScopedSecrets::new(source(), ["deploy-key"]);
        assert!(matches!(
            scoped.get("deploy-key").await,
            Err(SecretError::NotFound { .. })
        ));
    }

    #[test]
    fn secret_debug_is_redacted() {
        let s = SecretString::new("hunter2");
        assert_eq!(format!("{:?}", s), "SecretString(***)");
    }

    #[test]
    fn env_var_name_format() {
        let src = EnvSecretSource::default();
        assert_eq!(
            src.env_var_name("github-token"),
            "PROVISIONER_SECRET_GITHUB_TOKEN"
        );
        assert_eq!(src.env_var_name("prod/api.key"), "PROVISIONER_SECRET_PROD_API_KEY");
    }

    #[tokio::test]
    async fn env_source_reads_prefixed_variable() {
        let src = EnvSecretSource::new("PROVISIONER_TEST_SECRETS_A1");
        std::env::set_var("PROVISIONER_TEST_SECRETS_A1_API_KEY", "from-env");
        assert_eq!(src.get_secret("api-key").await.unwrap().expose(), "from-env");
        assert!(matches!(
            src.get_secret("other").await,
            Err(SecretError::NotFound { .. })
        ));
    }
}
