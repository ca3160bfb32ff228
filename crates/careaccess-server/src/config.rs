//! Server configuration.
//!
//! Loaded from a TOML file:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8080"
//!
//! [storage]
//! backend = "sqlite"
//! path = "/var/lib/careaccess/access.db"
//!
//! [access]
//! grant_duration_secs = 600
//! token_use = "multi_use"
//! renewal = "append"
//!
//! [identity]
//! jwt_secret = "change-me"
//! issuer = "https://id.example.org"
//!
//! [sweep]
//! interval_secs = 300
//! retention_secs = 86400
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use careaccess_core::{AccessPolicy, CoreError, RenewalPolicy, TokenUse};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level server configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ListenConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub access: AccessConfig,
    pub identity: IdentityConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

/// Which grant store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Database file; required for the sqlite backend.
    pub path: Option<PathBuf>,
}

/// Grant policy as written in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
    #[serde(default = "default_grant_duration_secs")]
    pub grant_duration_secs: u64,
    #[serde(default)]
    pub token_use: TokenUse,
    #[serde(default)]
    pub renewal: RenewalPolicy,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            grant_duration_secs: default_grant_duration_secs(),
            token_use: TokenUse::default(),
            renewal: RenewalPolicy::default(),
        }
    }
}

fn default_grant_duration_secs() -> u64 {
    careaccess_core::DEFAULT_GRANT_DURATION.as_secs()
}

impl AccessConfig {
    /// The validated policy.
    pub fn policy(&self) -> Result<AccessPolicy, CoreError> {
        AccessPolicy::new(
            Duration::from_secs(self.grant_duration_secs),
            self.renewal,
            self.token_use,
        )
    }
}

/// Verification settings for caller JWTs.
#[derive(Clone, Deserialize)]
pub struct IdentityConfig {
    pub jwt_secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("jwt_secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval_secs(),
            retention_secs: default_retention_secs(),
        }
    }
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_retention_secs() -> u64 {
    24 * 60 * 60
}

impl SweepConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

impl ServerConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate config text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Refuse configurations the server must not start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.access
            .policy()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.identity.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid("identity.jwt_secret must not be empty".into()));
        }
        if self.storage.backend == StorageBackend::Sqlite && self.storage.path.is_none() {
            return Err(ConfigError::Invalid(
                "storage.path is required for the sqlite backend".into(),
            ));
        }
        if self.sweep.interval_secs == 0 {
            return Err(ConfigError::Invalid("sweep.interval_secs must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = ServerConfig::from_toml("[identity]\njwt_secret = \"s3cret\"\n").unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:8080");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.access.policy().unwrap(), AccessPolicy::default());
        assert_eq!(config.sweep.interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_debug_redacts_jwt_secret() {
        let config = ServerConfig::from_toml("[identity]\njwt_secret = \"s3cret\"\n").unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("s3cret"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_full_config() {
        let config = ServerConfig::from_toml(
            r#"
            [server]
            listen = "127.0.0.1:9000"

            [storage]
            backend = "sqlite"
            path = "/tmp/access.db"

            [access]
            grant_duration_secs = 900
            token_use = "single_use"
            renewal = "replace"

            [identity]
            jwt_secret = "s3cret"
            issuer = "id.example.org"
            audience = "careaccess"

            [sweep]
            interval_secs = 60
            retention_secs = 3600
            "#,
        )
        .unwrap();

        let policy = config.access.policy().unwrap();
        assert_eq!(policy.grant_duration, Duration::from_secs(900));
        assert_eq!(policy.token_use, TokenUse::SingleUse);
        assert_eq!(policy.renewal, RenewalPolicy::Replace);
        assert_eq!(config.storage.path, Some(PathBuf::from("/tmp/access.db")));
        assert_eq!(config.identity.audience.as_deref(), Some("careaccess"));
    }

    #[test]
    fn test_invalid_configs_are_refused() {
        let out_of_bounds = "[access]\ngrant_duration_secs = 30\n[identity]\njwt_secret = \"s\"\n";
        assert!(matches!(
            ServerConfig::from_toml(out_of_bounds),
            Err(ConfigError::Invalid(_))
        ));

        let empty_secret = "[identity]\njwt_secret = \"  \"\n";
        assert!(matches!(
            ServerConfig::from_toml(empty_secret),
            Err(ConfigError::Invalid(_))
        ));

        let sqlite_without_path = "[storage]\nbackend = \"sqlite\"\n[identity]\njwt_secret = \"s\"\n";
        assert!(matches!(
            ServerConfig::from_toml(sqlite_without_path),
            Err(ConfigError::Invalid(_))
        ));

        assert!(matches!(ServerConfig::from_toml(""), Err(ConfigError::Parse(_))));
    }
}
