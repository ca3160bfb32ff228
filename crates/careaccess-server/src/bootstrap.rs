//! Wiring the service together from configuration.

use std::sync::Arc;

use careaccess::{AccessService, GrantStore, MemoryStore, SqliteStore};
use careaccess_core::Clock;

use crate::config::{ConfigError, ServerConfig, StorageBackend, StorageConfig};
use crate::identity::{IdentityVerifier, JwtVerifier};
use crate::routes::AppState;

/// Open the configured grant store.
pub fn open_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn GrantStore>> {
    let store: Arc<dyn GrantStore> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Sqlite => {
            let path = config.path.as_ref().ok_or_else(|| {
                ConfigError::Invalid("storage.path is required for the sqlite backend".into())
            })?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Arc::new(SqliteStore::open(path)?)
        }
    };
    Ok(store)
}

/// Build application state and the identity verifier from a validated config.
pub fn build(
    config: &ServerConfig,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<(AppState, Arc<dyn IdentityVerifier>)> {
    let policy = config.access.policy()?;
    let store = open_store(&config.storage)?;
    let service = Arc::new(AccessService::new(store, clock, policy));

    let verifier: Arc<dyn IdentityVerifier> = Arc::new(JwtVerifier::new(
        config.identity.jwt_secret.as_bytes(),
        config.identity.issuer.as_deref(),
        config.identity.audience.as_deref(),
    ));

    Ok((AppState { service }, verifier))
}
