use crate::config::Config;
use crate::signing::{SigningKey, UrlSigner};
use crate::storage::StorageManager;
use std::sync::Arc;
use tracing::info;

/// Read-only state shared by every request
#[derive(Clone)]
pub struct AppState {
    pub storage_manager: Arc<StorageManager>,
    pub signer: Arc<UrlSigner>,
}

impl AppState {
    pub fn new(storage_manager: StorageManager, signer: UrlSigner) -> Self {
        Self {
            storage_manager: Arc::new(storage_manager),
            signer: Arc::new(signer),
        }
    }

    /// Build the signing key and storage operator once at startup
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let key = SigningKey::load(config.secret.as_ref().map(|secret| secret.as_bytes()))?;
        let signer = UrlSigner::new(key, config.url_expiry_secs);

        let storage_manager = StorageManager::new(config.to_storage_config()?)?;
        info!(
            backend = %config.storage_backend,
            remote = storage_manager.is_remote(),
            expiry_secs = signer.expiry_secs(),
            "Application state initialized"
        );

        Ok(Self::new(storage_manager, signer))
    }
}
