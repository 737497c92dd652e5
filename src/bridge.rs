//! 브리지 구성
//!
//! 설정에 맞는 백엔드로 `SecretStore`를 만들고 두 채널 플러그인을 등록합니다.

use std::sync::Arc;

use crate::channel::{ChannelRegistry, MethodCall, MethodResponse};
use crate::config::{BackendKind, KeychainConfig};
use crate::error::KeychainError;
use crate::plugins::{KeychainPlugin, PlatformPlugin, KEYCHAIN_CHANNEL, PLATFORM_CHANNEL};
use crate::store::vault::MasterKey;
use crate::store::{KeyringBackend, MemoryBackend, SecretBackend, SecretStore, VaultBackend};

pub struct Bridge {
    registry: ChannelRegistry,
    store: Arc<SecretStore>,
}

impl Bridge {
    /// 설정으로부터 구성
    pub fn from_config(config: &KeychainConfig) -> Result<Self, KeychainError> {
        config.validate()?;
        let backend = open_backend(config)?;
        tracing::info!(
            bundle_id = %config.bundle_id,
            backend = backend.name(),
            "keychain bridge initialized"
        );
        Ok(Self::with_backend(&config.bundle_id, backend))
    }

    /// 이미 준비된 백엔드로 구성
    pub fn with_backend(bundle_id: &str, backend: Arc<dyn SecretBackend>) -> Self {
        let store = Arc::new(SecretStore::new(bundle_id, backend));

        let mut registry = ChannelRegistry::new();
        registry.register(KEYCHAIN_CHANNEL, Arc::new(KeychainPlugin::new(store.clone())));
        registry.register(PLATFORM_CHANNEL, Arc::new(PlatformPlugin::new()));

        Self { registry, store }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn store(&self) -> Arc<SecretStore> {
        self.store.clone()
    }

    pub async fn invoke(&self, channel: &str, call: MethodCall) -> MethodResponse {
        self.registry.invoke(channel, call).await
    }
}

fn open_backend(config: &KeychainConfig) -> Result<Arc<dyn SecretBackend>, KeychainError> {
    let backend: Arc<dyn SecretBackend> = match config.backend {
        BackendKind::Keyring => {
            let backend = KeyringBackend::new(&config.service);
            tracing::debug!(service = backend.service(), "using OS keyring");
            Arc::new(backend)
        }
        BackendKind::Memory => Arc::new(MemoryBackend::new()),
        BackendKind::Vault => {
            let path = config.vault_path.as_ref().ok_or_else(|| {
                KeychainError::Config("vault backend requires a vault path".to_string())
            })?;
            let master_key = MasterKey::load_or_create(&config.service)?;
            let backend = VaultBackend::open(path, master_key)?;
            tracing::debug!(path = %backend.path().display(), "using encrypted vault file");
            Arc::new(backend)
        }
    };
    Ok(backend)
}
