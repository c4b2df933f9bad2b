// Credential storage and session expiry

pub mod claims;
pub mod expiry;
pub mod file;
pub mod keyring;
pub mod store;

pub use claims::AccessClaims;
pub use expiry::{AuthExpiredHandler, ExpiryLatch, IgnoreExpiry};
pub use file::FileTokenStore;
pub use keyring::KeyringTokenStore;
pub use store::{MemoryTokenStore, TokenKind, TokenStore};

use crate::config::{AuthConfig, StoreBackend};
use std::sync::Arc;

/// Build the token store selected in config
pub fn store_from_config(config: &AuthConfig) -> Arc<dyn TokenStore> {
    match config.store {
        StoreBackend::Keyring => Arc::new(KeyringTokenStore::new(&config.keyring_service)),
        StoreBackend::File => Arc::new(FileTokenStore::new(config.token_file_path())),
        StoreBackend::Memory => Arc::new(MemoryTokenStore::new()),
    }
}
