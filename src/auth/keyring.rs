/// System keyring integration for token storage
/// Uses native keyring: Secret Service (Linux), Keychain (macOS), Credential Manager (Windows)
use anyhow::Result;
use async_trait::async_trait;
use keyring::Entry;

use super::store::{TokenKind, TokenStore};

/// One keyring entry per token kind, under a shared service name
pub struct KeyringTokenStore {
    service: String,
}

impl KeyringTokenStore {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, kind: TokenKind) -> Result<Entry> {
        Ok(Entry::new(&self.service, kind.key())?)
    }
}

#[async_trait]
impl TokenStore for KeyringTokenStore {
    async fn get(&self, kind: TokenKind) -> Result<Option<String>> {
        match self.entry(kind)?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, kind: TokenKind, value: &str) -> Result<()> {
        self.entry(kind)?.set_password(value)?;
        Ok(())
    }

    async fn remove(&self, kind: TokenKind) -> Result<()> {
        match self.entry(kind)?.delete_password() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()), // Already deleted
            Err(e) => Err(e.into()),
        }
    }
}
