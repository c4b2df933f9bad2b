/// Credential storage abstraction
///
/// The store is a dumb key-value area holding the access and refresh tokens
/// under two fixed keys. It has no logic of its own; the gateway decides when
/// tokens are written or cleared.
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub const ALL: [TokenKind; 2] = [TokenKind::Access, TokenKind::Refresh];

    /// Fixed storage key for this kind
    pub fn key(&self) -> &'static str {
        match self {
            TokenKind::Access => "formsync_auth_token",
            TokenKind::Refresh => "formsync_refresh_token",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, kind: TokenKind) -> Result<Option<String>>;

    async fn save(&self, kind: TokenKind, value: &str) -> Result<()>;

    async fn remove(&self, kind: TokenKind) -> Result<()>;

    /// Remove both tokens
    async fn clear(&self) -> Result<()> {
        for kind in TokenKind::ALL {
            self.remove(kind).await?;
        }
        Ok(())
    }
}

/// In-process store, nothing survives a restart
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<TokenKind, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(access: &str, refresh: &str) -> Self {
        let store = Self::new();
        {
            let mut tokens = store.lock();
            tokens.insert(TokenKind::Access, access.to_string());
            tokens.insert(TokenKind::Refresh, refresh.to_string());
        }
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<TokenKind, String>> {
        // A poisoned map is still a valid map
        self.tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, kind: TokenKind) -> Result<Option<String>> {
        Ok(self.lock().get(&kind).cloned())
    }

    async fn save(&self, kind: TokenKind, value: &str) -> Result<()> {
        self.lock().insert(kind, value.to_string());
        Ok(())
    }

    async fn remove(&self, kind: TokenKind) -> Result<()> {
        self.lock().remove(&kind);
        Ok(())
    }
}
