/// FormSync API client
///
/// Authentication endpoints plus access to the underlying gateway. Login and
/// register are sent without credentials and outside 401 recovery; everything
/// else goes through [`Gateway::send`].
use reqwest::StatusCode;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{AuthExpiredHandler, TokenKind, TokenStore};
use crate::config::Config;
use crate::gateway::{ApiRequest, Gateway, GatewayError, Result};
use crate::types::{LoginRequest, Profile, RegisterRequest, TokenPair};

#[derive(Clone)]
pub struct FormSyncClient {
    gateway: Arc<Gateway>,
}

impl FormSyncClient {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }

    pub fn from_config(
        config: &Config,
        store: Arc<dyn TokenStore>,
        on_expired: Arc<dyn AuthExpiredHandler>,
    ) -> Result<Self> {
        Ok(Self::new(Gateway::from_config(config, store, on_expired)?))
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Whether an access token is currently stored
    pub async fn is_authenticated(&self) -> bool {
        matches!(
            self.gateway.token_store().get(TokenKind::Access).await,
            Ok(Some(token)) if !token.is_empty()
        )
    }

    /// Exchange email/password for a credential pair and store it
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair> {
        let request = ApiRequest::post("/auth/login").json(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;

        let response = self.gateway.send_public(request).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(GatewayError::InvalidCredentials);
        }

        let pair: TokenPair = Gateway::check(response).await?.json().await?;
        self.gateway.store_tokens(&pair).await?;
        info!("Logged in as {}", email);

        Ok(pair)
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<()> {
        let request = ApiRequest::post("/auth/register").json(&RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        })?;

        let response = self.gateway.send_public(request).await?;
        Gateway::check(response).await?;
        info!("Registered {}", email);
        Ok(())
    }

    /// Best-effort server logout; local credentials are cleared regardless
    pub async fn logout(&self) {
        if self.is_authenticated().await {
            if let Err(e) = self.server_logout().await {
                warn!("Server logout failed, clearing local session anyway: {}", e);
            }
        }

        self.gateway.clear_session().await;
        info!("Logged out");
    }

    async fn server_logout(&self) -> Result<()> {
        let request = ApiRequest::post("/auth/logout").json(&serde_json::json!({}))?;
        let response = self.gateway.send(request).await?;
        Gateway::check(response).await?;
        Ok(())
    }

    pub async fn profile(&self) -> Result<Profile> {
        self.gateway.get_json("/auth/profile").await
    }
}
