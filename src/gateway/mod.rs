//! Authenticated request gateway
//!
//! Wraps a `reqwest` client so that every request carries the stored access
//! token, and a `401 Unauthorized` is recovered by a single-flight refresh of
//! the credential pair. Requests that hit `401` while a refresh is running
//! wait for it and are replayed once with the new token. When renewal is
//! impossible or rejected, or a replayed request is still unauthorized, the
//! credentials are cleared and the injected expiry handler fires.

pub mod error;
pub mod renewal;
pub mod request;

pub use error::{GatewayError, RenewalError, Result};
pub use renewal::{RenewalCoordinator, RenewalOutcome};
pub use request::{ApiRequest, FilePart};

use reqwest::{Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::{
    AuthExpiredHandler, ExpiryLatch, IgnoreExpiry, MemoryTokenStore, TokenKind, TokenStore,
};
use crate::config::Config;
use crate::metrics::METRICS;
use crate::types::{ApiErrorBody, RefreshRequest, TokenPair};
use renewal::{Flight, Ticket};
use request::Body;

pub const REFRESH_PATH: &str = "/auth/refresh";

pub struct Gateway {
    client: reqwest::Client,
    base_url: Url,
    store: Arc<dyn TokenStore>,
    coordinator: RenewalCoordinator,
    /// Bearer installed by the last renewal, used when the store has none
    default_bearer: RwLock<Option<String>>,
    expiry: ExpiryLatch,
}

pub struct GatewayBuilder {
    base_url: String,
    timeout: Duration,
    user_agent: Option<String>,
    store: Option<Arc<dyn TokenStore>>,
    on_expired: Option<Arc<dyn AuthExpiredHandler>>,
}

impl GatewayBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn on_auth_expired(mut self, handler: Arc<dyn AuthExpiredHandler>) -> Self {
        self.on_expired = Some(handler);
        self
    }

    pub fn build(self) -> Result<Gateway> {
        let mut base_url = Url::parse(&self.base_url)?;
        // Keep any path prefix when joining relative endpoint paths
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut client = reqwest::Client::builder().timeout(self.timeout);
        if let Some(user_agent) = self.user_agent {
            client = client.user_agent(user_agent);
        }

        Ok(Gateway {
            client: client.build()?,
            base_url,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryTokenStore::new()) as Arc<dyn TokenStore>),
            coordinator: RenewalCoordinator::new(),
            default_bearer: RwLock::new(None),
            expiry: ExpiryLatch::new(
                self.on_expired
                    .unwrap_or_else(|| Arc::new(IgnoreExpiry) as Arc<dyn AuthExpiredHandler>),
            ),
        })
    }
}

impl Gateway {
    pub fn builder(base_url: impl Into<String>) -> GatewayBuilder {
        GatewayBuilder {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            user_agent: None,
            store: None,
            on_expired: None,
        }
    }

    pub fn from_config(
        config: &Config,
        store: Arc<dyn TokenStore>,
        on_expired: Arc<dyn AuthExpiredHandler>,
    ) -> Result<Self> {
        Self::builder(config.api.base_url.clone())
            .timeout(config.api.timeout())
            .user_agent(config.api.user_agent.clone())
            .token_store(store)
            .on_auth_expired(on_expired)
            .build()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn is_renewing(&self) -> bool {
        self.coordinator.is_renewing()
    }

    /// Requests currently parked behind an in-flight renewal
    pub fn renewal_waiters(&self) -> usize {
        self.coordinator.waiting()
    }

    /// Resolve an endpoint path against the base URL. Paths that resolve to
    /// another origin are refused so the bearer token never leaves the API host.
    pub fn url(&self, path: &str) -> Result<Url> {
        let url = self.base_url.join(path.trim_start_matches('/'))?;
        if url.origin() != self.base_url.origin() {
            return Err(GatewayError::ForeignUrl(url.to_string()));
        }
        Ok(url)
    }

    /// Send a request with bearer decoration and 401 recovery.
    ///
    /// Any status other than 401 is returned as-is. Terminal authentication
    /// failures come back as [`GatewayError::SessionExpired`] or
    /// [`GatewayError::Renewal`], after the session has been cleared.
    pub async fn send(&self, mut request: ApiRequest) -> Result<Response> {
        let bearer = self.bearer().await;
        let response = self.dispatch(&request, bearer.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        if request.retried {
            return Err(self.end_session(&request).await);
        }

        // At most one renewal per logical request
        request.retried = true;

        let token = loop {
            match self.coordinator.begin() {
                Ticket::Waiter(waiter) => {
                    debug!(
                        request_id = %request.id,
                        path = %request.path,
                        "Waiting for in-flight renewal"
                    );
                    match waiter.wait().await {
                        // Leader went away without an outcome; take over or join the next one
                        Err(RenewalError::Abandoned) => continue,
                        outcome => break outcome?,
                    }
                }
                Ticket::Leader(flight) => break self.renew(flight).await?,
            }
        };

        let response = self.dispatch(&request, Some(&token)).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(self.end_session(&request).await);
        }
        Ok(response)
    }

    /// Send without credentials and without 401 interception
    pub async fn send_public(&self, request: ApiRequest) -> Result<Response> {
        self.dispatch(&request, None).await
    }

    /// Send and decode a JSON body, mapping non-success statuses to errors
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let response = self.send(request).await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send_json(ApiRequest::get(path)).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Self::with_body(ApiRequest::post(path), body)?).await
    }

    pub async fn patch_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Self::with_body(ApiRequest::patch(path), body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let response = self.send(ApiRequest::delete(path)).await?;
        Self::check(response).await?;
        Ok(())
    }

    fn with_body<B: Serialize + ?Sized>(request: ApiRequest, body: &B) -> Result<ApiRequest> {
        Ok(request.json(body)?)
    }

    /// Pass successful responses through, turn the rest into `Status` errors
    pub async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Status {
            status,
            message: error_message(status, &body),
        })
    }

    /// Persist a freshly issued credential pair and re-arm the expiry handler
    pub async fn store_tokens(&self, pair: &TokenPair) -> Result<()> {
        self.store
            .save(TokenKind::Access, &pair.access_token)
            .await
            .map_err(GatewayError::Store)?;
        self.store
            .save(TokenKind::Refresh, &pair.refresh_token)
            .await
            .map_err(GatewayError::Store)?;
        self.expiry.rearm();
        Ok(())
    }

    /// Forget both tokens and the default bearer
    pub async fn clear_session(&self) {
        if let Err(e) = self.store.clear().await {
            warn!("Failed to clear stored credentials: {}", e);
        }
        self.set_default_bearer(None);
    }

    async fn bearer(&self) -> Option<String> {
        match self.store.get(TokenKind::Access).await {
            Ok(Some(token)) if !token.is_empty() => Some(token),
            Ok(_) => self.default_bearer(),
            Err(e) => {
                warn!("Failed to read access token, sending without it: {}", e);
                self.default_bearer()
            }
        }
    }

    fn default_bearer(&self) -> Option<String> {
        self.default_bearer
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_default_bearer(&self, token: Option<String>) {
        *self
            .default_bearer
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = token;
    }

    async fn dispatch(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<Response> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path)?);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        match &request.body {
            Some(Body::Json(body)) => builder = builder.json(body),
            Some(Body::File(part)) => builder = builder.multipart(part.to_form()?),
            None => {}
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();

        METRICS
            .requests_total
            .with_label_values(&[request.method.as_str(), status.as_str()])
            .inc();
        debug!(
            request_id = %request.id,
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            retry = request.retried,
            "API response"
        );

        Ok(response)
    }

    /// Run the refresh as the renewal leader and settle every waiter
    async fn renew(&self, flight: Flight<'_>) -> Result<String> {
        let refresh_token = match self.store.get(TokenKind::Refresh).await {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => {
                return Err(self.fail_renewal(flight, RenewalError::MissingRefreshToken).await);
            }
            Err(e) => {
                let error = RenewalError::Store(e.to_string());
                return Err(self.fail_renewal(flight, error).await);
            }
        };

        let pair = match self.request_refresh(&refresh_token).await {
            Ok(pair) => pair,
            Err(e) => return Err(self.fail_renewal(flight, e).await),
        };

        if let Err(e) = self.store_tokens(&pair).await {
            return Err(self.fail_renewal(flight, RenewalError::Store(e.to_string())).await);
        }
        self.set_default_bearer(Some(pair.access_token.clone()));

        let queued = flight.settle(Ok(pair.access_token.clone()));
        METRICS.renewals_total.with_label_values(&["success"]).inc();
        info!(queued, "Credentials renewed");

        Ok(pair.access_token)
    }

    async fn request_refresh(
        &self,
        refresh_token: &str,
    ) -> std::result::Result<TokenPair, RenewalError> {
        let body = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };
        let request = ApiRequest::post(REFRESH_PATH)
            .json(&body)
            .map_err(|e| RenewalError::Transport(e.to_string()))?;

        let response = self
            .dispatch(&request, None)
            .await
            .map_err(|e| RenewalError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RenewalError::Rejected {
                status: status.as_u16(),
                message: error_message(status, &text),
            });
        }

        response
            .json::<TokenPair>()
            .await
            .map_err(|e| RenewalError::Transport(format!("invalid refresh response: {}", e)))
    }

    async fn fail_renewal(&self, flight: Flight<'_>, error: RenewalError) -> GatewayError {
        let outcome = match &error {
            RenewalError::MissingRefreshToken => "missing_refresh_token",
            RenewalError::Rejected { .. } => "rejected",
            _ => "error",
        };
        METRICS.renewals_total.with_label_values(&[outcome]).inc();
        warn!("Credential renewal failed, ending session: {}", error);

        self.clear_session().await;
        self.force_reauth();
        let queued = flight.settle(Err(error.clone()));
        debug!(queued, "Rejected queued requests");

        GatewayError::Renewal(error)
    }

    async fn end_session(&self, request: &ApiRequest) -> GatewayError {
        warn!(
            request_id = %request.id,
            path = %request.path,
            "Still unauthorized after renewal, ending session"
        );
        self.clear_session().await;
        self.force_reauth();
        GatewayError::SessionExpired
    }

    fn force_reauth(&self) {
        if self.expiry.fire() {
            METRICS.forced_logouts_total.inc();
            info!("Re-authentication required");
        }
    }
}

/// Best human-readable message for an error response
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        return parsed.joined();
    }
    let body = body.trim();
    if body.is_empty() {
        status.canonical_reason().unwrap_or("unknown error").to_string()
    } else {
        body.to_string()
    }
}
