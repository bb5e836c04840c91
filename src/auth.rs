//! Authentication gate for the upload flow.
//!
//! The gate has two states. [`AuthGate::authenticate`] is the only way
//! from `Unauthenticated` to `Authenticated`: it asks a [`TokenSource`] for
//! an access token, then resolves the account behind it through an
//! [`IdentityLookup`].
//!
//! Token sources:
//!
//! - [`EnvToken`] reads `FOLIO_ACCESS_TOKEN`, for scripted runs with a
//!   token minted elsewhere. It is revalidated through the userinfo
//!   endpoint like any other token.
//! - [`LoopbackConsent`] runs the installed-app OAuth flow with PKCE. It
//!   prints the consent URL, serves a one-shot callback on
//!   `127.0.0.1:<redirect_port>` with axum, and exchanges the returned code
//!   at the token endpoint.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use folio_core::drive::DriveApi;
use folio_core::models::{AuthSession, UNKNOWN};
use folio_core::orchestrator::UploadOrchestrator;
use reqwest::Url;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::Credentials;
use crate::http::HttpPolicy;

pub const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
pub const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
pub const REVOKE_ENDPOINT: &str = "https://oauth2.googleapis.com/revoke";

/// Full Drive scope: `drive.file` cannot transfer ownership.
pub const SCOPES: &str =
    "https://www.googleapis.com/auth/drive https://www.googleapis.com/auth/userinfo.email";

pub const ACCESS_TOKEN_ENV: &str = "FOLIO_ACCESS_TOKEN";

/// How long the loopback callback waits for the browser before giving up.
pub const CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated(AuthSession),
}

/// Produces an access token. `Ok(None)` means the user declined.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn acquire(&self) -> Result<Option<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum LookupError {
    /// The token was rejected (HTTP 401).
    #[error("access token was rejected")]
    InvalidToken,
    #[error("userinfo lookup failed: {0}")]
    Failed(String),
}

/// Resolves the account behind an access token.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    async fn lookup(&self, access_token: &str) -> std::result::Result<UserIdentity, LookupError>;
}

pub struct AuthGate {
    state: AuthState,
}

impl Default for AuthGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthGate {
    pub fn new() -> Self {
        Self {
            state: AuthState::Unauthenticated,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn session(&self) -> Option<&AuthSession> {
        match &self.state {
            AuthState::Authenticated(session) => Some(session),
            AuthState::Unauthenticated => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    /// Acquire and validate a token. Returns the session, or `None` when the
    /// user cancelled. An already authenticated gate is returned as is.
    pub async fn authenticate(
        &mut self,
        source: &dyn TokenSource,
        identity: &dyn IdentityLookup,
    ) -> Result<Option<&AuthSession>> {
        if self.is_authenticated() {
            return Ok(self.session());
        }

        let Some(token) = source.acquire().await? else {
            info!("authentication cancelled");
            return Ok(None);
        };

        let who = match identity.lookup(&token).await {
            Ok(who) => who,
            Err(LookupError::InvalidToken) => {
                bail!("Google rejected the access token; sign in again")
            }
            Err(err) => {
                warn!(error = %err, "could not resolve account, continuing as Unknown");
                UserIdentity {
                    email: UNKNOWN.to_string(),
                    name: UNKNOWN.to_string(),
                }
            }
        };
        info!(email = %who.email, "authenticated");
        self.state = AuthState::Authenticated(AuthSession::new(token, who.email, who.name));
        Ok(self.session())
    }

    /// Attach collected device details to the current session.
    pub fn attach_device(&mut self, device: folio_core::models::DeviceInfo) {
        if let AuthState::Authenticated(session) = &mut self.state {
            session.device = Some(device);
        }
    }

    /// Revoke the token (best-effort), drop the session, and clear the queue.
    pub async fn logout<D: DriveApi>(
        &mut self,
        userinfo: &UserInfoClient,
        orchestrator: Option<&mut UploadOrchestrator<D>>,
    ) {
        if let AuthState::Authenticated(session) = &self.state {
            if let Err(err) = userinfo.revoke(&session.access_token).await {
                warn!(error = %err, "token revocation failed");
            }
        }
        self.state = AuthState::Unauthenticated;
        if let Some(orchestrator) = orchestrator {
            orchestrator.clear();
        }
        info!("logged out");
    }
}

/// Token from `FOLIO_ACCESS_TOKEN`.
pub struct EnvToken;

#[async_trait]
impl TokenSource for EnvToken {
    async fn acquire(&self) -> Result<Option<String>> {
        Ok(std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }
}

/// A token that is already known.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn acquire(&self) -> Result<Option<String>> {
        Ok(Some(self.0.clone()))
    }
}

#[derive(Debug, Default, Deserialize)]
struct UserInfo {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl UserInfo {
    fn into_identity(self) -> UserIdentity {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        let email = non_empty(self.email)
            .or_else(|| non_empty(self.id))
            .unwrap_or_else(|| UNKNOWN.to_string());
        let name = non_empty(self.name).unwrap_or_else(|| email.clone());
        UserIdentity { email, name }
    }
}

/// Google userinfo and token revocation endpoints.
pub struct UserInfoClient {
    http: HttpPolicy,
    userinfo_url: String,
    revoke_url: String,
}

impl UserInfoClient {
    pub fn new(http: HttpPolicy) -> Self {
        Self {
            http,
            userinfo_url: USERINFO_ENDPOINT.to_string(),
            revoke_url: REVOKE_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoints(mut self, userinfo_url: &str, revoke_url: &str) -> Self {
        self.userinfo_url = userinfo_url.to_string();
        self.revoke_url = revoke_url.to_string();
        self
    }

    pub async fn revoke(&self, access_token: &str) -> Result<()> {
        let response = self
            .http
            .send_with_retry(|c| c.post(&self.revoke_url).query(&[("token", access_token)]))
            .await?;
        if !response.status().is_success() {
            bail!("revoke returned HTTP {}", response.status());
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityLookup for UserInfoClient {
    async fn lookup(&self, access_token: &str) -> std::result::Result<UserIdentity, LookupError> {
        let response = self
            .http
            .send_with_retry(|c| c.get(&self.userinfo_url).bearer_auth(access_token))
            .await
            .map_err(|e| LookupError::Failed(e.to_string()))?;
        let status = response.status();
        if status.as_u16() == 401 {
            return Err(LookupError::InvalidToken);
        }
        if !status.is_success() {
            return Err(LookupError::Failed(format!("HTTP {}", status)));
        }
        let info: UserInfo = response
            .json()
            .await
            .map_err(|e| LookupError::Failed(e.to_string()))?;
        Ok(info.into_identity())
    }
}

/// PKCE verifier and its S256 challenge.
#[derive(Debug, Clone)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    pub fn generate() -> Self {
        let verifier = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        );
        Self::from_verifier(verifier)
    }

    pub fn from_verifier(verifier: String) -> Self {
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

/// What the browser brought back to the loopback callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Code(String),
    Denied,
    Invalid(String),
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

pub fn classify_callback(query: &CallbackQuery, expected_state: &str) -> CallbackOutcome {
    match query.error.as_deref() {
        Some("access_denied") => return CallbackOutcome::Denied,
        Some(other) => return CallbackOutcome::Invalid(format!("consent failed: {}", other)),
        None => {}
    }
    if query.state.as_deref() != Some(expected_state) {
        return CallbackOutcome::Invalid("state parameter mismatch".to_string());
    }
    match query.code.as_deref() {
        Some(code) if !code.is_empty() => CallbackOutcome::Code(code.to_string()),
        _ => CallbackOutcome::Invalid("callback carried no authorization code".to_string()),
    }
}

#[derive(Clone)]
struct CallbackState {
    expected_state: Arc<String>,
    tx: Arc<Mutex<Option<oneshot::Sender<CallbackOutcome>>>>,
}

async fn handle_callback(
    State(state): State<CallbackState>,
    Query(query): Query<CallbackQuery>,
) -> Html<&'static str> {
    let outcome = classify_callback(&query, &state.expected_state);
    let page = match &outcome {
        CallbackOutcome::Code(_) => "<p>folio is authorized. You can close this window.</p>",
        CallbackOutcome::Denied => "<p>Authorization was cancelled. You can close this window.</p>",
        CallbackOutcome::Invalid(_) => "<p>Authorization failed. Return to the terminal for details.</p>",
    };
    if let Ok(mut guard) = state.tx.lock() {
        if let Some(tx) = guard.take() {
            let _ = tx.send(outcome);
        }
    }
    Html(page)
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Installed-app OAuth consent with a loopback redirect.
pub struct LoopbackConsent {
    http: HttpPolicy,
    credentials: Credentials,
    port: u16,
    consent_timeout: Duration,
    auth_endpoint: String,
    token_endpoint: String,
}

impl LoopbackConsent {
    pub fn new(http: HttpPolicy, credentials: Credentials, port: u16) -> Self {
        Self {
            http,
            credentials,
            port,
            consent_timeout: CONSENT_TIMEOUT,
            auth_endpoint: AUTH_ENDPOINT.to_string(),
            token_endpoint: TOKEN_ENDPOINT.to_string(),
        }
    }

    pub fn with_token_endpoint(mut self, token_endpoint: &str) -> Self {
        self.token_endpoint = token_endpoint.to_string();
        self
    }

    pub fn with_consent_timeout(mut self, timeout: Duration) -> Self {
        self.consent_timeout = timeout;
        self
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/callback", self.port)
    }

    pub fn consent_url(&self, pkce: &Pkce, state: &str) -> Result<Url> {
        let redirect_uri = self.redirect_uri();
        Url::parse_with_params(
            &self.auth_endpoint,
            &[
                ("client_id", self.credentials.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("code_challenge", pkce.challenge.as_str()),
                ("code_challenge_method", "S256"),
                ("state", state),
                ("prompt", "consent"),
            ],
        )
        .context("invalid OAuth authorization endpoint")
    }

    async fn wait_for_callback(&self, state: &str) -> Result<CallbackOutcome> {
        let (tx, rx) = oneshot::channel();
        let app = Router::new()
            .route("/callback", get(handle_callback))
            .with_state(CallbackState {
                expected_state: Arc::new(state.to_string()),
                tx: Arc::new(Mutex::new(Some(tx))),
            });

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", self.port))
            .await
            .with_context(|| format!("Failed to bind OAuth callback on port {}", self.port))?;
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                })
                .await
        });

        let outcome = match tokio::time::timeout(self.consent_timeout, rx).await {
            Ok(received) => received.context("OAuth callback server stopped early")?,
            Err(_) => {
                warn!(
                    timeout_secs = self.consent_timeout.as_secs(),
                    "no OAuth callback received, treating consent as cancelled"
                );
                CallbackOutcome::Denied
            }
        };
        let _ = stop_tx.send(());
        if tokio::time::timeout(Duration::from_secs(5), server).await.is_err() {
            debug!("callback server did not shut down in time");
        }
        Ok(outcome)
    }

    async fn exchange(&self, code: &str, pkce: &Pkce) -> Result<String> {
        let redirect_uri = self.redirect_uri();
        let mut form = vec![
            ("code", code),
            ("client_id", self.credentials.client_id.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
            ("code_verifier", pkce.verifier.as_str()),
        ];
        if let Some(secret) = &self.credentials.client_secret {
            form.push(("client_secret", secret.as_str()));
        }
        let response = self
            .http
            .send_with_retry(|c| c.post(&self.token_endpoint).form(&form))
            .await
            .context("token exchange request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("token exchange failed ({}): {}", status, body);
        }
        let token: TokenResponse = response
            .json()
            .await
            .context("token endpoint returned an unexpected body")?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl TokenSource for LoopbackConsent {
    async fn acquire(&self) -> Result<Option<String>> {
        let pkce = Pkce::generate();
        let state = uuid::Uuid::new_v4().to_string();
        let url = self.consent_url(&pkce, &state)?;

        eprintln!("Open this URL in your browser to authorize folio:\n\n  {}\n", url);
        eprintln!("Waiting for the redirect to {} ...", self.redirect_uri());

        match self.wait_for_callback(&state).await? {
            CallbackOutcome::Code(code) => Ok(Some(self.exchange(&code, &pkce).await?)),
            CallbackOutcome::Denied => Ok(None),
            CallbackOutcome::Invalid(reason) => bail!(reason),
        }
    }
}
