//! Bearer token acquisition for registry calls
//!
//! The registry client never talks to a token service itself; it asks a
//! [`TokenProvider`] for a token covering the scopes it needs.

use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{RegistryError, RegistryResult};
use crate::logging::Logger;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Mint a bearer token for `scopes`. An empty slice asks for registry-level
    /// access (the catalog call).
    ///
    /// `None` means the registry serves these calls anonymously and no
    /// `Authorization` header is sent.
    async fn acquire(&self, scopes: &[String]) -> RegistryResult<Option<String>>;
}

/// Hands out one pre-issued token regardless of scope
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn acquire(&self, _scopes: &[String]) -> RegistryResult<Option<String>> {
        if self.token.is_empty() {
            return Err(RegistryError::Auth("Static token is empty".to_string()));
        }
        Ok(Some(self.token.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub realm: String,
    pub service: String,
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// Parse a `Bearer realm="...",service="...",scope="..."` challenge
pub fn parse_auth_challenge(auth_header: &str) -> Option<AuthChallenge> {
    let params_str = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))?;

    let mut params = HashMap::new();
    for param in params_str.split(',') {
        let param = param.trim();
        if let Some((key, value)) = param.split_once('=') {
            params.insert(key.trim(), value.trim().trim_matches('"'));
        }
    }

    let realm = params.get("realm")?;
    Some(AuthChallenge {
        realm: realm.to_string(),
        service: params.get("service").unwrap_or(&"").to_string(),
        scope: params.get("scope").map(|s| s.to_string()),
    })
}

/// Requests tokens from the realm advertised by the registry's `/v2/` challenge
///
/// The challenge is discovered on first use and cached once `/v2/` gives a
/// definite answer: a 401 challenge, or a 2xx from a registry that needs no
/// auth. Any other status is an error and discovery runs again next call.
pub struct RealmTokenProvider {
    client: Client,
    registry_address: String,
    username: Option<String>,
    password: Option<String>,
    challenge: OnceCell<Option<AuthChallenge>>,
    output: Logger,
}

impl RealmTokenProvider {
    pub fn new(
        registry_address: &str,
        timeout: Duration,
        skip_tls: bool,
        output: Logger,
    ) -> RegistryResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(skip_tls)
            .build()
            .map_err(|e| RegistryError::Auth(format!("Failed to create auth client: {}", e)))?;

        Ok(Self {
            client,
            registry_address: registry_address.trim_end_matches('/').to_string(),
            username: None,
            password: None,
            challenge: OnceCell::new(),
            output,
        })
    }

    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    async fn challenge(&self) -> RegistryResult<Option<&AuthChallenge>> {
        let challenge = self
            .challenge
            .get_or_try_init(|| self.discover_challenge())
            .await?;
        Ok(challenge.as_ref())
    }

    async fn discover_challenge(&self) -> RegistryResult<Option<AuthChallenge>> {
        self.output.detail("Sending auth challenge request to registry");

        let url = format!("{}/v2/", self.registry_address);
        let response = self.client.get(&url).send().await.map_err(|e| {
            RegistryError::Auth(
                NetworkErrorHandler::handle_network_error(&e, "auth challenge").to_string(),
            )
        })?;

        let status = response.status();
        if status.is_success() {
            self.output
                .info("No authentication challenge - registry does not require auth");
            return Ok(None);
        }
        if status != reqwest::StatusCode::UNAUTHORIZED {
            return Err(RegistryError::Auth(format!(
                "Auth challenge request returned {}",
                status
            )));
        }

        let header = response
            .headers()
            .get(reqwest::header::WWW_AUTHENTICATE)
            .ok_or_else(|| {
                RegistryError::Auth("Registry returned 401 without a challenge".to_string())
            })?
            .to_str()
            .map_err(|e| RegistryError::Auth(format!("Invalid auth header: {}", e)))?;

        let challenge = parse_auth_challenge(header).ok_or_else(|| {
            RegistryError::Auth(format!("Unsupported auth challenge: {}", header))
        })?;

        self.output.verbose(&format!(
            "Auth challenge received: realm={}, service={}",
            challenge.realm, challenge.service
        ));
        Ok(Some(challenge))
    }

    fn token_url(challenge: &AuthChallenge, scopes: &[String]) -> RegistryResult<Url> {
        let mut url = Url::parse(&challenge.realm)
            .map_err(|e| RegistryError::Auth(format!("Invalid token realm: {}", e)))?;
        {
            let mut query = url.query_pairs_mut();
            if !challenge.service.is_empty() {
                query.append_pair("service", &challenge.service);
            }
            for scope in scopes {
                query.append_pair("scope", scope);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl TokenProvider for RealmTokenProvider {
    async fn acquire(&self, scopes: &[String]) -> RegistryResult<Option<String>> {
        let Some(challenge) = self.challenge().await? else {
            return Ok(None);
        };

        let url = Self::token_url(challenge, scopes)?;
        self.output.detail(&format!("Requesting token from: {}", url));

        let mut request = self.client.get(url);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }

        let response = request.send().await.map_err(|e| {
            RegistryError::Auth(
                NetworkErrorHandler::handle_network_error(&e, "token request").to_string(),
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(HttpErrorHandler::handle_auth_error(status, &error_text));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| RegistryError::Auth(format!("Failed to parse token response: {}", e)))?;

        token_response
            .token
            .or(token_response.access_token)
            .filter(|token| !token.is_empty())
            .map(Some)
            .ok_or_else(|| RegistryError::Auth("Token response carried no token".to_string()))
    }
}
