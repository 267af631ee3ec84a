// RegistryClient performs the two read-only Docker Registry v2 calls the
// lister needs: the catalog listing and the per-repository tag listing.
// Each call acquires its own scoped bearer token, carries the configured
// timeout, and fails exactly once; retrying is the scheduler's job.

use crate::catalog::snapshot::RepositoryInfo;
use crate::config::ListerConfig;
use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{RegistryError, RegistryResult};
use crate::logging::Logger;
use crate::registry::scope::ScopeRequest;
use crate::registry::token::TokenProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Source of catalog data for a refresh cycle
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Every repository name the registry knows, public or not
    async fn fetch_catalog(&self) -> RegistryResult<Vec<String>>;

    /// Tag list of one repository
    async fn fetch_tags(&self, name: &str) -> RegistryResult<RepositoryInfo>;
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    repositories: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TagListResponse {
    tags: Option<Vec<String>>,
}

/// Decode a `/v2/_catalog` body. A null repository list is an empty catalog.
pub fn decode_catalog(body: &str) -> RegistryResult<Vec<String>> {
    let catalog: CatalogResponse = serde_json::from_str(body)
        .map_err(|e| RegistryError::Decode(format!("Failed to parse catalog response: {}", e)))?;
    Ok(catalog.repositories.unwrap_or_default())
}

/// Decode a `/v2/<name>/tags/list` body.
///
/// The `name` echoed by the registry is ignored; the result always carries the
/// repository that was asked for.
pub fn decode_tag_list(repository: &str, body: &str) -> RegistryResult<RepositoryInfo> {
    let list: TagListResponse = serde_json::from_str(body).map_err(|e| {
        RegistryError::Decode(format!(
            "Failed to parse tags response for {}: {}",
            repository, e
        ))
    })?;
    Ok(RepositoryInfo::new(repository, list.tags.unwrap_or_default()))
}

pub struct RegistryClientBuilder {
    address: String,
    token_provider: Option<Arc<dyn TokenProvider>>,
    timeout: Duration,
    skip_tls: bool,
    output: Logger,
}

impl RegistryClientBuilder {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            token_provider: None,
            timeout: Duration::from_secs(crate::config::DEFAULT_REQUEST_TIMEOUT_SECS),
            skip_tls: false,
            output: Logger::default(),
        }
    }

    pub fn from_config(config: &ListerConfig) -> Self {
        Self::new(config.base_address())
            .with_timeout(config.request_timeout)
            .with_skip_tls(config.skip_tls)
    }

    pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_skip_tls(mut self, skip_tls: bool) -> Self {
        self.skip_tls = skip_tls;
        self
    }

    pub fn with_output(mut self, output: Logger) -> Self {
        self.output = output;
        self
    }

    pub fn build(self) -> RegistryResult<RegistryClient> {
        let token_provider = self.token_provider.ok_or_else(|| {
            RegistryError::Auth("Registry client requires a token provider".to_string())
        })?;

        let client = Client::builder()
            .timeout(self.timeout)
            .danger_accept_invalid_certs(self.skip_tls)
            .build()
            .map_err(|e| {
                RegistryError::Transport(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(RegistryClient {
            client,
            address: self.address.trim_end_matches('/').to_string(),
            token_provider,
            output: self.output,
        })
    }
}

#[derive(Clone)]
pub struct RegistryClient {
    client: Client,
    address: String,
    token_provider: Arc<dyn TokenProvider>,
    output: Logger,
}

impl RegistryClient {
    pub fn builder(address: impl Into<String>) -> RegistryClientBuilder {
        RegistryClientBuilder::new(address)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn catalog_url(&self) -> String {
        format!("{}/v2/_catalog", self.address)
    }

    pub fn tags_url(&self, repository: &str) -> String {
        format!("{}/v2/{}/tags/list", self.address, repository)
    }

    async fn token(&self, scopes: &[String]) -> RegistryResult<Option<String>> {
        self.token_provider.acquire(scopes).await.map_err(|e| match e {
            RegistryError::Auth(msg) => RegistryError::Auth(msg),
            other => RegistryError::Auth(format!("Error obtaining access token: {}", other)),
        })
    }

    /// GET returning the body of a 2xx response. `token` is `None` only for
    /// registries that answered `/v2/` without a challenge.
    async fn get_body(
        &self,
        url: &str,
        token: Option<&str>,
        operation: &str,
    ) -> RegistryResult<String> {
        self.output.detail(&format!("GET {}", url));

        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, operation))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(HttpErrorHandler::handle_registry_error(
                status,
                &error_text,
                operation,
            ));
        }

        response
            .text()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, operation))
    }
}

#[async_trait]
impl CatalogSource for RegistryClient {
    async fn fetch_catalog(&self) -> RegistryResult<Vec<String>> {
        self.output.verbose("Fetching registry catalog");

        let token = self.token(&[]).await?;
        let body = self
            .get_body(&self.catalog_url(), token.as_deref(), "catalog listing")
            .await?;
        let repositories = decode_catalog(&body)?;

        self.output.verbose(&format!(
            "Catalog lists {} repositories",
            repositories.len()
        ));
        Ok(repositories)
    }

    async fn fetch_tags(&self, name: &str) -> RegistryResult<RepositoryInfo> {
        self.output
            .verbose(&format!("Listing tags for repository: {}", name));

        let token = self.token(&[ScopeRequest::pull(name).to_string()]).await?;
        let body = self
            .get_body(&self.tags_url(name), token.as_deref(), "tag listing")
            .await?;
        let info = decode_tag_list(name, &body)?;

        self.output.detail(&format!(
            "Found {} tags for repository {}",
            info.tags.len(),
            name
        ));
        Ok(info)
    }
}
