use async_trait::async_trait;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use registry_lister::catalog::{CatalogRefresher, snapshot_channel};
use registry_lister::error::{RegistryError, RegistryResult};
use registry_lister::logging::Logger;
use registry_lister::registry::{
    CatalogSource, RealmTokenProvider, RegistryClient, ScopeFilter, TokenProvider,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Canned registry: path -> (status, body), plus a log of every request
#[derive(Clone, Default)]
struct MockRegistry {
    routes: Arc<HashMap<String, (u16, String)>>,
    slow_paths: Arc<Vec<String>>,
    requests: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl MockRegistry {
    fn new(routes: &[(&str, u16, &str)]) -> Self {
        Self {
            routes: Arc::new(
                routes
                    .iter()
                    .map(|(path, status, body)| (path.to_string(), (*status, body.to_string())))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    fn with_slow_path(mut self, path: &str) -> Self {
        self.slow_paths = Arc::new(vec![path.to_string()]);
        self
    }

    fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.lock().unwrap().clone()
    }

    fn requested_paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|(path, _)| path).collect()
    }

    async fn serve(&self) -> String {
        let app = Router::new().fallback(respond).with_state(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }
}

async fn respond(
    State(registry): State<MockRegistry>,
    uri: Uri,
    headers: HeaderMap,
) -> (StatusCode, String) {
    let path = uri.path().to_string();
    let auth = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    registry.requests.lock().unwrap().push((path.clone(), auth));

    if registry.slow_paths.contains(&path) {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }

    match registry.routes.get(&path) {
        Some((status, body)) => (StatusCode::from_u16(*status).unwrap(), body.clone()),
        None => (StatusCode::NOT_FOUND, r#"{"errors":[{"code":"NAME_UNKNOWN"}]}"#.to_string()),
    }
}

/// Echoes the requested scopes back inside the token
struct ScopeEchoTokens;

#[async_trait]
impl TokenProvider for ScopeEchoTokens {
    async fn acquire(&self, scopes: &[String]) -> RegistryResult<Option<String>> {
        Ok(Some(format!("tok:{}", scopes.join(" "))))
    }
}

struct FailingTokens;

#[async_trait]
impl TokenProvider for FailingTokens {
    async fn acquire(&self, _scopes: &[String]) -> RegistryResult<Option<String>> {
        Err(RegistryError::Transport("token service unreachable".to_string()))
    }
}

fn client(address: &str, tokens: Arc<dyn TokenProvider>) -> RegistryClient {
    RegistryClient::builder(address)
        .with_token_provider(tokens)
        .with_timeout(Duration::from_millis(500))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_catalog_uses_unscoped_bearer_token() {
    let registry = MockRegistry::new(&[(
        "/v2/_catalog",
        200,
        r#"{"repositories":["pub/a","priv/c"]}"#,
    )]);
    let address = registry.serve().await;

    let names = client(&address, Arc::new(ScopeEchoTokens))
        .fetch_catalog()
        .await
        .unwrap();

    assert_eq!(names, vec!["pub/a".to_string(), "priv/c".to_string()]);
    assert_eq!(
        registry.requests(),
        vec![("/v2/_catalog".to_string(), Some("Bearer tok:".to_string()))]
    );
}

#[tokio::test]
async fn test_tags_use_pull_scope_and_requested_name() {
    let registry = MockRegistry::new(&[(
        "/v2/pub/a/tags/list",
        200,
        r#"{"name":"someone/else","tags":["v1","v2"]}"#,
    )]);
    let address = registry.serve().await;

    let info = client(&address, Arc::new(ScopeEchoTokens))
        .fetch_tags("pub/a")
        .await
        .unwrap();

    assert_eq!(info.name, "pub/a");
    assert_eq!(info.tags, vec!["v1".to_string(), "v2".to_string()]);
    assert_eq!(
        registry.requests(),
        vec![(
            "/v2/pub/a/tags/list".to_string(),
            Some("Bearer tok:repository:pub/a:pull".to_string())
        )]
    );
}

#[tokio::test]
async fn test_token_failure_skips_http_call() {
    let registry = MockRegistry::new(&[("/v2/_catalog", 200, r#"{"repositories":[]}"#)]);
    let address = registry.serve().await;
    let client = client(&address, Arc::new(FailingTokens));

    let catalog_err = client.fetch_catalog().await.unwrap_err();
    let tags_err = client.fetch_tags("pub/a").await.unwrap_err();

    assert!(matches!(catalog_err, RegistryError::Auth(_)));
    assert!(matches!(tags_err, RegistryError::Auth(_)));
    assert!(registry.requests().is_empty());
}

#[tokio::test]
async fn test_non_success_status_is_transport_error() {
    let registry = MockRegistry::new(&[("/v2/_catalog", 503, "maintenance")]);
    let address = registry.serve().await;

    let err = client(&address, Arc::new(ScopeEchoTokens))
        .fetch_catalog()
        .await
        .unwrap_err();

    match err {
        RegistryError::Transport(msg) => assert!(msg.contains("maintenance"), "{}", msg),
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let registry = MockRegistry::new(&[
        ("/v2/_catalog", 200, "<html>proxy error</html>"),
        ("/v2/pub/a/tags/list", 200, r#"{"tags":"v1"}"#),
    ]);
    let address = registry.serve().await;
    let client = client(&address, Arc::new(ScopeEchoTokens));

    assert!(matches!(client.fetch_catalog().await, Err(RegistryError::Decode(_))));
    assert!(matches!(client.fetch_tags("pub/a").await, Err(RegistryError::Decode(_))));
}

#[tokio::test]
async fn test_hung_registry_times_out() {
    let registry = MockRegistry::new(&[("/v2/_catalog", 200, r#"{"repositories":[]}"#)])
        .with_slow_path("/v2/_catalog");
    let address = registry.serve().await;

    let started = std::time::Instant::now();
    let err = client(&address, Arc::new(ScopeEchoTokens))
        .fetch_catalog()
        .await
        .unwrap_err();

    assert!(matches!(err, RegistryError::Transport(_)));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = client(&address, Arc::new(ScopeEchoTokens))
        .fetch_catalog()
        .await
        .unwrap_err();

    assert!(matches!(err, RegistryError::Transport(_)));
}

#[tokio::test]
async fn test_refresh_cycle_against_registry() {
    let registry = MockRegistry::new(&[
        ("/v2/_catalog", 200, r#"{"repositories":["pub/a","pub/b","priv/c"]}"#),
        ("/v2/pub/a/tags/list", 500, "storage driver error"),
        ("/v2/pub/b/tags/list", 200, r#"{"name":"pub/b","tags":["v1","v2"]}"#),
        ("/v2/priv/c/tags/list", 200, r#"{"name":"priv/c","tags":["secret"]}"#),
    ]);
    let address = registry.serve().await;
    let (publisher, reader) = snapshot_channel();
    let refresher = CatalogRefresher::new(
        Arc::new(client(&address, Arc::new(ScopeEchoTokens))),
        ScopeFilter::new(vec!["pub/".to_string()]),
        publisher,
    );

    let report = refresher.refresh().await.unwrap();

    let snapshot = reader.current().unwrap();
    assert!(Arc::ptr_eq(&snapshot, &report.snapshot));
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.repositories()[0].name, "pub/b");
    assert_eq!(snapshot.repositories()[0].tags, vec!["v1".to_string(), "v2".to_string()]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].name, "pub/a");
    assert!(!registry
        .requested_paths()
        .contains(&"/v2/priv/c/tags/list".to_string()));
}

/// Registry with its own token service. `/v2/` answers 503 for the first
/// `outages` hits, then challenges with a realm on the same server. The
/// catalog only accepts the token that realm issues.
#[derive(Clone)]
struct TokenServiceRegistry {
    realm: String,
    outages: usize,
    challenge_hits: Arc<AtomicUsize>,
    token_queries: Arc<Mutex<Vec<String>>>,
}

impl TokenServiceRegistry {
    async fn serve(outages: usize) -> (String, Self) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        let registry = Self {
            realm: format!("{}/token", address),
            outages,
            challenge_hits: Arc::new(AtomicUsize::new(0)),
            token_queries: Arc::new(Mutex::new(Vec::new())),
        };
        let app = Router::new()
            .fallback(challenge_or_token)
            .with_state(registry.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (address, registry)
    }

    fn challenge_hits(&self) -> usize {
        self.challenge_hits.load(Ordering::SeqCst)
    }
}

async fn challenge_or_token(
    State(registry): State<TokenServiceRegistry>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    match uri.path() {
        "/v2/" => {
            let hit = registry.challenge_hits.fetch_add(1, Ordering::SeqCst);
            if hit < registry.outages {
                return (StatusCode::SERVICE_UNAVAILABLE, "registry restarting").into_response();
            }
            (
                StatusCode::UNAUTHORIZED,
                [(
                    header::WWW_AUTHENTICATE,
                    format!(r#"Bearer realm="{}",service="registry.test""#, registry.realm),
                )],
                "",
            )
                .into_response()
        }
        "/token" => {
            registry
                .token_queries
                .lock()
                .unwrap()
                .push(uri.query().unwrap_or_default().to_string());
            (StatusCode::OK, r#"{"token":"real-token"}"#).into_response()
        }
        "/v2/_catalog" => {
            let authorized = headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                == Some("Bearer real-token");
            if authorized {
                (StatusCode::OK, r#"{"repositories":["pub/a"]}"#).into_response()
            } else {
                (StatusCode::UNAUTHORIZED, "authentication required").into_response()
            }
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn realm_provider(address: &str) -> RealmTokenProvider {
    RealmTokenProvider::new(address, Duration::from_millis(500), false, Logger::default()).unwrap()
}

#[tokio::test]
async fn test_challenge_discovery_retries_after_registry_outage() {
    let (address, registry) = TokenServiceRegistry::serve(1).await;
    let provider = realm_provider(&address);

    let first = provider.acquire(&[]).await;
    let second = provider
        .acquire(&["repository:pub/a:pull".to_string()])
        .await
        .unwrap();
    let third = provider.acquire(&[]).await.unwrap();

    assert!(matches!(first, Err(RegistryError::Auth(_))));
    assert_eq!(second.as_deref(), Some("real-token"));
    assert_eq!(third.as_deref(), Some("real-token"));
    // Cached once the registry actually challenged.
    assert_eq!(registry.challenge_hits(), 2);
    assert_eq!(
        *registry.token_queries.lock().unwrap(),
        vec![
            "service=registry.test&scope=repository%3Apub%2Fa%3Apull".to_string(),
            "service=registry.test".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_catalog_recovers_on_next_cycle_after_outage() {
    let (address, _registry) = TokenServiceRegistry::serve(1).await;
    let client = client(&address, Arc::new(realm_provider(&address)));

    let during_outage = client.fetch_catalog().await;
    let after_restart = client.fetch_catalog().await.unwrap();

    assert!(matches!(during_outage, Err(RegistryError::Auth(_))));
    assert_eq!(after_restart, vec!["pub/a".to_string()]);
}

#[tokio::test]
async fn test_anonymous_registry_gets_no_authorization_header() {
    let registry = MockRegistry::new(&[
        ("/v2/", 200, "{}"),
        ("/v2/_catalog", 200, r#"{"repositories":["pub/a"]}"#),
    ]);
    let address = registry.serve().await;
    let provider = realm_provider(&address);

    assert_eq!(provider.acquire(&[]).await.unwrap(), None);
    let names = client(&address, Arc::new(provider))
        .fetch_catalog()
        .await
        .unwrap();

    assert_eq!(names, vec!["pub/a".to_string()]);
    assert_eq!(
        registry.requests(),
        vec![
            ("/v2/".to_string(), None),
            ("/v2/_catalog".to_string(), None),
        ]
    );
}
