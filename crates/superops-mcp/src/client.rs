//! reqwest GraphQL client for the SuperOps API.
//!
//! One POST per operation. Queries and mutations share the same path: the
//! request body always carries the document under `query`. Failures are
//! normalised into [`SuperOpsError`]; rate-limit hints are surfaced but never
//! acted on here.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{ConfigError, Credentials};

// ── Constants ───────────────────────────────────────────────────────

/// Header carrying the tenant subdomain.
const SUBDOMAIN_HEADER: &str = "CustomerSubDomain";

// ── Errors ──────────────────────────────────────────────────────────

/// Errors from SuperOps API operations.
#[derive(Debug, thiserror::Error)]
pub enum SuperOpsError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status}: {status_text}")]
    Http { status: u16, status_text: String },

    /// First entry of a GraphQL `errors` array.
    #[error("{message}")]
    Api {
        message: String,
        code: Option<String>,
        retry_after: Option<u64>,
    },

    #[error("No data returned from SuperOps API")]
    NoData,

    #[error("format error: {0}")]
    Format(String),
}

impl SuperOpsError {
    /// Machine-readable error code from the GraphQL error extensions.
    pub fn code(&self) -> Option<&str> {
        match self {
            SuperOpsError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Retry hint from the GraphQL error extensions.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SuperOpsError::Api { retry_after, .. } => retry_after.map(Duration::from_secs),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SuperOpsError>;

// ── Wire format ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<&'a Value>,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<GraphqlErrorEntry>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorEntry {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    extensions: Option<ErrorExtensions>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorExtensions {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    retry_after: Option<Value>,
}

impl From<GraphqlErrorEntry> for SuperOpsError {
    fn from(entry: GraphqlErrorEntry) -> Self {
        let extensions = entry.extensions.unwrap_or_default();
        // retryAfter arrives as a number or a numeric string depending on the gateway.
        let retry_after = extensions.retry_after.and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });
        SuperOpsError::Api {
            message: entry
                .message
                .unwrap_or_else(|| "Unknown GraphQL error".to_string()),
            code: extensions.code,
            retry_after,
        }
    }
}

impl GraphqlResponse {
    fn into_data(self) -> Result<Value> {
        if let Some(first) = self.errors.and_then(|errors| errors.into_iter().next()) {
            return Err(first.into());
        }
        self.data.ok_or(SuperOpsError::NoData)
    }
}

// ── Transport seam ──────────────────────────────────────────────────

/// Executes one GraphQL operation and returns its `data` payload.
///
/// Domain modules talk to this trait instead of [`SuperOpsClient`] so they
/// can be tested with a recording mock.
#[async_trait]
pub trait GraphqlTransport: Send + Sync {
    async fn execute(&self, operation: &str, variables: Option<Value>) -> Result<Value>;
}

// ── Client ──────────────────────────────────────────────────────────

/// SuperOps GraphQL client.
#[derive(Debug)]
pub struct SuperOpsClient {
    http: reqwest::Client,
    endpoint: String,
    api_token: String,
    subdomain: String,
}

impl SuperOpsClient {
    pub fn new(credentials: &Credentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: credentials.endpoint().to_string(),
            api_token: credentials.api_token.clone(),
            subdomain: credentials.subdomain.clone(),
        }
    }

    /// Send requests to `endpoint` instead of the region default.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run a query and deserialize its `data` payload.
    pub async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Option<Value>,
    ) -> Result<T> {
        let data = self.execute(query, variables).await?;
        serde_json::from_value(data).map_err(|e| SuperOpsError::Format(e.to_string()))
    }

    /// Run a mutation. Mutations travel through the query path.
    pub async fn mutate<T: DeserializeOwned>(
        &self,
        mutation: &str,
        variables: Option<Value>,
    ) -> Result<T> {
        self.query(mutation, variables).await
    }
}

#[async_trait]
impl GraphqlTransport for SuperOpsClient {
    async fn execute(&self, operation: &str, variables: Option<Value>) -> Result<Value> {
        let body = GraphqlRequest {
            query: operation,
            variables: variables.as_ref(),
        };

        debug!("POST {} ({} bytes)", self.endpoint, operation.len());

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_token)
            .header(SUBDOMAIN_HEADER, &self.subdomain)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SuperOpsError::Http {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let payload: GraphqlResponse = response.json().await?;
        payload.into_data()
    }
}

// ── Provider ────────────────────────────────────────────────────────

type CredentialLoader =
    Box<dyn Fn() -> std::result::Result<Credentials, ConfigError> + Send + Sync>;
type TransportFactory = Box<dyn Fn(&Credentials) -> Arc<dyn GraphqlTransport> + Send + Sync>;

/// A built transport and the credentials it was built from.
#[derive(Clone)]
pub struct Connection {
    pub credentials: Credentials,
    pub transport: Arc<dyn GraphqlTransport>,
}

/// Owns the process-wide transport.
///
/// The transport is built on first use from freshly resolved credentials and
/// reused until [`ClientProvider::reset`] drops it. Rotated credentials only
/// take effect after a reset.
pub struct ClientProvider {
    loader: CredentialLoader,
    factory: TransportFactory,
    cached: Mutex<Option<Connection>>,
}

impl ClientProvider {
    /// Provider with a custom credential loader and a real [`SuperOpsClient`].
    pub fn new<L>(loader: L) -> Self
    where
        L: Fn() -> std::result::Result<Credentials, ConfigError> + Send + Sync + 'static,
    {
        Self::with_factory(loader, |credentials| {
            Arc::new(SuperOpsClient::new(credentials)) as Arc<dyn GraphqlTransport>
        })
    }

    /// Provider with a custom credential loader and transport factory.
    pub fn with_factory<L, F>(loader: L, factory: F) -> Self
    where
        L: Fn() -> std::result::Result<Credentials, ConfigError> + Send + Sync + 'static,
        F: Fn(&Credentials) -> Arc<dyn GraphqlTransport> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            factory: Box::new(factory),
            cached: Mutex::new(None),
        }
    }

    /// Resolve credentials now. Never cached.
    pub fn credentials(&self) -> std::result::Result<Credentials, ConfigError> {
        (self.loader)()
    }

    pub fn is_configured(&self) -> bool {
        self.credentials().is_ok()
    }

    /// Return the cached transport, building it on first use.
    pub fn get(&self) -> Result<Arc<dyn GraphqlTransport>> {
        self.connection().map(|connection| connection.transport)
    }

    /// Like [`get`](Self::get), together with the credentials the transport uses.
    pub fn connection(&self) -> Result<Connection> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(connection) = cached.as_ref() {
            return Ok(connection.clone());
        }
        let credentials = self.credentials()?;
        info!(
            "Creating SuperOps client for '{}' ({})",
            credentials.subdomain,
            credentials.endpoint()
        );
        let connection = Connection {
            transport: (self.factory)(&credentials),
            credentials,
        };
        *cached = Some(connection.clone());
        Ok(connection)
    }

    /// Drop the cached transport; the next [`get`](Self::get) rebuilds it.
    pub fn reset(&self) {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if cached.take().is_some() {
            debug!("SuperOps client reset");
        }
    }
}

// ── MockTransport for testing ───────────────────────────────────────

#[cfg(test)]
pub(crate) mod mock {
    use super::*;

    type Responder = Box<dyn Fn() -> Result<Value> + Send + Sync>;

    /// Records every operation and answers with a fixed responder.
    pub struct MockTransport {
        pub calls: Mutex<Vec<(String, Option<Value>)>>,
        responder: Responder,
    }

    impl MockTransport {
        pub fn ok(data: Value) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                responder: Box::new(move || -> Result<Value> { Ok(data.clone()) }),
            })
        }

        pub fn failing<F>(error: F) -> Arc<Self>
        where
            F: Fn() -> SuperOpsError + Send + Sync + 'static,
        {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                responder: Box::new(move || -> Result<Value> { Err(error()) }),
            })
        }

        pub fn panicking(message: &'static str) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                responder: Box::new(move || -> Result<Value> { panic!("{}", message) }),
            })
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn last_operation(&self) -> String {
            self.calls.lock().unwrap().last().unwrap().0.clone()
        }

        pub fn last_variables(&self) -> Value {
            self.calls
                .lock()
                .unwrap()
                .last()
                .unwrap()
                .1
                .clone()
                .unwrap_or(Value::Null)
        }
    }

    #[async_trait]
    impl GraphqlTransport for MockTransport {
        async fn execute(&self, operation: &str, variables: Option<Value>) -> Result<Value> {
            self.calls
                .lock()
                .unwrap()
                .push((operation.to_string(), variables));
            (self.responder)()
        }
    }

    pub fn test_credentials() -> Credentials {
        Credentials::new("test-token", "acme")
    }

    /// Provider that always resolves and hands out `mock`.
    pub fn provider_for(mock: Arc<MockTransport>) -> ClientProvider {
        ClientProvider::with_factory(
            || Ok(test_credentials()),
            move |_| Arc::clone(&mock) as Arc<dyn GraphqlTransport>,
        )
    }

    /// Provider with no credentials.
    pub fn unconfigured_provider() -> ClientProvider {
        ClientProvider::with_factory(
            || Err(ConfigError::NotConfigured),
            |_| MockTransport::ok(Value::Null) as Arc<dyn GraphqlTransport>,
        )
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serve `router` on an ephemeral port and return its GraphQL URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/msp", addr)
    }

    fn client_for(url: &str) -> SuperOpsClient {
        SuperOpsClient::new(&test_credentials().with_endpoint(url))
    }

    #[tokio::test]
    async fn sends_body_and_auth_headers() {
        let url = serve(Router::new().route(
            "/msp",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let header = |name: &str| {
                    headers
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string()
                };
                Json(json!({
                    "data": {
                        "authorization": header("authorization"),
                        "subdomain": header("customersubdomain"),
                        "body": body,
                    }
                }))
            }),
        ))
        .await;

        let data = client_for(&url)
            .execute("query { ping }", Some(json!({"id": "7"})))
            .await
            .unwrap();

        assert_eq!(data["authorization"], "Bearer test-token");
        assert_eq!(data["subdomain"], "acme");
        assert_eq!(data["body"]["query"], "query { ping }");
        assert_eq!(data["body"]["variables"], json!({"id": "7"}));
    }

    #[tokio::test]
    async fn mutation_reuses_query_field() {
        let url = serve(Router::new().route(
            "/msp",
            post(|Json(body): Json<Value>| async move { Json(json!({ "data": body })) }),
        ))
        .await;

        #[derive(Deserialize)]
        struct Echo {
            query: String,
            variables: Option<Value>,
        }

        let echo: Echo = client_for(&url)
            .mutate("mutation { touch }", None)
            .await
            .unwrap();
        assert_eq!(echo.query, "mutation { touch }");
        assert!(echo.variables.is_none());
    }

    #[tokio::test]
    async fn http_failure_carries_status() {
        let url = serve(Router::new().route(
            "/msp",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        ))
        .await;

        let err = client_for(&url).execute("query { x }", None).await.unwrap_err();
        assert!(matches!(err, SuperOpsError::Http { status: 500, .. }));
        assert_eq!(err.to_string(), "HTTP 500: Internal Server Error");
    }

    #[tokio::test]
    async fn graphql_error_surfaces_first_message() {
        let url = serve(Router::new().route(
            "/msp",
            post(|| async {
                Json(json!({
                    "data": null,
                    "errors": [
                        {
                            "message": "Rate limit exceeded",
                            "extensions": {"code": "RATE_LIMITED", "retryAfter": 30}
                        },
                        {"message": "second"}
                    ]
                }))
            }),
        ))
        .await;

        let err = client_for(&url).execute("query { x }", None).await.unwrap_err();
        assert_eq!(err.to_string(), "Rate limit exceeded");
        assert_eq!(err.code(), Some("RATE_LIMITED"));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn empty_errors_array_is_not_an_error() {
        let url = serve(Router::new().route(
            "/msp",
            post(|| async { Json(json!({"data": {"ok": true}, "errors": []})) }),
        ))
        .await;

        let data = client_for(&url).execute("query { ok }", None).await.unwrap();
        assert_eq!(data, json!({"ok": true}));
    }

    #[tokio::test]
    async fn missing_data_is_no_data() {
        let url = serve(Router::new().route("/msp", post(|| async { Json(json!({})) }))).await;

        let err = client_for(&url).execute("query { x }", None).await.unwrap_err();
        assert!(matches!(err, SuperOpsError::NoData));
        assert_eq!(err.to_string(), "No data returned from SuperOps API");
    }

    #[test]
    fn retry_after_accepts_numeric_string() {
        let entry: GraphqlErrorEntry = serde_json::from_value(json!({
            "message": "slow down",
            "extensions": {"retryAfter": "12"}
        }))
        .unwrap();
        let err = SuperOpsError::from(entry);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(12)));
        assert_eq!(err.code(), None);
    }

    #[test]
    fn provider_builds_once_until_reset() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let provider = ClientProvider::with_factory(
            || Ok(test_credentials()),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                MockTransport::ok(json!({})) as Arc<dyn GraphqlTransport>
            },
        );

        let first = provider.get().unwrap();
        let second = provider.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 1);

        provider.reset();
        let third = provider.get().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn connection_keeps_build_time_credentials() {
        let subdomain = Arc::new(Mutex::new("acme".to_string()));
        let current = Arc::clone(&subdomain);
        let provider = ClientProvider::with_factory(
            move || Ok(Credentials::new("test-token", current.lock().unwrap().clone())),
            |_| MockTransport::ok(json!({})) as Arc<dyn GraphqlTransport>,
        );

        let first = provider.connection().unwrap();
        assert_eq!(first.credentials.subdomain, "acme");

        *subdomain.lock().unwrap() = "globex".to_string();
        assert_eq!(provider.credentials().unwrap().subdomain, "globex");
        let cached = provider.connection().unwrap();
        assert_eq!(cached.credentials.subdomain, "acme");
        assert!(Arc::ptr_eq(&first.transport, &cached.transport));

        provider.reset();
        assert_eq!(provider.connection().unwrap().credentials.subdomain, "globex");
    }

    #[test]
    fn provider_without_credentials_fails() {
        let provider = unconfigured_provider();
        assert!(!provider.is_configured());
        let err = provider.get().err().unwrap();
        assert!(matches!(
            err,
            SuperOpsError::Config(ConfigError::NotConfigured)
        ));
    }

    #[test]
    fn client_uses_region_endpoint() {
        let client = SuperOpsClient::new(
            &test_credentials().with_region(crate::config::Region::Eu),
        );
        assert_eq!(client.endpoint(), "https://euapi.superops.ai/msp");

        let client = client.with_endpoint("http://127.0.0.1:9000/graphql");
        assert_eq!(client.endpoint(), "http://127.0.0.1:9000/graphql");
    }
}
