#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use serde_json::json;
use sg_graphql_client::AccessTokenHeaderProvider;
use sg_graphql_client::Endpoint;
use sg_graphql_client::EndpointAffinityCache;
use sg_graphql_client::GraphqlClient;
use sg_graphql_client::GraphqlRequest;
use sg_graphql_client::HeaderError;
use sg_graphql_client::HeaderProvider;
use sg_graphql_client::InMemoryTokenStore;
use sg_graphql_client::ReqwestTransport;
use sg_graphql_client::TokenMinter;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::path;

pub const REPO_QUERY: &str = "query Repo($name: String!) { repository(name: $name) { id } }";
pub const GRAPHQL_PATH: &str = "/.api/graphql";

/// A private instance and a stand-in for the public default.
pub struct Servers {
    pub instance: MockServer,
    pub public: MockServer,
}

impl Servers {
    pub async fn start() -> Self {
        Self {
            instance: MockServer::start().await,
            public: MockServer::start().await,
        }
    }

    pub fn instance_endpoint(&self) -> Endpoint {
        endpoint(&self.instance)
    }

    pub fn public_endpoint(&self) -> Endpoint {
        endpoint(&self.public)
    }

    /// Client whose default endpoint is the `public` mock.
    pub fn client(&self, headers: Arc<dyn HeaderProvider>) -> GraphqlClient {
        let transport = ReqwestTransport::new(None).expect("transport");
        GraphqlClient::new(
            self.public_endpoint(),
            Arc::new(transport),
            headers,
            Arc::new(EndpointAffinityCache::new()),
        )
    }

    pub fn repo_request(&self, key: &str) -> GraphqlRequest {
        GraphqlRequest::new(REPO_QUERY)
            .with_variable("name", json!(key))
            .with_repository_key(key)
            .with_endpoint_hint(self.instance_endpoint())
    }
}

pub fn endpoint(server: &MockServer) -> Endpoint {
    Endpoint::parse(&server.uri()).expect("mock server uri")
}

pub fn graphql_body(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

pub fn repository_found() -> ResponseTemplate {
    graphql_body(json!({ "data": { "repository": { "id": "1" } } }))
}

pub fn repository_missing() -> ResponseTemplate {
    graphql_body(json!({ "data": { "repository": null } }))
}

pub async fn respond(server: &MockServer, response: ResponseTemplate, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(response)
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Header provider backed by an empty in-memory store: cookie auth only.
pub fn cookie_headers() -> Arc<dyn HeaderProvider> {
    Arc::new(
        AccessTokenHeaderProvider::new(Arc::new(InMemoryTokenStore::new()), "Sourcegraph")
            .expect("header provider"),
    )
}

pub fn token_headers(store: Arc<InMemoryTokenStore>) -> Arc<dyn HeaderProvider> {
    Arc::new(AccessTokenHeaderProvider::new(store, "Sourcegraph").expect("header provider"))
}

/// Hands out the same token every time and counts how often it was asked.
#[derive(Debug)]
pub struct FixedMinter {
    token: String,
    calls: AtomicUsize,
}

impl FixedMinter {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenMinter for FixedMinter {
    async fn mint(&self, _endpoint: &Endpoint) -> Result<String, HeaderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.token.clone())
    }
}

pub async fn received_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or_default()
}

pub async fn header_values(server: &MockServer, name: &str) -> Vec<Option<String>> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| {
            request
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        })
        .collect()
}

/// Never manages to mint, like a session that is not signed in.
#[derive(Debug, Default)]
pub struct FailingMinter {
    calls: AtomicUsize,
}

impl FailingMinter {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenMinter for FailingMinter {
    async fn mint(&self, _endpoint: &Endpoint) -> Result<String, HeaderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(HeaderError::Mint("not signed in".to_string()))
    }
}
