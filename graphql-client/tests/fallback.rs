mod common;

use assert_matches::assert_matches;
use common::Servers;
use common::cookie_headers;
use common::endpoint;
use common::graphql_body;
use common::received_count;
use common::repository_found;
use common::repository_missing;
use common::respond;
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::json;
use sg_graphql_client::AccessTokenHeaderProvider;
use sg_graphql_client::GraphqlClientError;
use sg_graphql_client::GraphqlRequest;
use sg_graphql_client::InMemoryTokenStore;
use sg_graphql_client::TransportError;
use std::sync::Arc;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

#[tokio::test]
async fn hinted_endpoint_success_is_remembered() {
    let servers = Servers::start().await;
    respond(&servers.instance, repository_found(), 1).await;
    respond(&servers.public, repository_found(), 0).await;
    let client = servers.client(cookie_headers());

    let envelope = client
        .send(&servers.repo_request("r"))
        .await
        .expect("send");

    assert_eq!(envelope.data, Some(json!({ "repository": { "id": "1" } })));
    assert_eq!(client.affinity().get("r"), Some(servers.instance_endpoint()));
}

#[tokio::test]
async fn missing_repository_falls_back_and_is_not_cached() {
    let servers = Servers::start().await;
    respond(&servers.instance, repository_missing(), 1).await;
    respond(
        &servers.public,
        graphql_body(json!({ "data": { "repository": { "id": "public-1" } } })),
        1,
    )
    .await;
    let client = servers.client(cookie_headers());

    let envelope = client
        .send(&servers.repo_request("r"))
        .await
        .expect("send");

    assert_eq!(
        envelope.data,
        Some(json!({ "repository": { "id": "public-1" } }))
    );
    assert_eq!(client.affinity().get("r"), None);
}

#[tokio::test]
async fn null_data_everywhere_evicts_and_returns_envelope() {
    let servers = Servers::start().await;
    respond(&servers.instance, repository_missing(), 1).await;
    respond(
        &servers.public,
        graphql_body(json!({
            "data": null,
            "errors": [{ "message": "repository not found", "path": ["repository"] }]
        })),
        1,
    )
    .await;
    let client = servers.client(cookie_headers());
    client.affinity().set("r", servers.instance_endpoint());

    let request = GraphqlRequest::new(common::REPO_QUERY).with_repository_key("r");
    let envelope = client.send(&request).await.expect("null data is not an error");

    assert_eq!(envelope.data, None);
    assert!(envelope.has_errors());
    assert_eq!(client.affinity().get("r"), None);
}

#[tokio::test]
async fn affinity_wins_over_hint() {
    let servers = Servers::start().await;
    let hinted = MockServer::start().await;
    respond(&servers.instance, repository_found(), 1).await;
    respond(&hinted, repository_found(), 0).await;
    respond(&servers.public, repository_found(), 0).await;
    let client = servers.client(cookie_headers());
    client.affinity().set("r", servers.instance_endpoint());

    let request = GraphqlRequest::new(common::REPO_QUERY)
        .with_repository_key("r")
        .with_endpoint_hint(endpoint(&hinted));
    client.send(&request).await.expect("send");

    assert_eq!(client.affinity().get("r"), Some(servers.instance_endpoint()));
}

#[tokio::test]
async fn clone_in_progress_is_a_success() {
    let servers = Servers::start().await;
    respond(
        &servers.instance,
        graphql_body(json!({
            "data": { "repository": { "commit": null, "mirrorInfo": { "cloneInProgress": true } } }
        })),
        1,
    )
    .await;
    respond(&servers.public, repository_found(), 0).await;
    let client = servers.client(cookie_headers());

    let envelope = client
        .send(&servers.repo_request("r"))
        .await
        .expect("send");

    assert!(envelope.clone_in_progress());
    assert_eq!(client.affinity().get("r"), Some(servers.instance_endpoint()));
}

#[tokio::test]
async fn missing_commit_falls_back() {
    let servers = Servers::start().await;
    respond(
        &servers.instance,
        graphql_body(json!({ "data": { "repository": { "commit": null } } })),
        1,
    )
    .await;
    respond(
        &servers.public,
        graphql_body(json!({ "data": { "repository": { "commit": { "oid": "abc" } } } })),
        1,
    )
    .await;
    let client = servers.client(cookie_headers());

    let envelope = client
        .send(&servers.repo_request("r"))
        .await
        .expect("send");

    assert_eq!(
        envelope.data,
        Some(json!({ "repository": { "commit": { "oid": "abc" } } }))
    );
}

#[tokio::test]
async fn server_error_falls_back_to_public() {
    let servers = Servers::start().await;
    respond(&servers.instance, ResponseTemplate::new(502), 1).await;
    respond(&servers.public, repository_found(), 1).await;
    let client = servers.client(cookie_headers());

    client
        .send(&servers.repo_request("r"))
        .await
        .expect("send");

    assert_eq!(client.affinity().get("r"), None);
}

#[tokio::test]
async fn public_default_is_never_retried_against_itself() {
    let servers = Servers::start().await;
    respond(&servers.public, ResponseTemplate::new(500), 1).await;
    let client = servers.client(cookie_headers());

    let request = GraphqlRequest::new(common::REPO_QUERY).with_repository_key("r");
    let err = client.send(&request).await.expect_err("public failure is terminal");

    assert_matches!(
        err,
        GraphqlClientError::Transport(TransportError::Status { status, .. })
            if status == StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[tokio::test]
async fn disabled_retry_surfaces_instance_error() {
    let servers = Servers::start().await;
    respond(&servers.instance, ResponseTemplate::new(503), 1).await;
    respond(&servers.public, repository_found(), 0).await;
    let client = servers.client(cookie_headers());
    client.affinity().set("r", servers.instance_endpoint());

    let err = client
        .send(&servers.repo_request("r").with_retry(false))
        .await
        .expect_err("no fallback");

    assert_matches!(
        err,
        GraphqlClientError::Transport(TransportError::Status { status, .. })
            if status == StatusCode::SERVICE_UNAVAILABLE
    );
    assert_eq!(client.affinity().get("r"), None);
}

#[tokio::test]
async fn invalid_json_is_a_transport_failure() {
    let servers = Servers::start().await;
    respond(
        &servers.instance,
        ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"),
        1,
    )
    .await;
    respond(&servers.public, repository_found(), 1).await;
    let client = servers.client(cookie_headers());

    let envelope = client
        .send(&servers.repo_request("r"))
        .await
        .expect("send");
    assert_eq!(envelope.data, Some(json!({ "repository": { "id": "1" } })));
}

#[tokio::test]
async fn unkeyed_requests_never_touch_affinity() {
    let servers = Servers::start().await;
    respond(
        &servers.instance,
        graphql_body(json!({ "data": { "currentUser": { "username": "alice" } } })),
        1,
    )
    .await;
    let client = servers.client(cookie_headers());

    let request = GraphqlRequest::new("query CurrentUser { currentUser { username } }")
        .with_endpoint_hint(servers.instance_endpoint());
    client.send(&request).await.expect("send");

    assert!(client.affinity().is_empty());
}

#[tokio::test]
async fn requests_carry_operation_name_and_json_body() {
    let servers = Servers::start().await;
    respond(&servers.instance, repository_found(), 1).await;
    let client = servers.client(cookie_headers());

    client
        .send(&servers.repo_request("github.com/a/b"))
        .await
        .expect("send");

    let requests = servers
        .instance
        .received_requests()
        .await
        .expect("recording enabled");
    let request = &requests[0];
    assert_eq!(request.url.query(), Some("Repo"));
    assert_eq!(
        request
            .headers
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("application/json")
    );
    assert_eq!(
        request
            .headers
            .get("x-requested-with")
            .and_then(|v| v.to_str().ok()),
        Some("Sourcegraph")
    );
    let body: serde_json::Value = serde_json::from_slice(&request.body).expect("json body");
    assert_eq!(
        body,
        json!({ "query": common::REPO_QUERY, "variables": { "name": "github.com/a/b" } })
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sends_share_affinity() {
    let servers = Servers::start().await;
    respond(&servers.instance, repository_found(), 8).await;
    let client = servers.client(cookie_headers());

    let keys: Vec<String> = (0..8).map(|i| format!("repo-{i}")).collect();
    let mut handles = Vec::new();
    for key in &keys {
        let client = client.clone();
        let request = servers.repo_request(key);
        handles.push(tokio::spawn(async move { client.send(&request).await }));
    }
    for handle in handles {
        handle.await.expect("join").expect("send");
    }

    assert_eq!(client.affinity().len(), keys.len());
    assert_eq!(received_count(&servers.public).await, 0);
}

#[tokio::test]
async fn missing_token_on_fallback_hop_evicts_affinity() {
    let servers = Servers::start().await;
    respond(&servers.instance, ResponseTemplate::new(500), 1).await;
    respond(&servers.public, repository_found(), 0).await;
    let store = Arc::new(
        InMemoryTokenStore::new().with_token(servers.instance_endpoint(), "sgp_instance"),
    );
    let headers = AccessTokenHeaderProvider::new(store, "Sourcegraph")
        .expect("header provider")
        .require_token(true);
    let client = servers.client(Arc::new(headers));
    client.affinity().set("r", servers.instance_endpoint());

    let err = client
        .send(&servers.repo_request("r"))
        .await
        .expect_err("no token for the public default");

    assert_eq!(
        err,
        GraphqlClientError::NoTokenAvailable {
            endpoint: servers.public_endpoint()
        }
    );
    assert_eq!(client.affinity().get("r"), None);
}
