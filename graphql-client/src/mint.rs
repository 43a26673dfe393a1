use crate::endpoint::Endpoint;
use crate::envelope::ResponseEnvelope;
use crate::error::HeaderError;
use crate::headers::X_REQUESTED_WITH;
use crate::headers::requested_with;
use crate::transport::GraphqlTransport;
use crate::transport::HttpRequest;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use std::sync::Arc;

const CURRENT_USER_QUERY: &str = "query CurrentUser { currentUser { id } }";
const CREATE_ACCESS_TOKEN_MUTATION: &str = "mutation CreateAccessToken($userID: ID!, $scopes: [String!]!, $note: String!) { createAccessToken(user: $userID, scopes: $scopes, note: $note) { id token } }";

/// Creates a fresh access token for an endpoint.
#[async_trait]
pub trait TokenMinter: Send + Sync {
    async fn mint(&self, endpoint: &Endpoint) -> Result<String, HeaderError>;
}

/// Mints tokens through the GraphQL API using the session cookie: look up
/// the current user, then create a token for them. Both requests go out
/// without an `Authorization` header.
pub struct GraphqlTokenMinter {
    transport: Arc<dyn GraphqlTransport>,
    requested_with: HeaderValue,
    note: String,
    scopes: Vec<String>,
}

impl GraphqlTokenMinter {
    pub fn new(
        transport: Arc<dyn GraphqlTransport>,
        client_name: &str,
    ) -> Result<Self, HeaderError> {
        Ok(Self {
            transport,
            requested_with: requested_with(client_name)?,
            note: format!("{client_name} GraphQL client"),
            scopes: vec!["user:all".to_string()],
        })
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    async fn execute(
        &self,
        endpoint: &Endpoint,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<Value, HeaderError> {
        let mut headers = HeaderMap::new();
        headers.insert(X_REQUESTED_WITH, self.requested_with.clone());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let body = serde_json::to_vec(&json!({ "query": query, "variables": variables }))
            .map_err(|err| HeaderError::Mint(err.to_string()))?;

        let response = self
            .transport
            .post(HttpRequest {
                url: endpoint.graphql_url(Some(operation)),
                headers,
                body,
                with_credentials: true,
            })
            .await
            .map_err(|err| HeaderError::Mint(err.to_string()))?;
        if !response.status.is_success() {
            return Err(HeaderError::Mint(format!(
                "{operation} against {endpoint} returned {}",
                response.status
            )));
        }

        let envelope: ResponseEnvelope = serde_json::from_slice(&response.body)
            .map_err(|err| HeaderError::Mint(err.to_string()))?;
        if let Some(error) = envelope.errors.as_ref().and_then(|errors| errors.first()) {
            return Err(HeaderError::Mint(format!("{operation}: {}", error.message)));
        }
        envelope
            .data
            .ok_or_else(|| HeaderError::Mint(format!("{operation} returned no data")))
    }
}

#[async_trait]
impl TokenMinter for GraphqlTokenMinter {
    async fn mint(&self, endpoint: &Endpoint) -> Result<String, HeaderError> {
        let data = self
            .execute(endpoint, "CurrentUser", CURRENT_USER_QUERY, Value::Object(Map::new()))
            .await?;
        let user_id = data
            .pointer("/currentUser/id")
            .and_then(Value::as_str)
            .ok_or_else(|| HeaderError::Mint(format!("not signed in to {endpoint}")))?
            .to_string();

        let data = self
            .execute(
                endpoint,
                "CreateAccessToken",
                CREATE_ACCESS_TOKEN_MUTATION,
                json!({ "userID": user_id, "scopes": self.scopes, "note": self.note }),
            )
            .await?;
        data.pointer("/createAccessToken/token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| HeaderError::Mint("createAccessToken returned no token".to_string()))
    }
}
