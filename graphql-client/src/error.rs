use crate::endpoint::Endpoint;
use reqwest::StatusCode;
use thiserror::Error;

/// Authentication was rejected by `endpoint`. Carries the endpoint so the
/// caller knows where to send the user to sign in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("authentication required for {endpoint}")]
pub struct AuthRequiredError {
    pub endpoint: Endpoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request failed: {message}")]
    Http {
        message: String,
        is_timeout: bool,
        is_connect: bool,
    },

    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("invalid GraphQL response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http {
            message: err.to_string(),
            is_timeout: err.is_timeout(),
            is_connect: err.is_connect(),
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("no access token available for {endpoint}")]
    NoTokenAvailable { endpoint: Endpoint },

    #[error("token store error: {0}")]
    Store(String),

    #[error("failed to mint access token: {0}")]
    Mint(String),

    #[error("client name `{0}` is not a valid header value")]
    InvalidClientName(String),
}

/// Every way [`crate::GraphqlClient::send`] can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphqlClientError {
    /// The request would have sent possibly-private data from a private
    /// repository page to the public instance. Never retried.
    #[error(
        "refusing to send {query_name} to the public instance while viewing a private repository"
    )]
    PrivateRepoPublicEndpoint { query_name: String },

    #[error(transparent)]
    AuthRequired(#[from] AuthRequiredError),

    #[error("no access token available for {endpoint}")]
    NoTokenAvailable { endpoint: Endpoint },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("credentials error: {0}")]
    Credentials(String),

    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),

    #[error("request aborted")]
    Aborted,
}

impl GraphqlClientError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

impl From<HeaderError> for GraphqlClientError {
    fn from(err: HeaderError) -> Self {
        match err {
            HeaderError::NoTokenAvailable { endpoint } => Self::NoTokenAvailable { endpoint },
            HeaderError::Store(message) | HeaderError::Mint(message) => Self::Credentials(message),
            err @ HeaderError::InvalidClientName(_) => Self::InvalidConfig(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphqlClientError>;
