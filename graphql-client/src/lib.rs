//! GraphQL client for Sourcegraph instances with endpoint fallback,
//! per-repository endpoint affinity and a privacy gate for the public
//! instance.

mod affinity;
mod classify;
mod client;
mod config;
mod endpoint;
mod envelope;
mod error;
mod headers;
mod mint;
mod privacy;
mod request;
mod token_store;
mod transport;

pub use affinity::EndpointAffinityCache;
pub use client::GraphqlClient;
pub use client::MAX_HTTP_CALLS;
pub use config::ClientConfig;
pub use config::DEFAULT_CLIENT_NAME;
pub use endpoint::DEFAULT_PUBLIC_ENDPOINT;
pub use endpoint::Endpoint;
pub use envelope::ErrorLocation;
pub use envelope::GraphqlError;
pub use envelope::PathSegment;
pub use envelope::ResponseEnvelope;
pub use error::AuthRequiredError;
pub use error::GraphqlClientError;
pub use error::HeaderError;
pub use error::Result;
pub use error::TransportError;
pub use headers::AccessTokenHeaderProvider;
pub use headers::HeaderProvider;
pub use mint::GraphqlTokenMinter;
pub use mint::TokenMinter;
pub use privacy::PageVisibility;
pub use privacy::PrivacyGate;
pub use privacy::PrivatePageFlag;
pub use request::GraphqlRequest;
pub use request::UNNAMED_QUERY;
pub use token_store::FileTokenStore;
pub use token_store::InMemoryTokenStore;
pub use token_store::KeyringTokenStore;
pub use token_store::TokenStore;
pub use token_store::TokenStoreMode;
pub use token_store::create_token_store;
pub use transport::GraphqlTransport;
pub use transport::HttpRequest;
pub use transport::HttpResponse;
pub use transport::ReqwestTransport;
