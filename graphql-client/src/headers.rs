use crate::endpoint::Endpoint;
use crate::error::HeaderError;
use crate::mint::TokenMinter;
use crate::token_store::TokenStore;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use std::sync::Arc;
use tracing::debug;

pub(crate) const X_REQUESTED_WITH: HeaderName = HeaderName::from_static("x-requested-with");

/// `X-Requested-With` value identifying the client.
pub(crate) fn requested_with(client_name: &str) -> Result<HeaderValue, HeaderError> {
    HeaderValue::from_str(client_name)
        .map_err(|_| HeaderError::InvalidClientName(client_name.to_string()))
}

/// Supplies per-endpoint request headers.
#[async_trait]
pub trait HeaderProvider: Send + Sync {
    /// With `use_access_token = false` the result must not carry an
    /// `Authorization` header; the request then relies on session cookies.
    async fn headers(
        &self,
        endpoint: &Endpoint,
        use_access_token: bool,
    ) -> Result<HeaderMap, HeaderError>;

    /// Forget the token for `endpoint` after the server rejected it.
    async fn invalidate_token(&self, endpoint: &Endpoint) -> Result<(), HeaderError>;
}

/// Reads tokens from a [`TokenStore`], minting one when none is stored and a
/// minter is configured.
pub struct AccessTokenHeaderProvider {
    store: Arc<dyn TokenStore>,
    requested_with: HeaderValue,
    require_token: bool,
    minter: Option<Arc<dyn TokenMinter>>,
}

impl AccessTokenHeaderProvider {
    pub fn new(store: Arc<dyn TokenStore>, client_name: &str) -> Result<Self, HeaderError> {
        Ok(Self {
            store,
            requested_with: requested_with(client_name)?,
            require_token: false,
            minter: None,
        })
    }

    /// Fail with `NoTokenAvailable` instead of falling back to cookies.
    pub fn require_token(mut self, require: bool) -> Self {
        self.require_token = require;
        self
    }

    pub fn with_minter(mut self, minter: Arc<dyn TokenMinter>) -> Self {
        self.minter = Some(minter);
        self
    }

    async fn token_for(&self, endpoint: &Endpoint) -> Result<Option<String>, HeaderError> {
        if let Some(token) = self.store.load(endpoint)? {
            return Ok(Some(token));
        }
        if let Some(minter) = &self.minter {
            match minter.mint(endpoint).await {
                Ok(token) => {
                    debug!("minted access token for {endpoint}");
                    self.store.save(endpoint, &token)?;
                    return Ok(Some(token));
                }
                Err(err) if self.require_token => return Err(err),
                Err(err) => debug!("could not mint token for {endpoint}, using cookies: {err}"),
            }
        }
        if self.require_token {
            return Err(HeaderError::NoTokenAvailable {
                endpoint: endpoint.clone(),
            });
        }
        Ok(None)
    }
}

#[async_trait]
impl HeaderProvider for AccessTokenHeaderProvider {
    async fn headers(
        &self,
        endpoint: &Endpoint,
        use_access_token: bool,
    ) -> Result<HeaderMap, HeaderError> {
        let mut headers = HeaderMap::new();
        headers.insert(X_REQUESTED_WITH, self.requested_with.clone());
        if !use_access_token {
            return Ok(headers);
        }
        if let Some(token) = self.token_for(endpoint).await? {
            let value = HeaderValue::from_str(&format!("token {token}"))
                .map_err(|_| HeaderError::Store(format!("stored token for {endpoint} is not a valid header")))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    async fn invalidate_token(&self, endpoint: &Endpoint) -> Result<(), HeaderError> {
        let removed = self.store.delete(endpoint)?;
        debug!("invalidated access token for {endpoint} (removed={removed})");
        Ok(())
    }
}
