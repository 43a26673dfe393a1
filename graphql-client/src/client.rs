use crate::affinity::EndpointAffinityCache;
use crate::classify::Attempt;
use crate::classify::Step;
use crate::classify::classify;
use crate::config::ClientConfig;
use crate::endpoint::Endpoint;
use crate::envelope::ResponseEnvelope;
use crate::error::AuthRequiredError;
use crate::error::GraphqlClientError;
use crate::error::HeaderError;
use crate::error::Result;
use crate::error::TransportError;
use crate::headers::AccessTokenHeaderProvider;
use crate::headers::HeaderProvider;
use crate::mint::GraphqlTokenMinter;
use crate::privacy::PageVisibility;
use crate::privacy::PrivacyGate;
use crate::request::GraphqlRequest;
use crate::token_store::TokenStore;
use crate::transport::GraphqlTransport;
use crate::transport::HttpRequest;
use crate::transport::ReqwestTransport;
use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderValue;
use sg_async_utils::CancelErr;
use sg_async_utils::OrCancelExt;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

/// Upper bound on HTTP calls per `send`: the first endpoint, one fallback hop
/// to the default, and one token-invalidation replay.
pub const MAX_HTTP_CALLS: usize = 3;

/// GraphQL client that falls back from an instance endpoint to the public
/// default and remembers which endpoint resolved each repository.
///
/// Each `send` runs its attempts strictly in series. Several sends may run
/// concurrently; the affinity cache is the only state they share.
#[derive(Clone)]
pub struct GraphqlClient {
    default_endpoint: Endpoint,
    gate: PrivacyGate,
    transport: Arc<dyn GraphqlTransport>,
    headers: Arc<dyn HeaderProvider>,
    affinity: Arc<EndpointAffinityCache>,
    page: Arc<dyn PageVisibility>,
    use_access_token: bool,
}

impl GraphqlClient {
    pub fn new(
        default_endpoint: Endpoint,
        transport: Arc<dyn GraphqlTransport>,
        headers: Arc<dyn HeaderProvider>,
        affinity: Arc<EndpointAffinityCache>,
    ) -> Self {
        Self {
            gate: PrivacyGate::new(default_endpoint.clone()),
            default_endpoint,
            transport,
            headers,
            affinity,
            page: Arc::new(|| false),
            use_access_token: true,
        }
    }

    /// Wires up the reqwest transport and a token-store-backed header
    /// provider. A token minter is attached when tokens are required.
    pub fn from_config(
        config: &ClientConfig,
        token_store: Arc<dyn TokenStore>,
        affinity: Arc<EndpointAffinityCache>,
    ) -> Result<Self> {
        let transport: Arc<dyn GraphqlTransport> =
            Arc::new(ReqwestTransport::new(config.request_timeout())?);
        let mut headers = AccessTokenHeaderProvider::new(token_store, &config.client_name)?
            .require_token(config.require_token);
        if config.require_token {
            let minter = GraphqlTokenMinter::new(Arc::clone(&transport), &config.client_name)?;
            headers = headers.with_minter(Arc::new(minter));
        }
        Ok(Self::new(
            config.default_endpoint.clone(),
            transport,
            Arc::new(headers),
            affinity,
        ))
    }

    /// Source of the "current page shows a private repository" signal.
    /// Defaults to never private.
    pub fn with_page_visibility(mut self, page: Arc<dyn PageVisibility>) -> Self {
        self.page = page;
        self
    }

    /// `false` asks the header provider for cookie-only headers.
    pub fn use_access_token(mut self, use_access_token: bool) -> Self {
        self.use_access_token = use_access_token;
        self
    }

    pub fn default_endpoint(&self) -> &Endpoint {
        &self.default_endpoint
    }

    pub fn affinity(&self) -> &Arc<EndpointAffinityCache> {
        &self.affinity
    }

    pub async fn send(&self, request: &GraphqlRequest) -> Result<ResponseEnvelope> {
        self.run(request).await
    }

    /// Like [`Self::send`], but fails with [`GraphqlClientError::Aborted`]
    /// as soon as `cancel` fires. The in-flight HTTP call is dropped and no
    /// further attempts are made.
    pub async fn send_with_cancel(
        &self,
        request: &GraphqlRequest,
        cancel: &CancellationToken,
    ) -> Result<ResponseEnvelope> {
        match self.run(request).or_cancel(cancel).await {
            Ok(result) => result,
            Err(CancelErr::Cancelled) => {
                debug!("{} aborted by caller", request.query_name());
                Err(GraphqlClientError::Aborted)
            }
        }
    }

    async fn run(&self, request: &GraphqlRequest) -> Result<ResponseEnvelope> {
        let query_name = request.query_name();
        let page_is_private = self.page.is_private_repository();
        let repository_key = request.repository_key.as_deref();

        let mut endpoint = repository_key
            .and_then(|key| self.affinity.get(key))
            .or_else(|| request.endpoint_hint.clone())
            .unwrap_or_else(|| self.default_endpoint.clone());
        if !self.gate.allow(request, page_is_private, &endpoint) {
            warn!("refusing to send {query_name} to {endpoint} from a private repository page");
            return Err(GraphqlClientError::PrivateRepoPublicEndpoint {
                query_name: query_name.to_string(),
            });
        }
        let default_allowed = self
            .gate
            .allow(request, page_is_private, &self.default_endpoint);

        let body = serde_json::to_vec(&request.body()).map_err(TransportError::from)?;
        let mut last_auth_error = None;
        let mut replayed: HashSet<Endpoint> = HashSet::new();

        for call in 1..=MAX_HTTP_CALLS {
            let at_public_default = endpoint == self.default_endpoint;
            let mut headers = match self.headers.headers(&endpoint, self.use_access_token).await {
                Ok(headers) => headers,
                Err(err) => {
                    return Err(self.credentials_failed(
                        query_name,
                        &endpoint,
                        repository_key,
                        err,
                        last_auth_error,
                    ));
                }
            };
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            let sent_token = headers.contains_key(AUTHORIZATION);

            let result = self
                .transport
                .post(HttpRequest {
                    url: endpoint.graphql_url(request.operation_name()),
                    headers,
                    body: body.clone(),
                    with_credentials: !sent_token,
                })
                .await;

            let has_budget = call < MAX_HTTP_CALLS;
            let attempt = Attempt {
                endpoint: &endpoint,
                at_public_default,
                can_fall_back: has_budget
                    && request.retry
                    && !at_public_default
                    && default_allowed,
                sent_token,
                can_replay_token: has_budget && !replayed.contains(&endpoint),
                repository_specific: repository_key.is_some(),
            };
            let step = classify(attempt, result, &mut last_auth_error);
            debug!(
                "{query_name} attempt {call}/{MAX_HTTP_CALLS} against {endpoint}: {}",
                step.label()
            );

            match step {
                Step::Success {
                    envelope,
                    remember_affinity,
                } => {
                    if let (true, Some(key)) = (remember_affinity, repository_key) {
                        self.affinity.set(key, endpoint);
                    }
                    return Ok(envelope);
                }
                Step::RetryDifferentEndpoint { evict_affinity } => {
                    if evict_affinity {
                        self.evict(repository_key);
                    }
                    debug!(
                        "{query_name}: falling back from {endpoint} to {}",
                        self.default_endpoint
                    );
                    endpoint = self.default_endpoint.clone();
                }
                Step::RetryAfterTokenInvalidation => {
                    if let Err(err) = self.headers.invalidate_token(&endpoint).await {
                        return Err(self.credentials_failed(
                            query_name,
                            &endpoint,
                            repository_key,
                            err,
                            last_auth_error,
                        ));
                    }
                    replayed.insert(endpoint.clone());
                }
                Step::Terminal {
                    outcome,
                    evict_affinity,
                } => {
                    if evict_affinity {
                        self.evict(repository_key);
                    }
                    if let Err(GraphqlClientError::AuthRequired(err)) = &outcome {
                        warn!("{query_name}: {err}");
                    }
                    return outcome;
                }
            }
        }

        // The last call has neither a fallback nor a replay available, so
        // `classify` always ends the loop on it.
        unreachable!("{query_name} exceeded {MAX_HTTP_CALLS} HTTP calls")
    }

    /// Header acquisition or token invalidation failed mid-send. Ends the
    /// send like any terminal failure; a 401 seen earlier in the send is
    /// reported instead of the credentials error.
    fn credentials_failed(
        &self,
        query_name: &str,
        endpoint: &Endpoint,
        repository_key: Option<&str>,
        err: HeaderError,
        last_auth_error: Option<AuthRequiredError>,
    ) -> GraphqlClientError {
        self.evict(repository_key);
        match last_auth_error {
            Some(auth) => {
                warn!("{query_name}: {auth} (credentials for {endpoint} unavailable: {err})");
                GraphqlClientError::AuthRequired(auth)
            }
            None => {
                debug!("{query_name}: credentials for {endpoint} unavailable: {err}");
                err.into()
            }
        }
    }

    fn evict(&self, repository_key: Option<&str>) {
        let Some(key) = repository_key else {
            return;
        };
        if let Some(previous) = self.affinity.evict(key) {
            debug!("evicted affinity {key} -> {previous}");
        }
    }
}
