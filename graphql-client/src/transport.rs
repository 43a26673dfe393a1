use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::cookie::Jar;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// A single POST as the client wants it sent.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// Attach ambient session credentials (cookies). The client only sets
    /// this when no `Authorization` header is present.
    pub with_credentials: bool,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// The network seam. Timeouts and connection policy belong to the
/// implementation, not to the retrying client.
#[async_trait]
pub trait GraphqlTransport: Send + Sync {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// `reqwest`-backed transport. Keeps two clients so that cookies are only
/// ever sent on credentialed requests.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    credentialed: reqwest::Client,
    anonymous: reqwest::Client,
    cookies: Arc<Jar>,
}

impl ReqwestTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        Self::with_cookie_jar(Arc::new(Jar::default()), timeout)
    }

    pub fn with_cookie_jar(cookies: Arc<Jar>, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut credentialed = reqwest::Client::builder().cookie_provider(Arc::clone(&cookies));
        let mut anonymous = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            credentialed = credentialed.timeout(timeout);
            anonymous = anonymous.timeout(timeout);
        }
        Ok(Self {
            credentialed: credentialed.build()?,
            anonymous: anonymous.build()?,
            cookies,
        })
    }

    pub fn cookie_jar(&self) -> &Arc<Jar> {
        &self.cookies
    }
}

#[async_trait]
impl GraphqlTransport for ReqwestTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let client = if request.with_credentials {
            &self.credentialed
        } else {
            &self.anonymous
        };
        let response = client
            .post(request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

pub(crate) fn truncate_body(bytes: &[u8]) -> String {
    const MAX_LEN: usize = 4096;
    let body = String::from_utf8_lossy(bytes);
    if body.len() <= MAX_LEN {
        return body.into_owned();
    }
    let mut end = MAX_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}
