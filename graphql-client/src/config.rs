use crate::endpoint::Endpoint;
use crate::token_store::TokenStoreMode;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_CLIENT_NAME: &str = "Sourcegraph";

/// Client configuration, usually read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// The public instance requests fall back to.
    #[serde(default = "Endpoint::public_default")]
    pub default_endpoint: Endpoint,

    /// Sent as `X-Requested-With`.
    #[serde(default = "default_client_name")]
    pub client_name: String,

    /// Transport timeout. No timeout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,

    /// Fail instead of falling back to cookie auth when no token is stored.
    #[serde(default)]
    pub require_token: bool,

    #[serde(default)]
    pub token_store: TokenStoreMode,
}

fn default_client_name() -> String {
    DEFAULT_CLIENT_NAME.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_endpoint: Endpoint::public_default(),
            client_name: default_client_name(),
            request_timeout_ms: None,
            require_token: false,
            token_store: TokenStoreMode::default(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.client_name.trim().is_empty() {
            return Err("client_name must not be empty".to_string());
        }
        if HeaderValue::from_str(&self.client_name).is_err() {
            return Err(format!(
                "client_name `{}` is not a valid header value",
                self.client_name
            ));
        }
        if self.request_timeout_ms == Some(0) {
            return Err("request_timeout_ms must be > 0".to_string());
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}
