use crate::endpoint::Endpoint;
use regex_lite::Regex;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use std::sync::OnceLock;

pub const UNNAMED_QUERY: &str = "unnamed";

/// One logical GraphQL request. Immutable once handed to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphqlRequest {
    pub query: String,
    pub variables: Map<String, Value>,
    /// Endpoint preferred by the caller; the affinity cache still wins.
    pub endpoint_hint: Option<Endpoint>,
    pub might_contain_private_info: bool,
    /// Opaque cache key. `Some` marks the request as repository-specific,
    /// which is what makes it participate in endpoint affinity.
    pub repository_key: Option<String>,
    /// `false` disables the fallback hop to the public default.
    pub retry: bool,
}

impl GraphqlRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: Map::new(),
            endpoint_hint: None,
            might_contain_private_info: false,
            repository_key: None,
            retry: true,
        }
    }

    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn with_endpoint_hint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint_hint = Some(endpoint);
        self
    }

    pub fn with_repository_key(mut self, key: impl Into<String>) -> Self {
        self.repository_key = Some(key.into());
        self
    }

    pub fn might_contain_private_info(mut self, value: bool) -> Self {
        self.might_contain_private_info = value;
        self
    }

    pub fn with_retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    /// Name of the first `query`/`mutation` operation in the document, if it
    /// has one.
    pub fn operation_name(&self) -> Option<&str> {
        operation_name(&self.query)
    }

    /// The operation name, or `"unnamed"` for anonymous documents.
    pub fn query_name(&self) -> &str {
        self.operation_name().unwrap_or(UNNAMED_QUERY)
    }

    pub(crate) fn body(&self) -> RequestBody<'_> {
        RequestBody {
            query: &self.query,
            variables: &self.variables,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RequestBody<'a> {
    query: &'a str,
    variables: &'a Map<String, Value>,
}

fn operation_name(query: &str) -> Option<&str> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"^\s*(?:query|mutation)\s+(\w+)").ok())
        .as_ref()?;
    pattern
        .captures(query)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}
