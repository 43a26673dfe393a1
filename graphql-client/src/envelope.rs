use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Top-level GraphQL response. `data` and `errors` may both be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<ErrorLocation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLocation {
    pub line: u32,
    pub column: u32,
}

impl ResponseEnvelope {
    /// `data.repository`, distinguishing an explicit `null` (`Some(Null)`)
    /// from an absent field (`None`).
    pub fn repository(&self) -> Option<&Value> {
        self.data.as_ref()?.as_object()?.get("repository")
    }

    /// True when the server says the repository is still being cloned. An
    /// absent `mirrorInfo.cloneInProgress` counts as not cloning.
    pub fn clone_in_progress(&self) -> bool {
        self.repository()
            .and_then(|repo| repo.get("mirrorInfo"))
            .and_then(|mirror| mirror.get("cloneInProgress"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|errors| !errors.is_empty())
    }
}
