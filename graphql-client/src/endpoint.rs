use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// The public instance every request may fall back to.
pub const DEFAULT_PUBLIC_ENDPOINT: &str = "https://sourcegraph.com";

const GRAPHQL_PATH: &str = ".api/graphql";

/// Base URL of a Sourcegraph instance.
///
/// The URL is normalised so its path always ends in `/`; two endpoints that
/// differ only by a trailing slash compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(Url);

impl Endpoint {
    pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
        let mut url = Url::parse(raw.trim())?;
        if url.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase);
        }
        url.set_query(None);
        url.set_fragment(None);
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self(url))
    }

    pub fn public_default() -> Self {
        match Self::parse(DEFAULT_PUBLIC_ENDPOINT) {
            Ok(endpoint) => endpoint,
            Err(err) => unreachable!("{DEFAULT_PUBLIC_ENDPOINT} must parse: {err}"),
        }
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// `<endpoint>/.api/graphql[?<operation>]`. The operation name is only
    /// there to make server logs readable.
    pub fn graphql_url(&self, operation_name: Option<&str>) -> Url {
        let mut url = self.0.clone();
        let path = format!("{}{GRAPHQL_PATH}", self.0.path());
        url.set_path(&path);
        url.set_query(operation_name);
        url
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str().trim_end_matches('/'))
    }
}

impl FromStr for Endpoint {
    type Err = url::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Endpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Endpoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
