use crate::config::ConfigOverrides;
use crate::config::find_sg_home;
use crate::config::load_config;
use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use serde_json::Value;
use sg_graphql_client::Endpoint;
use sg_graphql_client::EndpointAffinityCache;
use sg_graphql_client::GraphqlClient;
use sg_graphql_client::GraphqlRequest;
use sg_graphql_client::PrivatePageFlag;
use sg_graphql_client::create_token_store;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Send one GraphQL request and print the response envelope as JSON.
#[derive(Debug, clap::Parser)]
pub struct QueryArgs {
    /// Query document, or `@path` to read it from a file.
    pub query: String,

    /// Query variable as `name=<json>`. Values that are not valid JSON are
    /// sent as strings.
    #[arg(long = "var", value_name = "NAME=JSON", value_parser = parse_variable)]
    pub variables: Vec<(String, Value)>,

    /// Instance to try before the default endpoint.
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<Endpoint>,

    /// Repository key for endpoint affinity.
    #[arg(long = "repo", value_name = "KEY")]
    pub repository_key: Option<String>,

    /// Mark the request as possibly containing private information.
    #[arg(long)]
    pub private: bool,

    /// Treat the current context as a private repository page.
    #[arg(long = "private-page")]
    pub private_page: bool,

    /// Do not fall back to the default endpoint.
    #[arg(long = "no-retry")]
    pub no_retry: bool,

    /// Send cookies only, never an access token.
    #[arg(long = "no-token")]
    pub no_token: bool,
}

impl QueryArgs {
    pub async fn run(self, overrides: &ConfigOverrides) -> Result<()> {
        let sg_home = find_sg_home()?;
        let config = load_config(&sg_home, overrides)?;
        let query = read_query(&self.query)?;

        let store = create_token_store(&sg_home, config.token_store);
        let affinity = Arc::new(EndpointAffinityCache::new());
        let client = GraphqlClient::from_config(&config, store, affinity)
            .context("failed to build GraphQL client")?
            .with_page_visibility(Arc::new(PrivatePageFlag::new(self.private_page)))
            .use_access_token(!self.no_token);

        let mut request = GraphqlRequest::new(query)
            .might_contain_private_info(self.private)
            .with_retry(!self.no_retry);
        for (name, value) in self.variables {
            request = request.with_variable(name, value);
        }
        if let Some(endpoint) = self.endpoint {
            request = request.with_endpoint_hint(endpoint);
        }
        if let Some(key) = self.repository_key {
            request = request.with_repository_key(key);
        }

        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("interrupt received, aborting request");
                on_interrupt.cancel();
            }
        });

        let envelope = client
            .send_with_cancel(&request, &cancel)
            .await
            .with_context(|| format!("{} failed", request.query_name()))?;
        let output = serde_json::to_string_pretty(&envelope)?;
        println!("{output}");
        Ok(())
    }
}

fn read_query(raw: &str) -> Result<String> {
    let query = match raw.strip_prefix('@') {
        Some(path) => {
            let path = PathBuf::from(path);
            std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read query from {}", path.display()))?
        }
        None => raw.to_string(),
    };
    if query.trim().is_empty() {
        bail!("query must not be empty");
    }
    Ok(query)
}

fn parse_variable(raw: &str) -> Result<(String, Value), String> {
    let mut parts = raw.splitn(2, '=');
    let name = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "variables must be in NAME=JSON form".to_string())?;
    let value = parts
        .next()
        .ok_or_else(|| "variables must be in NAME=JSON form".to_string())?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}
