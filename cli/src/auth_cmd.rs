use crate::config::ConfigOverrides;
use crate::config::find_sg_home;
use crate::config::load_config;
use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use sg_graphql_client::Endpoint;
use sg_graphql_client::create_token_store;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;

/// Store an access token for an endpoint.
#[derive(Debug, clap::Parser)]
pub struct LoginArgs {
    /// Instance the token belongs to.
    #[arg(long, value_name = "URL")]
    pub endpoint: Endpoint,

    /// Access token. Read from stdin when omitted.
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,
}

/// Remove the stored access token for an endpoint.
#[derive(Debug, clap::Parser)]
pub struct LogoutArgs {
    #[arg(long, value_name = "URL")]
    pub endpoint: Endpoint,
}

impl LoginArgs {
    pub async fn run(self, overrides: &ConfigOverrides) -> Result<()> {
        let sg_home = find_sg_home()?;
        let config = load_config(&sg_home, overrides)?;

        let token = match self.token {
            Some(token) => token,
            None => read_token_from_stdin().await?,
        };
        let token = token.trim();
        if token.is_empty() {
            bail!("token must not be empty");
        }

        let store = create_token_store(&sg_home, config.token_store);
        store
            .save(&self.endpoint, token)
            .with_context(|| format!("failed to store token for {}", self.endpoint))?;
        println!("Stored access token for {}", self.endpoint);
        Ok(())
    }
}

impl LogoutArgs {
    pub async fn run(self, overrides: &ConfigOverrides) -> Result<()> {
        let sg_home = find_sg_home()?;
        let config = load_config(&sg_home, overrides)?;

        let store = create_token_store(&sg_home, config.token_store);
        let removed = store
            .delete(&self.endpoint)
            .with_context(|| format!("failed to remove token for {}", self.endpoint))?;
        if removed {
            println!("Removed access token for {}", self.endpoint);
        } else {
            println!("No access token stored for {}", self.endpoint);
        }
        Ok(())
    }
}

async fn read_token_from_stdin() -> Result<String> {
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read token from stdin")?;
    Ok(line)
}
