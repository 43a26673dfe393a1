use anyhow::Context;
use anyhow::Result;
use anyhow::anyhow;
use dirs::home_dir;
use sg_graphql_client::ClientConfig;
use sg_graphql_client::Endpoint;
use sg_graphql_client::TokenStoreMode;
use std::path::Path;
use std::path::PathBuf;

pub const CONFIG_FILE: &str = "config.toml";

/// Command-line overrides, applied last.
#[derive(Debug, Default, Clone, clap::Args)]
pub struct ConfigOverrides {
    /// Public endpoint requests fall back to.
    #[arg(long = "default-endpoint", value_name = "URL", global = true)]
    pub default_endpoint: Option<Endpoint>,

    /// Where access tokens are stored.
    #[arg(long = "token-store", value_name = "file|keyring", value_parser = parse_token_store, global = true)]
    pub token_store: Option<TokenStoreMode>,

    /// Transport timeout in milliseconds.
    #[arg(long = "timeout-ms", value_name = "MS", global = true)]
    pub request_timeout_ms: Option<u64>,

    /// Fail instead of falling back to cookie auth when no token is stored.
    #[arg(long = "require-token", global = true)]
    pub require_token: bool,
}

/// `$SG_HOME`, or `~/.sourcegraph`.
pub fn find_sg_home() -> Result<PathBuf> {
    if let Ok(env_home) = std::env::var("SG_HOME")
        && !env_home.is_empty()
    {
        return Ok(PathBuf::from(env_home));
    }

    let mut home = home_dir().ok_or_else(|| anyhow!("Could not locate home directory"))?;
    home.push(".sourcegraph");
    Ok(home)
}

/// Reads `config.toml` from `sg_home`, then applies environment and flag
/// overrides in that order.
pub fn load_config(sg_home: &Path, overrides: &ConfigOverrides) -> Result<ClientConfig> {
    let mut config = read_config_file(&sg_home.join(CONFIG_FILE))?;
    apply_env(&mut config, |key| std::env::var(key).ok())?;

    if let Some(endpoint) = &overrides.default_endpoint {
        config.default_endpoint = endpoint.clone();
    }
    if let Some(mode) = overrides.token_store {
        config.token_store = mode;
    }
    if let Some(timeout) = overrides.request_timeout_ms {
        config.request_timeout_ms = Some(timeout);
    }
    if overrides.require_token {
        config.require_token = true;
    }

    config.validate().map_err(|err| anyhow!(err))?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<ClientConfig> {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

fn apply_env(
    config: &mut ClientConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(raw) = lookup("SG_DEFAULT_ENDPOINT").filter(|v| !v.is_empty()) {
        config.default_endpoint = Endpoint::parse(&raw)
            .with_context(|| format!("SG_DEFAULT_ENDPOINT is not a valid URL: {raw}"))?;
    }
    if let Some(raw) = lookup("SG_TOKEN_STORE").filter(|v| !v.is_empty()) {
        config.token_store = parse_token_store(&raw).map_err(|err| anyhow!("SG_TOKEN_STORE: {err}"))?;
    }
    Ok(())
}

fn parse_token_store(raw: &str) -> Result<TokenStoreMode, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "file" => Ok(TokenStoreMode::File),
        "keyring" => Ok(TokenStoreMode::Keyring),
        other => Err(format!("unknown token store `{other}`, expected file or keyring")),
    }
}
