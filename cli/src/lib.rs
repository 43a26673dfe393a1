pub mod auth_cmd;
pub mod config;
pub mod query_cmd;

use auth_cmd::LoginArgs;
use auth_cmd::LogoutArgs;
use config::ConfigOverrides;
use query_cmd::QueryArgs;

/// Query Sourcegraph's GraphQL API with endpoint fallback.
#[derive(Debug, clap::Parser)]
#[clap(name = "sg-graphql", version)]
pub struct Cli {
    #[clap(flatten)]
    pub config_overrides: ConfigOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    Query(QueryArgs),
    Login(LoginArgs),
    Logout(LogoutArgs),
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let overrides = self.config_overrides;
        match self.command {
            Command::Query(args) => args.run(&overrides).await,
            Command::Login(args) => args.run(&overrides).await,
            Command::Logout(args) => args.run(&overrides).await,
        }
    }
}
