pub mod auth;
pub mod config;
pub mod exec;
pub mod list;
pub mod prs;
pub mod reconcile;
pub mod version;

use std::path::PathBuf;

use clap::{ArgAction, Args, Subcommand};
use repoman_auth::{KeyringStore, TokenResolver};
use repoman_core::config::RepomanConfig;
use repoman_core::models::org::OrganizationContext;
use repoman_host::github::GitHubProvider;
use url::Url;

use repoman_sync::engine::ActionMask;

/// Options accepted before the subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Organization or user to mirror [default: name of the local directory]
    #[arg(long)]
    pub org: Option<String>,

    /// Directory holding the clones [default: current directory]
    #[arg(long, value_name = "DIR")]
    pub local: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Decrease verbosity (-q errors only, -qq silent)
    #[arg(short, long, action = ArgAction::Count)]
    pub quiet: u8,

    /// GitHub API base URL [default: from config, https://api.github.com]
    #[arg(long, env = "REPOMAN_API_URL", value_name = "URL")]
    pub api_url: Option<Url>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Clone every remote repository missing locally
    Clone(reconcile::ReconcileArgs),
    /// Fast-forward every local clone that also exists remotely
    Update(reconcile::ReconcileArgs),
    /// Clone missing repositories, update existing ones, report local-only ones
    Sync(reconcile::ReconcileArgs),
    /// List local or remote repositories
    List(list::ListArgs),
    /// List open pull requests across the organization
    ListPrs(prs::ListPrsArgs),
    /// Run a command in every local repository
    Exec(exec::ExecArgs),
    /// Manage the stored GitHub token
    Auth {
        #[command(subcommand)]
        action: auth::AuthAction,
    },
    /// Initialize and show repoman configuration
    Config {
        #[command(subcommand)]
        action: config::ConfigAction,
    },
    /// Print the repoman version
    Version,
}

/// Loaded config plus global options. The token and the organization are only
/// resolved by the commands that need them.
pub struct Context {
    pub global: GlobalArgs,
    pub config: RepomanConfig,
}

impl Context {
    pub fn new(global: GlobalArgs) -> anyhow::Result<Self> {
        let config = RepomanConfig::load()?;
        Ok(Self { global, config })
    }

    pub fn api_url(&self) -> Url {
        self.global
            .api_url
            .clone()
            .unwrap_or_else(|| self.config.api_url.clone())
    }

    pub fn org_context(&self) -> anyhow::Result<OrganizationContext> {
        Ok(OrganizationContext::from_current_dir(
            self.global.org.clone(),
            self.global.local.clone(),
        )?)
    }

    /// The local root alone, for commands that never talk to the API.
    pub fn local_root(&self) -> anyhow::Result<PathBuf> {
        match &self.global.local {
            Some(path) => Ok(path.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// A GitHub client authenticated with the first token found.
    pub fn provider(&self) -> anyhow::Result<GitHubProvider> {
        let store = KeyringStore::new();
        let resolved = TokenResolver::new(&store).resolve()?;
        tracing::debug!("using token from {}", resolved.source);
        Ok(GitHubProvider::new(
            self.api_url(),
            &resolved.token,
            self.config.page_size,
        )?)
    }
}

pub async fn run(global: GlobalArgs, cmd: Command) -> anyhow::Result<()> {
    // Needs neither a config file nor a token.
    if let Command::Version = cmd {
        version::run();
        return Ok(());
    }

    let ctx = Context::new(global)?;
    match cmd {
        Command::Clone(args) => reconcile::run(&ctx, args, ActionMask::CLONE).await,
        Command::Update(args) => reconcile::run(&ctx, args, ActionMask::UPDATE).await,
        Command::Sync(args) => reconcile::run(&ctx, args, ActionMask::SYNC).await,
        Command::List(args) => list::run(&ctx, args).await,
        Command::ListPrs(args) => prs::run(&ctx, args).await,
        Command::Exec(args) => exec::run(&ctx, args),
        Command::Auth { action } => auth::run(&ctx, action).await,
        Command::Config { action } => config::run(&ctx, action),
        Command::Version => Ok(()),
    }
}
