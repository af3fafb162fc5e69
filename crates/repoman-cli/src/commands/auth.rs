use clap::Subcommand;
use repoman_auth::{CredentialStore, KeyringStore, TokenResolver, TOKEN_KEY};
use repoman_host::github::GitHubProvider;
use repoman_host::HostProvider;

use super::Context;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Store a GitHub token in the OS keychain
    Login {
        /// API token (will prompt if not provided)
        #[arg(long)]
        token: Option<String>,
    },
    /// Remove the stored token from the OS keychain
    Logout,
    /// Show where the token comes from and check it against the API
    Status,
}

pub async fn run(ctx: &Context, action: AuthAction) -> anyhow::Result<()> {
    let store = KeyringStore::new();
    match action {
        AuthAction::Login { token } => {
            let token = match token {
                Some(t) => t,
                None => {
                    eprint!("Enter GitHub token: ");
                    let mut input = String::new();
                    std::io::stdin().read_line(&mut input)?;
                    input
                }
            };
            let token = token.trim();
            if token.is_empty() {
                anyhow::bail!("Token cannot be empty");
            }

            let provider = GitHubProvider::new(ctx.api_url(), token, ctx.config.page_size)?;
            if !provider.validate_credentials().await? {
                anyhow::bail!("GitHub rejected the token");
            }

            store.store(TOKEN_KEY, token)?;
            println!("Token stored in OS keychain as '{TOKEN_KEY}'");
            Ok(())
        }
        AuthAction::Logout => {
            store.delete(TOKEN_KEY)?;
            println!("Token removed from OS keychain");
            Ok(())
        }
        AuthAction::Status => {
            let resolved = TokenResolver::new(&store).resolve()?;
            println!("Token source: {}", resolved.source);

            let provider =
                GitHubProvider::new(ctx.api_url(), &resolved.token, ctx.config.page_size)?;
            if !provider.validate_credentials().await? {
                anyhow::bail!("Token from {} is INVALID", resolved.source);
            }
            println!("Token is valid");

            let rl = provider.rate_limit_status().await?;
            println!(
                "Rate limit: {}/{} remaining (resets {})",
                rl.remaining, rl.limit, rl.reset_at
            );
            Ok(())
        }
    }
}
