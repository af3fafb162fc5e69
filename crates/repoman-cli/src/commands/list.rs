use clap::Args;
use repoman_discover::scanner::{git_repos, scan_local};
use repoman_host::{HostProvider, RepoFilter};

use super::Context;

#[derive(Args)]
pub struct ListArgs {
    /// List local git working trees
    #[arg(long)]
    local: bool,
    /// List repositories on the remote
    #[arg(long)]
    remote: bool,
    /// Include forks in the remote listing (default)
    #[arg(long, overrides_with = "no_forks")]
    forks: bool,
    /// Leave forks out of the remote listing
    #[arg(long, overrides_with = "forks")]
    no_forks: bool,
    /// Include archived repositories in the remote listing
    #[arg(long)]
    archived: bool,
}

pub async fn run(ctx: &Context, args: ListArgs) -> anyhow::Result<()> {
    if !args.local && !args.remote {
        anyhow::bail!("Please specify either --local or --remote.");
    }

    if args.local {
        let root = ctx.local_root()?;
        let local = scan_local(&root)?;
        for repo in git_repos(&local) {
            println!("{}", repo.name);
        }
    }

    if args.remote {
        let org = ctx.org_context()?;
        let provider = ctx.provider()?;
        let filter = RepoFilter {
            forks: args.forks || !args.no_forks,
            archived: args.archived,
        };
        for repo in provider.list_repos(org.org(), filter).await? {
            if !repo.is_fork {
                println!("{}", repo.full_name);
                continue;
            }
            // Listings omit the parent; only the single-repository endpoint has it.
            let parent = match repo.parent_full_name {
                Some(parent) => Some(parent),
                None => provider
                    .get_repo(&repo.owner, &repo.name)
                    .await?
                    .and_then(|r| r.parent_full_name),
            };
            match parent {
                Some(parent) => println!("{} (fork of: {parent})", repo.full_name),
                None => println!("{} (fork)", repo.full_name),
            }
        }
    }

    Ok(())
}
