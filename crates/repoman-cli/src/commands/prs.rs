use chrono::Utc;
use clap::Args;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use console::style;
use repoman_core::duration::parse_iso8601;
use repoman_discover::pulls::{select_pulls, PullFilter};
use repoman_host::{HostProvider, RepoFilter};

use super::Context;

#[derive(Args)]
pub struct ListPrsArgs {
    /// Include forked repositories (default)
    #[arg(long, overrides_with = "exclude_forks")]
    include_forks: bool,
    /// Exclude forked repositories
    #[arg(long, overrides_with = "include_forks")]
    exclude_forks: bool,
    /// Include archived repositories
    #[arg(long, overrides_with = "exclude_archived")]
    include_archived: bool,
    /// Exclude archived repositories (default)
    #[arg(long, overrides_with = "include_archived")]
    exclude_archived: bool,
    /// Include draft pull requests
    #[arg(long, overrides_with = "exclude_drafts")]
    include_drafts: bool,
    /// Exclude draft pull requests (default)
    #[arg(long, overrides_with = "include_drafts")]
    exclude_drafts: bool,
    /// Only authors matching this regex; may be repeated
    #[arg(long, value_name = "REGEX")]
    author: Vec<String>,
    /// Drop authors matching this regex; may be repeated
    #[arg(long, value_name = "REGEX")]
    exclude_author: Vec<String>,
    /// Only pull requests older than this ISO 8601 duration (e.g. P30D)
    #[arg(long, value_name = "DURATION")]
    older_than: Option<String>,
    /// Only pull requests newer than this ISO 8601 duration (e.g. PT12H)
    #[arg(long, value_name = "DURATION")]
    newer_than: Option<String>,
}

pub async fn run(ctx: &Context, args: ListPrsArgs) -> anyhow::Result<()> {
    let filter = PullFilter {
        include_drafts: args.include_drafts,
        older_than: args.older_than.as_deref().map(parse_iso8601).transpose()?,
        newer_than: args.newer_than.as_deref().map(parse_iso8601).transpose()?,
        ..Default::default()
    }
    .with_author_patterns(&args.author, &args.exclude_author)?;

    let org = ctx.org_context()?;
    let provider = ctx.provider()?;
    let repo_filter = RepoFilter {
        forks: !args.exclude_forks,
        archived: args.include_archived,
    };

    let mut pulls = Vec::new();
    for repo in provider.list_repos(org.org(), repo_filter).await? {
        tracing::info!("fetching PRs for repository: {}", repo.name);
        pulls.extend(provider.list_open_pulls(&repo.owner, &repo.name).await?);
    }
    let pulls = select_pulls(pulls, &filter, Utc::now());

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["PR", "Title", "Author", "Created"]);
    for pr in &pulls {
        table.add_row(vec![
            Cell::new(format!("{}#{}", pr.repo_full_name, pr.number)).fg(Color::Cyan),
            Cell::new(&pr.title),
            Cell::new(&pr.author),
            Cell::new(pr.created_at.format("%Y-%m-%d")),
        ]);
    }

    println!("{}", style("Open Pull Requests").bold().magenta());
    println!("{table}");
    Ok(())
}
