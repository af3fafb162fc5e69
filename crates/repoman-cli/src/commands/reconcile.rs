use std::num::NonZeroUsize;
use std::sync::Arc;

use clap::Args;
use console::style;
use repoman_core::models::action::{ActionStatus, SyncReport};
use repoman_host::RepoFilter;
use repoman_sync::actions::GitActions;
use repoman_sync::engine::{plan, ActionMask, SyncEngine};

use super::Context;

#[derive(Args)]
pub struct ReconcileArgs {
    /// Include forked repositories
    #[arg(long)]
    forks: bool,
    /// Include archived repositories
    #[arg(long)]
    archived: bool,
    /// Show what would be done without touching any working tree
    #[arg(long)]
    dry_run: bool,
    /// Concurrent git operations [default: sync_concurrency from config]
    #[arg(long, short = 'j')]
    jobs: Option<NonZeroUsize>,
}

pub async fn run(ctx: &Context, args: ReconcileArgs, mask: ActionMask) -> anyhow::Result<()> {
    let org = ctx.org_context()?;
    let provider = ctx.provider()?;
    let filter = RepoFilter {
        forks: args.forks,
        archived: args.archived,
    };

    let result = repoman_discover::discover(&org, &provider, filter).await?;
    let planned = plan(result, &org, mask);

    let jobs = args
        .jobs
        .map_or(ctx.config.sync_concurrency, NonZeroUsize::get);
    let actions = Arc::new(GitActions::new(ctx.config.clone_protocol));
    let report = SyncEngine::new(jobs)
        .dry_run(args.dry_run)
        .run(planned, actions)
        .await;

    print_summary(&report, args.dry_run);

    let failed = report.failed_count();
    if failed > 0 {
        anyhow::bail!("{failed} repository action(s) failed");
    }
    Ok(())
}

fn print_summary(report: &SyncReport, dry_run: bool) {
    let cloned = report.count(|s| matches!(s, ActionStatus::Cloned));
    let updated = report.count(|s| matches!(s, ActionStatus::Updated { .. }));
    let current = report.count(|s| matches!(s, ActionStatus::UpToDate));
    let skipped = report.count(|s| matches!(s, ActionStatus::Skipped));
    let failed = report.failed_count();

    if dry_run {
        for record in report.records.iter().filter(|r| r.status == ActionStatus::DryRun) {
            println!("  [dry-run] would {} {}", record.kind, record.name);
        }
    }

    let orphans: Vec<_> = report
        .records
        .iter()
        .filter(|r| r.status == ActionStatus::Orphaned)
        .collect();
    if !orphans.is_empty() {
        println!("\n{}", style("Local only (not on the remote):").yellow());
        for record in &orphans {
            println!("  {}", record.name);
        }
    }

    println!(
        "\n{}: {cloned} cloned | {updated} updated | {current} up to date | {skipped} skipped | {} local only | {failed} failed",
        style("Sync complete").bold(),
        orphans.len()
    );

    for record in report.failures() {
        println!(
            "\n{} {}",
            style("Errors for").red(),
            style(&record.name).red().bold()
        );
        if let Some(detail) = &record.detail {
            println!("  {detail}");
        }
    }
}
