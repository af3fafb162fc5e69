use clap::Args;
use console::style;
use repoman_discover::scanner::{git_repos, scan_local};
use repoman_sync::exec::{exec_in_repos, Cmd, ExecOptions};

use super::Context;

#[derive(Args)]
pub struct ExecArgs {
    /// Capture the output of each command; print it only when it fails
    #[arg(long)]
    capture: bool,
    /// Stop at the first repository whose command fails (default)
    #[arg(long, overrides_with = "no_check")]
    check: bool,
    /// Visit every repository regardless of failures
    #[arg(long, overrides_with = "check")]
    no_check: bool,
    /// Command to run, after `--`. Supports `;`, `&&`, `||`, `( )` and `{ }`
    #[arg(last = true, value_name = "COMMAND")]
    command: Vec<String>,
}

pub fn run(ctx: &Context, args: ExecArgs) -> anyhow::Result<()> {
    let cmd = Cmd::parse(&args.command)?;
    let root = ctx.local_root()?;
    let local = scan_local(&root)?;
    let repos: Vec<_> = git_repos(&local).map(|r| r.path.clone()).collect();

    let opts = ExecOptions {
        capture: args.capture,
        check: !args.no_check,
    };
    let outcomes = exec_in_repos(&cmd, &repos, opts);

    let mut failed = 0;
    for outcome in outcomes.iter().filter(|o| o.failed()) {
        failed += 1;
        let name = outcome
            .repo
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| outcome.repo.display().to_string());
        match &outcome.result {
            Ok(result) => {
                eprintln!(
                    "{} {} (exit code {})",
                    style("Command failed in").red(),
                    style(&name).red().bold(),
                    result.exit_code
                );
                if let Some(out) = result.stdout.as_deref().filter(|s| !s.is_empty()) {
                    println!("{out}");
                }
                if let Some(err) = result.stderr.as_deref().filter(|s| !s.is_empty()) {
                    eprintln!("{err}");
                }
            }
            Err(e) => eprintln!("{} {}: {e}", style("Command failed in").red(), style(&name).red().bold()),
        }
    }

    if opts.check && failed > 0 {
        anyhow::bail!("command failed, aborting");
    }
    Ok(())
}
