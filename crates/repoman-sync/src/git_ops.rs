use std::path::Path;
use std::process::Command;

use repoman_core::error::RepomanError;

/// Result of a git command execution.
#[derive(Debug)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

fn git_command(args: &[&str]) -> Command {
    tracing::debug!("running git {}", args.join(" "));
    let mut cmd = Command::new("git");
    cmd.args(args);
    // Never block on an interactive credential prompt.
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd
}

/// Run a git command in the given directory.
fn git(dir: &Path, args: &[&str]) -> Result<GitOutput, RepomanError> {
    let output = git_command(args)
        .current_dir(dir)
        .output()
        .map_err(|e| RepomanError::GitError {
            message: format!("failed to run git {}: {e}", args.join(" ")),
        })?;

    Ok(GitOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        success: output.status.success(),
    })
}

/// Run a git command in the given directory, returning an error if it fails.
fn git_ok(dir: &Path, args: &[&str]) -> Result<String, RepomanError> {
    let out = git(dir, args)?;
    if !out.success {
        return Err(RepomanError::GitError {
            message: format!("git {} failed: {}", args.join(" "), out.stderr.trim()),
        });
    }
    Ok(out.stdout)
}

/// Clone a repo to a local path.
pub fn clone(url: &str, dest: &Path) -> Result<(), RepomanError> {
    let dest_str = dest.to_string_lossy();
    let output = git_command(&["clone", "--quiet", url, &dest_str])
        .output()
        .map_err(|e| RepomanError::GitError {
            message: format!("failed to clone {url}: {e}"),
        })?;

    if !output.status.success() {
        return Err(RepomanError::GitError {
            message: format!(
                "git clone failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(())
}

/// Checkout a branch.
pub fn checkout(dir: &Path, branch: &str) -> Result<(), RepomanError> {
    git_ok(dir, &["checkout", "--quiet", branch])?;
    Ok(())
}

/// Pull the tracked upstream branch, refusing anything but a fast-forward.
pub fn pull_ff(dir: &Path) -> Result<(), RepomanError> {
    git_ok(dir, &["pull", "--ff-only", "--quiet"])?;
    Ok(())
}

/// Get the current branch name.
pub fn current_branch(dir: &Path) -> Result<String, RepomanError> {
    let stdout = git_ok(dir, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    Ok(stdout.trim().to_string())
}

/// Get the SHA of a ref, or `None` if it does not resolve (e.g. an unborn HEAD).
pub fn rev_parse(dir: &Path, refspec: &str) -> Result<Option<String>, RepomanError> {
    let out = git(dir, &["rev-parse", "--verify", "--quiet", refspec])?;
    if out.success {
        Ok(Some(out.stdout.trim().to_string()))
    } else {
        Ok(None)
    }
}

/// Whether `dir` is the top of a git working tree.
pub fn is_work_tree(dir: &Path) -> bool {
    dir.join(".git").exists()
}
