use std::path::Path;

use repoman_core::config::CloneProtocol;
use repoman_core::error::RepomanError;
use repoman_core::models::repo::RepositoryRecord;

use crate::git_ops;

/// What an update changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate,
    Updated { from: String, to: String },
}

/// The side effects a reconciliation run performs on one repository.
///
/// Implementations are called from blocking worker threads and must not
/// share mutable state between calls.
pub trait RepoActions: Send + Sync {
    /// Create a new clone of `record` at `dest`.
    fn clone_repo(&self, record: &RepositoryRecord, dest: &Path) -> Result<(), RepomanError>;

    /// Bring the clone at `path` up to date with the remote default branch.
    fn update_repo(
        &self,
        record: &RepositoryRecord,
        path: &Path,
    ) -> Result<UpdateOutcome, RepomanError>;
}

/// `RepoActions` backed by the `git` executable.
#[derive(Debug, Clone, Default)]
pub struct GitActions {
    protocol: CloneProtocol,
}

impl GitActions {
    pub fn new(protocol: CloneProtocol) -> Self {
        Self { protocol }
    }
}

impl RepoActions for GitActions {
    fn clone_repo(&self, record: &RepositoryRecord, dest: &Path) -> Result<(), RepomanError> {
        let url = record.remote_url(self.protocol);
        tracing::info!("cloning {url} to {}", dest.display());
        git_ops::clone(url, dest)
    }

    fn update_repo(
        &self,
        record: &RepositoryRecord,
        path: &Path,
    ) -> Result<UpdateOutcome, RepomanError> {
        if !git_ops::is_work_tree(path) {
            return Err(RepomanError::GitError {
                message: format!("{} is not a git working tree", path.display()),
            });
        }

        let branch = git_ops::current_branch(path)?;
        if branch != record.default_branch {
            tracing::info!("{}: switching from {branch} to {}", record.name, record.default_branch);
            git_ops::checkout(path, &record.default_branch)?;
        }
        tracing::info!("updating {} on {}", record.name, record.default_branch);
        // Measured after the checkout: switching branches alone is not an update.
        let on_branch = git_ops::rev_parse(path, "HEAD")?;
        git_ops::pull_ff(path)?;
        let after = git_ops::rev_parse(path, "HEAD")?;

        if on_branch == after {
            Ok(UpdateOutcome::UpToDate)
        } else {
            Ok(UpdateOutcome::Updated {
                from: on_branch.unwrap_or_default(),
                to: after.unwrap_or_default(),
            })
        }
    }
}
