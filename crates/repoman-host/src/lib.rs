pub mod github;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use repoman_core::error::RepomanError;
use repoman_core::models::repo::RepositoryRecord;

/// A repo as returned by a hosting API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepo {
    pub full_name: String,
    pub owner: String,
    pub name: String,
    pub clone_url: String,
    pub ssh_url: String,
    pub default_branch: String,
    pub is_fork: bool,
    pub parent_full_name: Option<String>,
    pub is_archived: bool,
}

impl From<RemoteRepo> for RepositoryRecord {
    fn from(r: RemoteRepo) -> Self {
        RepositoryRecord {
            name: r.name,
            full_name: r.full_name,
            clone_url: r.clone_url,
            ssh_url: r.ssh_url,
            default_branch: r.default_branch,
            local_path: None,
            is_fork: r.is_fork,
            is_archived: r.is_archived,
            parent_full_name: r.parent_full_name,
        }
    }
}

/// An open pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePull {
    pub repo_full_name: String,
    pub number: u64,
    pub title: String,
    pub author: String,
    pub draft: bool,
    pub created_at: DateTime<Utc>,
}

/// Rate limit information.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Which repositories a listing keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepoFilter {
    pub forks: bool,
    pub archived: bool,
}

impl RepoFilter {
    /// Every repository, forks and archived ones included.
    pub const ALL: RepoFilter = RepoFilter {
        forks: true,
        archived: true,
    };

    pub fn keeps(&self, repo: &RemoteRepo) -> bool {
        (self.forks || !repo.is_fork) && (self.archived || !repo.is_archived)
    }
}

/// Trait for interacting with a git hosting provider.
#[async_trait]
pub trait HostProvider: Send + Sync {
    /// Validate that the credentials are accepted.
    async fn validate_credentials(&self) -> Result<bool, RepomanError>;

    /// List all repos owned by an organization or user, sorted by full name.
    /// Every page is fetched before returning.
    async fn list_repos(
        &self,
        owner: &str,
        filter: RepoFilter,
    ) -> Result<Vec<RemoteRepo>, RepomanError>;

    /// Get a specific repo by owner/name.
    async fn get_repo(&self, owner: &str, name: &str) -> Result<Option<RemoteRepo>, RepomanError>;

    /// List the open pull requests of a repo.
    async fn list_open_pulls(&self, owner: &str, name: &str)
        -> Result<Vec<RemotePull>, RepomanError>;

    /// Get current rate limit status.
    async fn rate_limit_status(&self) -> Result<RateLimitInfo, RepomanError>;
}
