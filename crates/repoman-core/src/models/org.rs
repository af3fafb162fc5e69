use std::path::{Path, PathBuf};

use crate::error::RepomanError;

/// The organization (or user) being mirrored and the directory mirroring it.
///
/// Built once per invocation and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationContext {
    org: String,
    local_root: PathBuf,
}

impl OrganizationContext {
    /// Validates that `local_root` exists and is a directory.
    pub fn new(org: impl Into<String>, local_root: impl Into<PathBuf>) -> Result<Self, RepomanError> {
        let org = org.into();
        let local_root = local_root.into();
        if org.trim().is_empty() {
            return Err(RepomanError::Config {
                message: "organization name is empty".into(),
            });
        }
        if !local_root.exists() {
            return Err(RepomanError::PathNotFound { path: local_root });
        }
        if !local_root.is_dir() {
            return Err(RepomanError::NotADirectory { path: local_root });
        }
        Ok(Self { org, local_root })
    }

    /// Defaults when neither `--org` nor `--local` is given: the current
    /// directory is the local root and its name is the organization.
    pub fn from_current_dir(
        org: Option<String>,
        local_root: Option<PathBuf>,
    ) -> Result<Self, RepomanError> {
        let cwd = std::env::current_dir()?;
        let org = match org {
            Some(org) => org,
            None => cwd
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| RepomanError::Config {
                    message: format!(
                        "cannot derive an organization name from {}; pass --org",
                        cwd.display()
                    ),
                })?,
        };
        Self::new(org, local_root.unwrap_or(cwd))
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    /// Where a repository with the given name lives (or would be cloned to).
    pub fn repo_path(&self, name: &str) -> PathBuf {
        self.local_root.join(name)
    }
}
