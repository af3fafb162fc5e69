use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::CloneProtocol;

/// A repository as seen during one invocation: remote metadata plus the
/// local clone, when one exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub name: String,
    pub full_name: String,
    pub clone_url: String,
    pub ssh_url: String,
    pub default_branch: String,
    pub local_path: Option<PathBuf>,
    pub is_fork: bool,
    pub is_archived: bool,
    pub parent_full_name: Option<String>,
}

impl RepositoryRecord {
    /// URL to clone from for the given protocol. Falls back to the HTTPS URL
    /// when no SSH URL is known.
    pub fn remote_url(&self, protocol: CloneProtocol) -> &str {
        match protocol {
            CloneProtocol::Ssh if !self.ssh_url.is_empty() => &self.ssh_url,
            _ => &self.clone_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_url_falls_back_to_https() {
        let mut record = RepositoryRecord {
            name: "widgets".to_string(),
            full_name: "acme/widgets".to_string(),
            clone_url: "https://github.com/acme/widgets.git".to_string(),
            ssh_url: String::new(),
            default_branch: "main".to_string(),
            local_path: None,
            is_fork: false,
            is_archived: false,
            parent_full_name: None,
        };
        assert_eq!(
            record.remote_url(CloneProtocol::Ssh),
            "https://github.com/acme/widgets.git"
        );
        record.ssh_url = "git@github.com:acme/widgets.git".to_string();
        assert_eq!(
            record.remote_url(CloneProtocol::Ssh),
            "git@github.com:acme/widgets.git"
        );
    }
}
