use std::collections::BTreeMap;

use repoman_core::models::repo::RepositoryRecord;
use repoman_host::RemoteRepo;

use crate::scanner::LocalRepo;

/// Classification of a repo name during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoMatch {
    /// Found both locally and on the remote host. The record's `local_path`
    /// points at the local directory.
    Both {
        local: LocalRepo,
        record: RepositoryRecord,
    },
    /// Found locally but not on the remote host.
    LocalOnly(LocalRepo),
    /// Found on the remote host but not locally.
    RemoteOnly(RepositoryRecord),
}

impl RepoMatch {
    pub fn name(&self) -> &str {
        match self {
            RepoMatch::Both { local, .. } => &local.name,
            RepoMatch::LocalOnly(local) => &local.name,
            RepoMatch::RemoteOnly(record) => &record.name,
        }
    }
}

/// Result of reconciling local and remote repos, ordered by name.
#[derive(Debug, Default)]
pub struct ReconcileResult {
    pub matches: Vec<RepoMatch>,
}

impl ReconcileResult {
    pub fn both_count(&self) -> usize {
        self.matches
            .iter()
            .filter(|m| matches!(m, RepoMatch::Both { .. }))
            .count()
    }

    pub fn local_only_count(&self) -> usize {
        self.matches
            .iter()
            .filter(|m| matches!(m, RepoMatch::LocalOnly(_)))
            .count()
    }

    pub fn remote_only_count(&self) -> usize {
        self.matches
            .iter()
            .filter(|m| matches!(m, RepoMatch::RemoteOnly(_)))
            .count()
    }
}

/// Reconcile local directories with remote repos by name.
///
/// Every name in the union lands in exactly one class. Should the remote list
/// contain a name twice, the first entry wins.
pub fn reconcile(local: &[LocalRepo], remote: &[RemoteRepo]) -> ReconcileResult {
    let mut remote_by_name: BTreeMap<&str, &RemoteRepo> = BTreeMap::new();
    for repo in remote {
        remote_by_name.entry(repo.name.as_str()).or_insert(repo);
    }
    let local_by_name: BTreeMap<&str, &LocalRepo> =
        local.iter().map(|l| (l.name.as_str(), l)).collect();

    let mut names: Vec<&str> = remote_by_name
        .keys()
        .chain(local_by_name.keys())
        .copied()
        .collect();
    names.sort_unstable();
    names.dedup();

    let matches = names
        .into_iter()
        .map(|name| match (local_by_name.get(name), remote_by_name.get(name)) {
            (Some(local), Some(remote)) => {
                let mut record = RepositoryRecord::from((*remote).clone());
                record.local_path = Some(local.path.clone());
                RepoMatch::Both {
                    local: (*local).clone(),
                    record,
                }
            }
            (Some(local), None) => RepoMatch::LocalOnly((*local).clone()),
            (None, Some(remote)) => RepoMatch::RemoteOnly(RepositoryRecord::from((*remote).clone())),
            (None, None) => unreachable!("name {name} came from one of the two maps"),
        })
        .collect();

    ReconcileResult { matches }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(name: &str) -> LocalRepo {
        LocalRepo {
            name: name.to_string(),
            path: format!("/org/{name}").into(),
            is_git: true,
        }
    }

    fn remote(name: &str) -> RemoteRepo {
        RemoteRepo {
            full_name: format!("acme/{name}"),
            owner: "acme".to_string(),
            name: name.to_string(),
            clone_url: format!("https://github.com/acme/{name}.git"),
            ssh_url: format!("git@github.com:acme/{name}.git"),
            default_branch: "main".to_string(),
            is_fork: false,
            parent_full_name: None,
            is_archived: false,
        }
    }

    #[test]
    fn test_local_ab_remote_bc() {
        let result = reconcile(&[local("a"), local("b")], &[remote("b"), remote("c")]);

        assert_eq!(result.matches.len(), 3);
        assert!(matches!(&result.matches[0], RepoMatch::LocalOnly(l) if l.name == "a"));
        match &result.matches[1] {
            RepoMatch::Both { local, record } => {
                assert_eq!(local.name, "b");
                assert_eq!(record.local_path.as_deref(), Some(local.path.as_path()));
            }
            other => panic!("expected b in both, got {other:?}"),
        }
        assert!(matches!(&result.matches[2], RepoMatch::RemoteOnly(r) if r.name == "c"));
    }

    #[test]
    fn test_classes_partition_the_union() {
        let locals: Vec<LocalRepo> = ["x", "shared1", "y", "shared2"].map(local).to_vec();
        let remotes: Vec<RemoteRepo> = ["shared2", "z", "shared1"].map(remote).to_vec();
        let result = reconcile(&locals, &remotes);

        assert_eq!(result.both_count(), 2);
        assert_eq!(result.local_only_count(), 2);
        assert_eq!(result.remote_only_count(), 1);

        let names: Vec<&str> = result.matches.iter().map(RepoMatch::name).collect();
        assert_eq!(names, vec!["shared1", "shared2", "x", "y", "z"]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(reconcile(&[], &[]).matches.is_empty());
        let only_remote = reconcile(&[], &[remote("a")]);
        assert_eq!(only_remote.remote_only_count(), 1);
    }

    #[test]
    fn test_duplicate_remote_names_first_wins() {
        let mut dup = remote("a");
        dup.full_name = "other/a".to_string();
        let result = reconcile(&[], &[remote("a"), dup]);
        assert_eq!(result.matches.len(), 1);
        assert!(matches!(&result.matches[0], RepoMatch::RemoteOnly(r) if r.full_name == "acme/a"));
    }
}
