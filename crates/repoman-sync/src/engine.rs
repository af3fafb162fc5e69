use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;

use repoman_core::models::action::{ActionKind, ActionRecord, ActionStatus, SyncReport};
use repoman_core::models::org::OrganizationContext;
use repoman_core::models::repo::RepositoryRecord;
use repoman_discover::reconcile::{ReconcileResult, RepoMatch};
use repoman_discover::scanner::LocalRepo;

use crate::actions::{RepoActions, UpdateOutcome};

/// Which reconciliation outcomes get acted upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionMask {
    pub clone: bool,
    pub update: bool,
}

impl ActionMask {
    pub const CLONE: ActionMask = ActionMask {
        clone: true,
        update: false,
    };
    pub const UPDATE: ActionMask = ActionMask {
        clone: false,
        update: true,
    };
    pub const SYNC: ActionMask = ActionMask {
        clone: true,
        update: true,
    };
}

/// One unit of work derived from a reconciliation outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    Clone {
        record: RepositoryRecord,
        dest: PathBuf,
    },
    Update {
        record: RepositoryRecord,
        path: PathBuf,
    },
    Skip {
        name: String,
        reason: String,
    },
    Orphan(LocalRepo),
}

impl PlannedAction {
    pub fn name(&self) -> &str {
        match self {
            PlannedAction::Clone { record, .. } | PlannedAction::Update { record, .. } => {
                &record.name
            }
            PlannedAction::Skip { name, .. } => name,
            PlannedAction::Orphan(local) => &local.name,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            PlannedAction::Clone { .. } => ActionKind::Clone,
            PlannedAction::Update { .. } => ActionKind::Update,
            PlannedAction::Skip { .. } => ActionKind::Skip,
            PlannedAction::Orphan(_) => ActionKind::Report,
        }
    }
}

/// Turn a reconciliation result into actions, one per name, in name order.
pub fn plan(result: ReconcileResult, ctx: &OrganizationContext, mask: ActionMask) -> Vec<PlannedAction> {
    result
        .matches
        .into_iter()
        .map(|m| match m {
            RepoMatch::RemoteOnly(record) if mask.clone => {
                let dest = ctx.repo_path(&record.name);
                // Anything at the destination, even a file or a dangling link,
                // would make `git clone` fail.
                if dest.symlink_metadata().is_ok() {
                    tracing::info!("skipping existing repository: {}", record.name);
                    PlannedAction::Skip {
                        name: record.name,
                        reason: "path already exists".to_string(),
                    }
                } else {
                    PlannedAction::Clone { dest, record }
                }
            }
            RepoMatch::RemoteOnly(record) => PlannedAction::Skip {
                name: record.name,
                reason: "not cloned locally".to_string(),
            },
            RepoMatch::Both { local, record } if mask.update => PlannedAction::Update {
                path: local.path,
                record,
            },
            RepoMatch::Both { local, .. } => {
                tracing::info!("skipping existing repository: {}", local.name);
                PlannedAction::Skip {
                    name: local.name,
                    reason: "already exists locally".to_string(),
                }
            }
            RepoMatch::LocalOnly(local) if local.is_git => PlannedAction::Orphan(local),
            RepoMatch::LocalOnly(local) => PlannedAction::Skip {
                name: local.name,
                reason: "not a git repository".to_string(),
            },
        })
        .collect()
}

/// Sync engine that runs repository actions in parallel with a concurrency limit.
pub struct SyncEngine {
    concurrency: usize,
    dry_run: bool,
}

impl SyncEngine {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            dry_run: false,
        }
    }

    /// Log what would happen instead of touching any working tree.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run every planned action. A failing action is recorded and never stops
    /// the others. Records come back in plan order.
    pub async fn run(&self, plan: Vec<PlannedAction>, actions: Arc<dyn RepoActions>) -> SyncReport {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let multi = MultiProgress::new();
        let style = ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

        let mut pending = Vec::with_capacity(plan.len());
        for action in plan {
            let name = action.name().to_string();
            let kind = action.kind();

            let action = match action {
                PlannedAction::Skip { name, reason } => {
                    tracing::debug!("{name}: skipped ({reason})");
                    let record =
                        ActionRecord::new(name, ActionKind::Skip, ActionStatus::Skipped).with_detail(reason);
                    pending.push(Pending::Done(record));
                    continue;
                }
                PlannedAction::Orphan(local) => {
                    tracing::warn!("{}: exists locally but not on the remote", local.name);
                    let record = ActionRecord::new(local.name, ActionKind::Report, ActionStatus::Orphaned)
                        .with_detail(local.path.display().to_string());
                    pending.push(Pending::Done(record));
                    continue;
                }
                PlannedAction::Clone { .. } | PlannedAction::Update { .. } if self.dry_run => {
                    tracing::info!("[dry-run] would {kind} {name}");
                    pending.push(Pending::Done(ActionRecord::new(name, kind, ActionStatus::DryRun)));
                    continue;
                }
                other => other,
            };

            let sem = semaphore.clone();
            let pb = multi.add(ProgressBar::new_spinner());
            pb.set_style(style.clone());
            pb.set_message(format!("{kind} {name}"));
            let actions = actions.clone();

            let handle = tokio::spawn(async move {
                // Held until the blocking work finishes.
                let _permit = sem.acquire_owned().await;
                pb.enable_steady_tick(std::time::Duration::from_millis(100));
                tokio::task::spawn_blocking(move || {
                    let record = execute(action, actions.as_ref());
                    pb.finish_with_message(format!("{}: {}", record.name, record.status));
                    record
                })
                .await
            });
            pending.push(Pending::Running { name, kind, handle });
        }

        let mut records = Vec::with_capacity(pending.len());
        for p in pending {
            let record = match p {
                Pending::Done(record) => record,
                Pending::Running { name, kind, handle } => match handle.await {
                    Ok(Ok(record)) => record,
                    Ok(Err(e)) | Err(e) => {
                        tracing::error!("{name}: worker failed: {e}");
                        ActionRecord::new(name, kind, ActionStatus::Failed).with_detail(e.to_string())
                    }
                },
            };
            records.push(record);
        }

        SyncReport { records }
    }
}

enum Pending {
    Done(ActionRecord),
    Running {
        name: String,
        kind: ActionKind,
        handle: tokio::task::JoinHandle<Result<ActionRecord, tokio::task::JoinError>>,
    },
}

fn execute(action: PlannedAction, actions: &dyn RepoActions) -> ActionRecord {
    let started_at = Utc::now();
    let name = action.name().to_string();
    let kind = action.kind();

    let result = match &action {
        PlannedAction::Clone { record, dest } => {
            actions.clone_repo(record, dest).map(|()| ActionStatus::Cloned)
        }
        PlannedAction::Update { record, path } => {
            actions.update_repo(record, path).map(|outcome| match outcome {
                UpdateOutcome::UpToDate => ActionStatus::UpToDate,
                UpdateOutcome::Updated { from, to } => ActionStatus::Updated { from, to },
            })
        }
        PlannedAction::Skip { .. } => Ok(ActionStatus::Skipped),
        PlannedAction::Orphan(_) => Ok(ActionStatus::Orphaned),
    };

    let mut record = match result {
        Ok(status) => {
            tracing::info!("{name}: {status}");
            ActionRecord::new(name, kind, status)
        }
        Err(e) => {
            tracing::error!("{name}: {kind} failed: {e}");
            ActionRecord::new(name, kind, ActionStatus::Failed).with_detail(e.to_string())
        }
    };
    record.started_at = started_at;
    record.finished_at = Utc::now();
    record
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use repoman_core::error::RepomanError;
    use repoman_discover::reconcile::reconcile;
    use repoman_host::RemoteRepo;

    use super::*;

    #[derive(Default)]
    struct FakeActions {
        calls: Mutex<Vec<String>>,
        fail: Vec<&'static str>,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FakeActions {
        fn enter(&self, call: String) {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            self.calls.lock().unwrap().push(call);
            self.running.fetch_sub(1, Ordering::SeqCst);
        }

        fn outcome(&self, name: &str) -> Result<(), RepomanError> {
            if self.fail.iter().any(|f| *f == name) {
                return Err(RepomanError::GitError {
                    message: format!("{name} exploded"),
                });
            }
            Ok(())
        }
    }

    impl RepoActions for FakeActions {
        fn clone_repo(&self, record: &RepositoryRecord, _dest: &Path) -> Result<(), RepomanError> {
            self.enter(format!("clone {}", record.name));
            self.outcome(&record.name)
        }

        fn update_repo(
            &self,
            record: &RepositoryRecord,
            _path: &Path,
        ) -> Result<UpdateOutcome, RepomanError> {
            self.enter(format!("update {}", record.name));
            self.outcome(&record.name).map(|()| UpdateOutcome::UpToDate)
        }
    }

    fn local(root: &Path, name: &str) -> LocalRepo {
        LocalRepo {
            name: name.to_string(),
            path: root.join(name),
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

    fn ab_bc_plan(root: &Path, mask: ActionMask) -> Vec<PlannedAction> {
        let ctx = OrganizationContext::new("acme", root).unwrap();
        let result = reconcile(
            &[local(root, "a"), local(root, "b")],
            &[remote("b"), remote("c")],
        );
        plan(result, &ctx, mask)
    }

    #[test]
    fn test_plan_sync() {
        let dir = tempfile::tempdir().unwrap();
        let planned = ab_bc_plan(dir.path(), ActionMask::SYNC);
        assert!(matches!(&planned[0], PlannedAction::Orphan(l) if l.name == "a"));
        assert!(matches!(&planned[1], PlannedAction::Update { path, .. } if path == &dir.path().join("b")));
        assert!(matches!(&planned[2], PlannedAction::Clone { dest, .. } if dest == &dir.path().join("c")));
    }

    #[test]
    fn test_plan_clone_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let planned = ab_bc_plan(dir.path(), ActionMask::CLONE);
        assert_eq!(planned[1].kind(), ActionKind::Skip);
        assert_eq!(planned[2].kind(), ActionKind::Clone);
    }

    #[test]
    fn test_plan_update_skips_remote_only() {
        let dir = tempfile::tempdir().unwrap();
        let planned = ab_bc_plan(dir.path(), ActionMask::UPDATE);
        assert_eq!(planned[1].kind(), ActionKind::Update);
        assert_eq!(planned[2].kind(), ActionKind::Skip);
    }

    #[test]
    fn test_plan_skips_clone_when_destination_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("c"), "not a clone").unwrap();
        let planned = ab_bc_plan(dir.path(), ActionMask::SYNC);
        assert!(matches!(
            &planned[2],
            PlannedAction::Skip { name, reason } if name == "c" && reason == "path already exists"
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_plan_skips_clone_over_dangling_symlink() {
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("c")).unwrap();
        let planned = ab_bc_plan(dir.path(), ActionMask::CLONE);
        assert_eq!(planned[2].kind(), ActionKind::Skip);
    }

    #[test]
    fn test_plan_updates_hidden_clone() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".github").join(".git")).unwrap();
        let ctx = OrganizationContext::new("acme", dir.path()).unwrap();
        let scanned = repoman_discover::scanner::scan_local(dir.path()).unwrap();
        let planned = plan(reconcile(&scanned, &[remote(".github")]), &ctx, ActionMask::SYNC);
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].kind(), ActionKind::Update);
    }

    #[tokio::test]
    async fn test_run_sync_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeActions::default());
        let report = SyncEngine::new(4)
            .run(ab_bc_plan(dir.path(), ActionMask::SYNC), fake.clone())
            .await;

        let statuses: Vec<(&str, &ActionStatus)> =
            report.records.iter().map(|r| (r.name.as_str(), &r.status)).collect();
        assert_eq!(
            statuses,
            vec![
                ("a", &ActionStatus::Orphaned),
                ("b", &ActionStatus::UpToDate),
                ("c", &ActionStatus::Cloned),
            ]
        );
        assert!(report.is_success());

        let mut calls = fake.calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(calls, vec!["clone c", "update b"]);
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = OrganizationContext::new("acme", dir.path()).unwrap();
        let remotes: Vec<RemoteRepo> = ["r1", "r2", "r3", "r4"].map(remote).to_vec();
        let planned = plan(reconcile(&[], &remotes), &ctx, ActionMask::SYNC);
        let fake = Arc::new(FakeActions {
            fail: vec!["r2"],
            ..Default::default()
        });

        let report = SyncEngine::new(2).run(planned, fake.clone()).await;

        assert_eq!(report.records.len(), 4);
        assert_eq!(report.failed_count(), 1);
        let failed = report.failures().next().unwrap();
        assert_eq!(failed.name, "r2");
        assert!(failed.detail.as_deref().unwrap().contains("r2 exploded"));
        assert_eq!(fake.calls.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_concurrency_limit_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = OrganizationContext::new("acme", dir.path()).unwrap();
        let remotes: Vec<RemoteRepo> = (0..8).map(|i| remote(&format!("r{i}"))).collect();

        for jobs in [1, 3] {
            let planned = plan(reconcile(&[], &remotes), &ctx, ActionMask::CLONE);
            let fake = Arc::new(FakeActions::default());
            let report = SyncEngine::new(jobs).run(planned, fake.clone()).await;
            assert!(report.is_success());
            assert!(fake.peak.load(Ordering::SeqCst) <= jobs, "jobs={jobs}");
        }
    }

    #[tokio::test]
    async fn test_dry_run_performs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeActions::default());
        let report = SyncEngine::new(4)
            .dry_run(true)
            .run(ab_bc_plan(dir.path(), ActionMask::SYNC), fake.clone())
            .await;

        assert!(fake.calls.lock().unwrap().is_empty());
        assert_eq!(report.records[1].status, ActionStatus::DryRun);
        assert_eq!(report.records[2].status, ActionStatus::DryRun);
        assert_eq!(report.records[0].status, ActionStatus::Orphaned);
    }
}
