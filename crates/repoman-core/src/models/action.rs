use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the reconciler decided to do with one repository name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Clone,
    Update,
    Skip,
    Report,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::Clone => write!(f, "clone"),
            ActionKind::Update => write!(f, "update"),
            ActionKind::Skip => write!(f, "skip"),
            ActionKind::Report => write!(f, "report"),
        }
    }
}

/// How a single repository action ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Cloned,
    Updated { from: String, to: String },
    UpToDate,
    Skipped,
    Orphaned,
    DryRun,
    Failed,
}

impl ActionStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, ActionStatus::Failed)
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionStatus::Cloned => write!(f, "cloned"),
            ActionStatus::Updated { from, to } => {
                write!(f, "updated {}..{}", short_sha(from), short_sha(to))
            }
            ActionStatus::UpToDate => write!(f, "up to date"),
            ActionStatus::Skipped => write!(f, "skipped"),
            ActionStatus::Orphaned => write!(f, "local only"),
            ActionStatus::DryRun => write!(f, "dry run"),
            ActionStatus::Failed => write!(f, "failed"),
        }
    }
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

/// Record of one repository action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub name: String,
    pub kind: ActionKind,
    pub status: ActionStatus,
    /// Free-form detail: the skip reason, or the error for a failure.
    pub detail: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ActionRecord {
    pub fn new(name: impl Into<String>, kind: ActionKind, status: ActionStatus) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            kind,
            status,
            detail: None,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Aggregated outcome of a reconciliation run.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub records: Vec<ActionRecord>,
}

impl SyncReport {
    pub fn count(&self, pred: impl Fn(&ActionStatus) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.status)).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ActionRecord> {
        self.records.iter().filter(|r| r.status.is_failure())
    }

    pub fn failed_count(&self) -> usize {
        self.count(ActionStatus::is_failure)
    }

    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts_failures_only() {
        let report = SyncReport {
            records: vec![
                ActionRecord::new("a", ActionKind::Report, ActionStatus::Orphaned),
                ActionRecord::new("b", ActionKind::Update, ActionStatus::UpToDate),
                ActionRecord::new("c", ActionKind::Clone, ActionStatus::Failed)
                    .with_detail("git clone failed"),
            ],
        };
        assert_eq!(report.failed_count(), 1);
        assert!(!report.is_success());
        assert_eq!(report.failures().next().unwrap().name, "c");
    }

    #[test]
    fn test_updated_display_shortens_shas() {
        let status = ActionStatus::Updated {
            from: "0123456789abcdef".to_string(),
            to: "fedcba9876543210".to_string(),
        };
        assert_eq!(status.to_string(), "updated 0123456..fedcba9");
    }
}
