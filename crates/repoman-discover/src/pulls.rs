use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use repoman_core::error::RepomanError;
use repoman_host::RemotePull;

/// Which open pull requests `list-prs` keeps.
#[derive(Debug, Default)]
pub struct PullFilter {
    pub include_drafts: bool,
    /// Keep only authors matching at least one pattern (empty keeps all).
    pub authors: Vec<Regex>,
    /// Drop authors matching any pattern.
    pub exclude_authors: Vec<Regex>,
    /// Keep only pull requests at least this old.
    pub older_than: Option<Duration>,
    /// Keep only pull requests at most this old.
    pub newer_than: Option<Duration>,
}

impl PullFilter {
    pub fn with_author_patterns(
        mut self,
        include: &[String],
        exclude: &[String],
    ) -> Result<Self, RepomanError> {
        let compile = |p: &String| {
            Regex::new(p).map_err(|e| RepomanError::Config {
                message: format!("invalid author pattern {p:?}: {e}"),
            })
        };
        self.authors = include.iter().map(compile).collect::<Result<_, _>>()?;
        self.exclude_authors = exclude.iter().map(compile).collect::<Result<_, _>>()?;
        Ok(self)
    }

    /// Whether `pull` survives the filter, judged against `now`.
    pub fn keeps(&self, pull: &RemotePull, now: DateTime<Utc>) -> bool {
        if !self.include_drafts && pull.draft {
            tracing::info!("excluding draft PR #{}", pull.number);
            return false;
        }
        if self.exclude_authors.iter().any(|p| p.is_match(&pull.author)) {
            tracing::info!("excluding PR #{} by author {}", pull.number, pull.author);
            return false;
        }
        if !self.authors.is_empty() && !self.authors.iter().any(|p| p.is_match(&pull.author)) {
            tracing::info!(
                "excluding PR #{} by author not matching: {}",
                pull.number,
                pull.author
            );
            return false;
        }
        if let Some(age) = self.older_than {
            if pull.created_at > now - age {
                tracing::info!("excluding PR #{} created after older-than cutoff", pull.number);
                return false;
            }
        }
        if let Some(age) = self.newer_than {
            if pull.created_at < now - age {
                tracing::info!("excluding PR #{} created before newer-than cutoff", pull.number);
                return false;
            }
        }
        true
    }
}

/// Filter and order pull requests newest first.
pub fn select_pulls(
    pulls: Vec<RemotePull>,
    filter: &PullFilter,
    now: DateTime<Utc>,
) -> Vec<RemotePull> {
    let mut kept: Vec<RemotePull> = pulls.into_iter().filter(|p| filter.keeps(p, now)).collect();
    kept.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn pull(number: u64, author: &str, days_old: i64, draft: bool, now: DateTime<Utc>) -> RemotePull {
        RemotePull {
            repo_full_name: "acme/widgets".to_string(),
            number,
            title: format!("PR {number}"),
            author: author.to_string(),
            draft,
            created_at: now - Duration::days(days_old),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_drafts_excluded_by_default() {
        let now = now();
        let kept = select_pulls(
            vec![pull(1, "a", 1, true, now), pull(2, "a", 1, false, now)],
            &PullFilter::default(),
            now,
        );
        assert_eq!(kept.iter().map(|p| p.number).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_author_patterns() {
        let now = now();
        let filter = PullFilter::default()
            .with_author_patterns(&["^test-".to_string()], &["bot$".to_string()])
            .unwrap();
        let kept = select_pulls(
            vec![
                pull(1, "test-author", 1, false, now),
                pull(2, "another-author", 1, false, now),
                pull(3, "test-bot", 1, false, now),
            ],
            &filter,
            now,
        );
        assert_eq!(kept.iter().map(|p| p.number).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_age_window() {
        let now = now();
        let filter = PullFilter {
            older_than: Some(Duration::days(30)),
            newer_than: Some(Duration::days(90)),
            ..Default::default()
        };
        let kept = select_pulls(
            vec![
                pull(1, "new", 1, false, now),
                pull(2, "right", 60, false, now),
                pull(3, "old", 366, false, now),
            ],
            &filter,
            now,
        );
        assert_eq!(kept.iter().map(|p| p.number).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_sorted_newest_first() {
        let now = now();
        let kept = select_pulls(
            vec![
                pull(1, "a", 10, false, now),
                pull(2, "a", 2, false, now),
                pull(3, "a", 5, false, now),
            ],
            &PullFilter::default(),
            now,
        );
        assert_eq!(kept.iter().map(|p| p.number).collect::<Vec<_>>(), vec![2, 3, 1]);
    }

    #[test]
    fn test_invalid_pattern() {
        let err = PullFilter::default()
            .with_author_patterns(&["(".to_string()], &[])
            .unwrap_err();
        assert!(matches!(err, RepomanError::Config { .. }));
    }
}
