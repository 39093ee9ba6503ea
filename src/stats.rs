//! Read-only aggregation over the local cache.
use anyhow::Result;
use serde::Serialize;
use std::fmt;

use crate::db::{KindStats, RecordCache};
use crate::model::RecordKind;

impl KindStats {
    /// Share of cached rows that carry a Notion page id, in `[0, 1]`.
    pub fn sync_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.synced as f64 / self.total as f64
        }
    }

    pub fn unsynced(&self) -> i64 {
        self.total - self.synced
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct SyncStats {
    pub pull_requests: KindStats,
    pub issues: KindStats,
}

impl SyncStats {
    pub fn for_kind(&self, kind: RecordKind) -> KindStats {
        match kind {
            RecordKind::PullRequest => self.pull_requests,
            RecordKind::Issue => self.issues,
        }
    }
}

pub async fn collect(cache: &dyn RecordCache) -> Result<SyncStats> {
    Ok(SyncStats {
        pull_requests: cache.stats(RecordKind::PullRequest).await?,
        issues: cache.stats(RecordKind::Issue).await?,
    })
}

impl fmt::Display for SyncStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, s) in [("Pull Requests", self.pull_requests), ("Issues", self.issues)] {
            writeln!(
                f,
                "{label}: {} total | {} synced to Notion ({:.0}%)",
                s.total,
                s.synced,
                s.sync_ratio() * 100.0
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_handles_empty_table() {
        assert_eq!(KindStats::default().sync_ratio(), 0.0);
        let s = KindStats { total: 4, synced: 3 };
        assert_eq!(s.sync_ratio(), 0.75);
        assert_eq!(s.unsynced(), 1);
    }

    #[test]
    fn display_lists_both_kinds() {
        let stats = SyncStats {
            pull_requests: KindStats { total: 2, synced: 1 },
            issues: KindStats::default(),
        };
        let out = stats.to_string();
        assert!(out.contains("Pull Requests: 2 total | 1 synced to Notion (50%)"));
        assert!(out.contains("Issues: 0 total | 0 synced to Notion (0%)"));
        assert_eq!(stats.for_kind(RecordKind::PullRequest).total, 2);
    }
}
