//! Local cache: row models, SQL repositories and the [`RecordCache`] seam.
//!
//! - `model`: row structs returned by repositories.
//! - `repo`: SQL-only functions over the `pull_requests` / `issues` tables.
//!
//! The sync engine only talks to [`RecordCache`], so tests can swap the SQLite
//! implementation for a double.

pub mod model;
pub mod repo;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::{SyncError, SyncResult};
use crate::model::{DomainRecord, RecordKind};

pub use model::{CachedRecord, IssueRow, KindStats, PullRequestRow};
pub use repo::*;

#[async_trait]
pub trait RecordCache: Send + Sync {
    /// Insert-or-replace the row for `record.number()`; returns the row id.
    async fn upsert(&self, record: &DomainRecord, notion_page_id: Option<&str>)
        -> SyncResult<i64>;

    /// All rows of one kind, newest creation time first.
    async fn list_all(&self, kind: RecordKind) -> Result<Vec<CachedRecord>>;

    async fn stats(&self, kind: RecordKind) -> Result<KindStats>;
}

#[derive(Debug, Clone)]
pub struct SqliteCache {
    pool: Pool,
}

impl SqliteCache {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl RecordCache for SqliteCache {
    async fn upsert(
        &self,
        record: &DomainRecord,
        notion_page_id: Option<&str>,
    ) -> SyncResult<i64> {
        let res = match record {
            DomainRecord::PullRequest(pr) => upsert_pull_request(&self.pool, pr, notion_page_id).await,
            DomainRecord::Issue(issue) => upsert_issue(&self.pool, issue, notion_page_id).await,
        };
        res.map_err(|err| SyncError::LocalCacheWriteFailed(format!("{err:#}")))
    }

    async fn list_all(&self, kind: RecordKind) -> Result<Vec<CachedRecord>> {
        list_records(&self.pool, kind).await
    }

    async fn stats(&self, kind: RecordKind) -> Result<KindStats> {
        kind_stats(&self.pool, kind).await
    }
}
