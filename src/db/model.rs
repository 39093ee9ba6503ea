//! Row models returned by the cache repositories.
//!
//! These mirror the table columns one-to-one; conversion from domain records
//! happens in `repo.rs`.

use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PullRequestRow {
    pub id: i64,
    pub pr_number: i64,
    pub title: String,
    pub description: String,
    pub author: String,
    pub status: String,
    pub url: Option<String>,
    pub created_at: String,
    pub merged_at: Option<String>,
    pub closed_at: Option<String>,
    pub labels: String,
    pub branch_from: String,
    pub branch_to: String,
    pub commits: i64,
    pub changed_files: i64,
    pub synced_to_notion: bool,
    pub notion_page_id: Option<String>,
    pub last_updated: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IssueRow {
    pub id: i64,
    pub issue_number: i64,
    pub title: String,
    pub description: String,
    pub author: String,
    pub status: String,
    pub url: Option<String>,
    pub created_at: String,
    pub closed_at: Option<String>,
    pub labels: String,
    pub assignees: String,
    pub comments_count: i64,
    pub milestone: Option<String>,
    pub synced_to_notion: bool,
    pub notion_page_id: Option<String>,
    pub last_updated: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CachedRecord {
    PullRequest(PullRequestRow),
    Issue(IssueRow),
}

impl CachedRecord {
    pub fn number(&self) -> i64 {
        match self {
            CachedRecord::PullRequest(r) => r.pr_number,
            CachedRecord::Issue(r) => r.issue_number,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            CachedRecord::PullRequest(r) => &r.title,
            CachedRecord::Issue(r) => &r.title,
        }
    }

    pub fn created_at(&self) -> &str {
        match self {
            CachedRecord::PullRequest(r) => &r.created_at,
            CachedRecord::Issue(r) => &r.created_at,
        }
    }

    pub fn synced(&self) -> bool {
        match self {
            CachedRecord::PullRequest(r) => r.synced_to_notion,
            CachedRecord::Issue(r) => r.synced_to_notion,
        }
    }

    pub fn notion_page_id(&self) -> Option<&str> {
        match self {
            CachedRecord::PullRequest(r) => r.notion_page_id.as_deref(),
            CachedRecord::Issue(r) => r.notion_page_id.as_deref(),
        }
    }
}

/// Row counts for one record kind.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct KindStats {
    pub total: i64,
    pub synced: i64,
}
