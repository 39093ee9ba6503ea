use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RecordKind {
    PullRequest,
    Issue,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::PullRequest => "pull_request",
            RecordKind::Issue => "issue",
        }
    }

    /// Short label used in log lines and CLI output ("PR #42").
    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::PullRequest => "PR",
            RecordKind::Issue => "Issue",
        }
    }

    /// Environment variable carrying the inbound payload in CI.
    pub fn payload_env(&self) -> &'static str {
        match self {
            RecordKind::PullRequest => "PR_DATA",
            RecordKind::Issue => "ISSUE_DATA",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RecordStatus {
    Open,
    Closed,
    Merged,
}

impl RecordStatus {
    /// Value persisted in the local cache.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Open => "open",
            RecordStatus::Closed => "closed",
            RecordStatus::Merged => "merged",
        }
    }

    /// Option name of the Notion "Status" select.
    pub fn select_name(&self) -> &'static str {
        match self {
            RecordStatus::Open => "Open",
            RecordStatus::Closed => "Closed",
            RecordStatus::Merged => "Merged",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        match s {
            "open" => Some(RecordStatus::Open),
            "closed" => Some(RecordStatus::Closed),
            "merged" => Some(RecordStatus::Merged),
            _ => None,
        }
    }
}

/// A closed pull request is `Merged` when it was merged, `Closed` otherwise.
pub fn pull_request_status(state: &str, merged: bool) -> RecordStatus {
    match (state, merged) {
        ("closed", true) => RecordStatus::Merged,
        ("closed", false) => RecordStatus::Closed,
        _ => RecordStatus::Open,
    }
}

pub fn issue_status(state: &str) -> RecordStatus {
    if state == "closed" {
        RecordStatus::Closed
    } else {
        RecordStatus::Open
    }
}

/// Fields shared by pull requests and issues.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordHeader {
    pub number: i64,
    pub title: String,
    pub body: String,
    pub author: String,
    pub status: RecordStatus,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub labels: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullRequest {
    pub header: RecordHeader,
    pub merged_at: Option<DateTime<Utc>>,
    pub head_ref: String,
    pub base_ref: String,
    pub commits: i64,
    pub changed_files: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Issue {
    pub header: RecordHeader,
    pub assignees: BTreeSet<String>,
    pub comments: i64,
    pub milestone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DomainRecord {
    PullRequest(PullRequest),
    Issue(Issue),
}

impl DomainRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            DomainRecord::PullRequest(_) => RecordKind::PullRequest,
            DomainRecord::Issue(_) => RecordKind::Issue,
        }
    }

    pub fn header(&self) -> &RecordHeader {
        match self {
            DomainRecord::PullRequest(pr) => &pr.header,
            DomainRecord::Issue(issue) => &issue.header,
        }
    }

    pub fn number(&self) -> i64 {
        self.header().number
    }

    pub fn status(&self) -> RecordStatus {
        self.header().status
    }
}

/// Sets are persisted as a sorted, comma-joined string.
pub fn join_set(values: &BTreeSet<String>) -> String {
    values.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

/// RFC 3339 with second precision and a `Z` suffix, e.g. `2024-01-01T00:00:00Z`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}
