//! Turns a raw GitHub webhook/API payload into a typed [`DomainRecord`].
//!
//! Only the fields the sync needs are read; everything else in the payload is
//! ignored. Missing optional values fall back to defaults, missing required
//! substructures (`user`, `head`, `base`) reject the record.
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;

use crate::error::{SyncError, SyncResult};
use crate::model::{
    issue_status, pull_request_status, DomainRecord, Issue, PullRequest, RecordHeader, RecordKind,
};

#[derive(Deserialize)]
struct RawUser {
    login: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLabel {
    Named { name: String },
    Plain(String),
}

impl RawLabel {
    fn into_name(self) -> String {
        match self {
            RawLabel::Named { name } => name,
            RawLabel::Plain(name) => name,
        }
    }
}

#[derive(Deserialize)]
struct RawRef {
    #[serde(rename = "ref")]
    git_ref: Option<String>,
}

#[derive(Deserialize)]
struct RawMilestone {
    title: Option<String>,
}

#[derive(Deserialize)]
struct RawCommon {
    title: Option<String>,
    body: Option<String>,
    user: Option<RawUser>,
    state: Option<String>,
    html_url: Option<String>,
    created_at: Option<String>,
    closed_at: Option<String>,
    labels: Option<Vec<RawLabel>>,
}

#[derive(Deserialize)]
struct RawPullRequest {
    #[serde(flatten)]
    common: RawCommon,
    merged: Option<bool>,
    merged_at: Option<String>,
    head: Option<RawRef>,
    base: Option<RawRef>,
    commits: Option<i64>,
    changed_files: Option<i64>,
}

#[derive(Deserialize)]
struct RawIssue {
    #[serde(flatten)]
    common: RawCommon,
    assignees: Option<Vec<RawUser>>,
    comments: Option<i64>,
    milestone: Option<RawMilestone>,
}

pub fn normalize(kind: RecordKind, raw: &Value) -> SyncResult<DomainRecord> {
    match kind {
        RecordKind::PullRequest => normalize_pull_request(raw).map(DomainRecord::PullRequest),
        RecordKind::Issue => normalize_issue(raw).map(DomainRecord::Issue),
    }
}

pub fn normalize_pull_request(raw: &Value) -> SyncResult<PullRequest> {
    let number = external_number(raw)?;
    let parsed: RawPullRequest = serde_json::from_value(raw.clone())
        .map_err(|e| SyncError::invalid(format!("PR #{number}: {e}")))?;

    let state = parsed.common.state.clone().unwrap_or_default();
    let status = pull_request_status(&state, parsed.merged.unwrap_or(false));
    let header = build_header(number, "PR", parsed.common, status)?;

    let head_ref = required_ref(parsed.head, number, "head")?;
    let base_ref = required_ref(parsed.base, number, "base")?;

    Ok(PullRequest {
        merged_at: optional_timestamp(parsed.merged_at.as_deref(), number, "merged_at")?,
        head_ref,
        base_ref,
        commits: parsed.commits.unwrap_or(0),
        changed_files: parsed.changed_files.unwrap_or(0),
        header,
    })
}

pub fn normalize_issue(raw: &Value) -> SyncResult<Issue> {
    let number = external_number(raw)?;
    let parsed: RawIssue = serde_json::from_value(raw.clone())
        .map_err(|e| SyncError::invalid(format!("Issue #{number}: {e}")))?;

    let state = parsed.common.state.clone().unwrap_or_default();
    let header = build_header(number, "Issue", parsed.common, issue_status(&state))?;

    let assignees = parsed
        .assignees
        .unwrap_or_default()
        .into_iter()
        .filter_map(|u| u.login)
        .filter(|login| !login.trim().is_empty())
        .collect();
    let milestone = parsed
        .milestone
        .and_then(|m| m.title)
        .filter(|t| !t.trim().is_empty());

    Ok(Issue {
        header,
        assignees,
        comments: parsed.comments.unwrap_or(0),
        milestone,
    })
}

/// The sync key: must be present and a positive integer.
fn external_number(raw: &Value) -> SyncResult<i64> {
    if !raw.is_object() {
        return Err(SyncError::invalid("payload is not a JSON object"));
    }
    match raw.get("number") {
        None | Some(Value::Null) => Err(SyncError::invalid("missing external number")),
        Some(value) => value
            .as_i64()
            .filter(|n| *n > 0)
            .ok_or_else(|| SyncError::invalid(format!("number {value} is not a positive integer"))),
    }
}

fn build_header(
    number: i64,
    label: &str,
    raw: RawCommon,
    status: crate::model::RecordStatus,
) -> SyncResult<RecordHeader> {
    let author = raw
        .user
        .and_then(|u| u.login)
        .filter(|login| !login.trim().is_empty())
        .ok_or_else(|| SyncError::invalid(format!("{label} #{number}: missing user.login")))?;
    let title = raw
        .title
        .ok_or_else(|| SyncError::invalid(format!("{label} #{number}: missing title")))?;
    let created_at = raw
        .created_at
        .as_deref()
        .ok_or_else(|| SyncError::invalid(format!("{label} #{number}: missing created_at")))
        .and_then(|s| parse_timestamp(s, number, "created_at"))?;
    let labels: BTreeSet<String> = raw
        .labels
        .unwrap_or_default()
        .into_iter()
        .map(RawLabel::into_name)
        .filter(|name| !name.trim().is_empty())
        .collect();

    Ok(RecordHeader {
        number,
        title,
        body: raw.body.unwrap_or_default(),
        author,
        status,
        url: raw.html_url.filter(|u| !u.trim().is_empty()),
        created_at,
        closed_at: optional_timestamp(raw.closed_at.as_deref(), number, "closed_at")?,
        labels,
    })
}

fn required_ref(raw: Option<RawRef>, number: i64, field: &str) -> SyncResult<String> {
    raw.and_then(|r| r.git_ref)
        .ok_or_else(|| SyncError::invalid(format!("PR #{number}: missing {field}.ref")))
}

fn parse_timestamp(s: &str, number: i64, field: &str) -> SyncResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SyncError::invalid(format!("#{number}: bad {field} '{s}': {e}")))
}

fn optional_timestamp(
    s: Option<&str>,
    number: i64,
    field: &str,
) -> SyncResult<Option<DateTime<Utc>>> {
    match s.filter(|s| !s.is_empty()) {
        Some(s) => parse_timestamp(s, number, field).map(Some),
        None => Ok(None),
    }
}
