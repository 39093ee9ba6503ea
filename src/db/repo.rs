use super::model::{CachedRecord, IssueRow, KindStats, PullRequestRow};
use crate::model::{format_timestamp, join_set, Issue, PullRequest, RecordKind};
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteRow, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    // Enable WAL and stricter durability.
    let options = SqliteConnectOptions::from_str(&normalized)
        .with_context(|| format!("invalid database url {normalized}"))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full);
    let pool = SqlitePool::connect_with(options)
        .await
        .context("failed to open local cache")?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);

    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };

    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const NOW_MILLIS: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

/// Insert or replace-on-conflict by `pr_number`. Identity, author, URL, branch
/// and creation columns are written once; the rest follows the latest attempt.
#[instrument(skip_all, fields(number = pr.header.number))]
pub async fn upsert_pull_request(
    pool: &Pool,
    pr: &PullRequest,
    notion_page_id: Option<&str>,
) -> Result<i64> {
    let h = &pr.header;
    let sql = format!(
        "INSERT INTO pull_requests (\
            pr_number, title, description, author, status, url, created_at, merged_at, \
            closed_at, labels, branch_from, branch_to, commits, changed_files, \
            synced_to_notion, notion_page_id, last_updated\
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, {now}) \
         ON CONFLICT(pr_number) DO UPDATE SET \
            title = excluded.title, \
            description = excluded.description, \
            status = excluded.status, \
            merged_at = excluded.merged_at, \
            closed_at = excluded.closed_at, \
            labels = excluded.labels, \
            synced_to_notion = excluded.synced_to_notion, \
            notion_page_id = excluded.notion_page_id, \
            last_updated = {now} \
         RETURNING id",
        now = NOW_MILLIS
    );
    let id: i64 = sqlx::query_scalar(&sql)
        .bind(h.number)
        .bind(&h.title)
        .bind(&h.body)
        .bind(&h.author)
        .bind(h.status.as_str())
        .bind(h.url.as_deref())
        .bind(format_timestamp(&h.created_at))
        .bind(pr.merged_at.as_ref().map(format_timestamp))
        .bind(h.closed_at.as_ref().map(format_timestamp))
        .bind(join_set(&h.labels))
        .bind(&pr.head_ref)
        .bind(&pr.base_ref)
        .bind(pr.commits)
        .bind(pr.changed_files)
        .bind(notion_page_id.is_some())
        .bind(notion_page_id)
        .fetch_one(pool)
        .await
        .with_context(|| format!("failed to persist PR #{}", h.number))?;
    Ok(id)
}

/// Insert or replace-on-conflict by `issue_number`.
#[instrument(skip_all, fields(number = issue.header.number))]
pub async fn upsert_issue(pool: &Pool, issue: &Issue, notion_page_id: Option<&str>) -> Result<i64> {
    let h = &issue.header;
    let sql = format!(
        "INSERT INTO issues (\
            issue_number, title, description, author, status, url, created_at, closed_at, \
            labels, assignees, comments_count, milestone, synced_to_notion, notion_page_id, \
            last_updated\
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, {now}) \
         ON CONFLICT(issue_number) DO UPDATE SET \
            title = excluded.title, \
            description = excluded.description, \
            status = excluded.status, \
            closed_at = excluded.closed_at, \
            labels = excluded.labels, \
            assignees = excluded.assignees, \
            comments_count = excluded.comments_count, \
            synced_to_notion = excluded.synced_to_notion, \
            notion_page_id = excluded.notion_page_id, \
            last_updated = {now} \
         RETURNING id",
        now = NOW_MILLIS
    );
    let id: i64 = sqlx::query_scalar(&sql)
        .bind(h.number)
        .bind(&h.title)
        .bind(&h.body)
        .bind(&h.author)
        .bind(h.status.as_str())
        .bind(h.url.as_deref())
        .bind(format_timestamp(&h.created_at))
        .bind(h.closed_at.as_ref().map(format_timestamp))
        .bind(join_set(&h.labels))
        .bind(join_set(&issue.assignees))
        .bind(issue.comments)
        .bind(issue.milestone.as_deref())
        .bind(notion_page_id.is_some())
        .bind(notion_page_id)
        .fetch_one(pool)
        .await
        .with_context(|| format!("failed to persist Issue #{}", h.number))?;
    Ok(id)
}

fn pull_request_from_row(row: &SqliteRow) -> PullRequestRow {
    PullRequestRow {
        id: row.get("id"),
        pr_number: row.get("pr_number"),
        title: row.get("title"),
        description: row.get("description"),
        author: row.get("author"),
        status: row.get("status"),
        url: row.get("url"),
        created_at: row.get("created_at"),
        merged_at: row.get("merged_at"),
        closed_at: row.get("closed_at"),
        labels: row.get("labels"),
        branch_from: row.get("branch_from"),
        branch_to: row.get("branch_to"),
        commits: row.get("commits"),
        changed_files: row.get("changed_files"),
        synced_to_notion: row.get("synced_to_notion"),
        notion_page_id: row.get("notion_page_id"),
        last_updated: row.get("last_updated"),
    }
}

fn issue_from_row(row: &SqliteRow) -> IssueRow {
    IssueRow {
        id: row.get("id"),
        issue_number: row.get("issue_number"),
        title: row.get("title"),
        description: row.get("description"),
        author: row.get("author"),
        status: row.get("status"),
        url: row.get("url"),
        created_at: row.get("created_at"),
        closed_at: row.get("closed_at"),
        labels: row.get("labels"),
        assignees: row.get("assignees"),
        comments_count: row.get("comments_count"),
        milestone: row.get("milestone"),
        synced_to_notion: row.get("synced_to_notion"),
        notion_page_id: row.get("notion_page_id"),
        last_updated: row.get("last_updated"),
    }
}

#[instrument(skip_all)]
pub async fn list_pull_requests(pool: &Pool) -> Result<Vec<PullRequestRow>> {
    let rows = sqlx::query("SELECT * FROM pull_requests ORDER BY created_at DESC, id DESC")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(pull_request_from_row).collect())
}

#[instrument(skip_all)]
pub async fn list_issues(pool: &Pool) -> Result<Vec<IssueRow>> {
    let rows = sqlx::query("SELECT * FROM issues ORDER BY created_at DESC, id DESC")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(issue_from_row).collect())
}

pub async fn list_records(pool: &Pool, kind: RecordKind) -> Result<Vec<CachedRecord>> {
    Ok(match kind {
        RecordKind::PullRequest => list_pull_requests(pool)
            .await?
            .into_iter()
            .map(CachedRecord::PullRequest)
            .collect(),
        RecordKind::Issue => list_issues(pool)
            .await?
            .into_iter()
            .map(CachedRecord::Issue)
            .collect(),
    })
}

pub async fn fetch_pull_request(pool: &Pool, number: i64) -> Result<Option<PullRequestRow>> {
    let row = sqlx::query("SELECT * FROM pull_requests WHERE pr_number = ?")
        .bind(number)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(pull_request_from_row))
}

pub async fn fetch_issue(pool: &Pool, number: i64) -> Result<Option<IssueRow>> {
    let row = sqlx::query("SELECT * FROM issues WHERE issue_number = ?")
        .bind(number)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(issue_from_row))
}

#[instrument(skip_all, fields(%kind))]
pub async fn kind_stats(pool: &Pool, kind: RecordKind) -> Result<KindStats> {
    let sql = match kind {
        RecordKind::PullRequest => {
            "SELECT COUNT(*) AS total, COUNT(notion_page_id) AS synced FROM pull_requests"
        }
        RecordKind::Issue => {
            "SELECT COUNT(*) AS total, COUNT(notion_page_id) AS synced FROM issues"
        }
    };
    let row = sqlx::query(sql).fetch_one(pool).await?;
    Ok(KindStats {
        total: row.get("total"),
        synced: row.get("synced"),
    })
}
