use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use gh_notion_sync::config::{self, Config};
use gh_notion_sync::db::{self, SqliteCache};
use gh_notion_sync::model::RecordKind;
use gh_notion_sync::notion::NotionClient;
use gh_notion_sync::sync::SyncEngine;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Mirror one GitHub pull request or issue into Notion and the local cache"
)]
struct Args {
    /// Path to YAML config file; configuration comes from the environment when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sync a pull request payload
    Pr(PayloadArgs),
    /// Sync an issue payload
    Issue(PayloadArgs),
}

#[derive(Debug, clap::Args)]
struct PayloadArgs {
    /// JSON payload file; defaults to the PR_DATA / ISSUE_DATA environment variable
    #[arg(long)]
    payload: Option<PathBuf>,
}

fn read_payload(kind: RecordKind, path: Option<&Path>) -> Result<Value> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read payload {}", path.display()))?,
        None => std::env::var(kind.payload_env()).unwrap_or_else(|_| "{}".to_string()),
    };
    serde_json::from_str(&raw).with_context(|| format!("{} payload is not valid JSON", kind.label()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = match &args.config {
        Some(path) => config::load(Some(path))?,
        None => Config::from_env()?,
    };
    cfg.ensure_dirs()?;

    let (kind, payload) = match &args.command {
        Command::Pr(p) => (RecordKind::PullRequest, p.payload.as_deref()),
        Command::Issue(p) => (RecordKind::Issue, p.payload.as_deref()),
    };
    cfg.require_database(kind)?;
    let raw = read_payload(kind, payload)?;

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.database_url());
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;
    let cache = SqliteCache::new(pool.clone());

    let notion = NotionClient::new(cfg.notion.token.clone(), cfg.notion.version.clone())?;
    let engine = SyncEngine::new(&notion, &cache, &cfg.notion.databases);

    let result = engine.sync_payload(kind, &raw).await;
    pool.close().await;

    match result {
        Ok(outcome) => {
            info!(
                number = outcome.number,
                action = ?outcome.action,
                page_id = %outcome.page_id,
                "{} synced to Notion",
                kind.label()
            );
            Ok(())
        }
        Err(err) => {
            if err.is_remote() {
                error!(
                    %err,
                    "{} sync to Notion failed; record cached as unsynced when possible",
                    kind.label()
                );
            } else {
                error!(%err, "{} sync failed", kind.label());
            }
            Err(err.into())
        }
    }
}
