use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use gh_notion_sync::config;
use gh_notion_sync::db::{self, CachedRecord, RecordCache, SqliteCache};
use gh_notion_sync::model::RecordKind;
use gh_notion_sync::stats;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Show cache statistics and every cached PR and Issue")]
struct Args {
    /// Path to YAML config file; `DATABASE_URL` or `KB_DATA_DIR` are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only print the statistics block
    #[arg(long)]
    stats_only: bool,

    #[arg(long, value_enum, default_value = "text")]
    format: Format,
}

fn print_record(record: &CachedRecord) {
    match record {
        CachedRecord::PullRequest(pr) => {
            println!("#{} - {}", pr.pr_number, pr.title);
            println!("  Status: {} | Author: {}", pr.status, pr.author);
            println!("  Branch: {} → {}", pr.branch_from, pr.branch_to);
            println!("  Created: {}", pr.created_at);
            if let Some(url) = &pr.url {
                println!("  URL: {url}");
            }
        }
        CachedRecord::Issue(issue) => {
            println!("#{} - {}", issue.issue_number, issue.title);
            println!("  Status: {} | Author: {}", issue.status, issue.author);
            println!("  Created: {}", issue.created_at);
            println!("  Comments: {}", issue.comments_count);
            if let Some(url) = &issue.url {
                println!("  URL: {url}");
            }
        }
    }
    match record.notion_page_id() {
        Some(page_id) => println!("  ✓ Synced to Notion (page {page_id})"),
        None => println!("  ✗ Not synced to Notion"),
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    // Reading the cache needs no Notion credentials, so skip full config validation
    // unless a file was given explicitly.
    let database_url = match (std::env::var("DATABASE_URL"), &args.config) {
        (Ok(url), _) => url,
        (Err(_), Some(path)) => config::load(Some(path))?.database_url(),
        (Err(_), None) => {
            config::cache_url(&std::env::var("KB_DATA_DIR").unwrap_or_else(|_| ".".into()))
        }
    };
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;
    let cache = SqliteCache::new(pool.clone());

    let summary = stats::collect(&cache).await?;
    let mut records = Vec::new();
    if !args.stats_only {
        for kind in [RecordKind::PullRequest, RecordKind::Issue] {
            records.push((kind, cache.list_all(kind).await?));
        }
    }
    pool.close().await;

    match args.format {
        Format::Json => {
            let listed: Vec<&CachedRecord> = records.iter().flat_map(|(_, r)| r).collect();
            let out = serde_json::json!({ "stats": summary, "records": listed });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Text => {
            println!("=== Knowledge base statistics ===");
            print!("{summary}");
            for (kind, rows) in &records {
                println!("\n=== {} ===\n", kind.label());
                if rows.is_empty() {
                    println!("No {} cached yet.", kind.label());
                }
                rows.iter().for_each(print_record);
            }
        }
    }
    Ok(())
}
