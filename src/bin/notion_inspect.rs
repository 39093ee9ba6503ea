use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

use gh_notion_sync::config::{self, Config};
use gh_notion_sync::model::RecordKind;
use gh_notion_sync::notion::NotionClient;

#[derive(Parser, Debug)]
#[command(about = "Check that the configured Notion databases define every mapped property")]
struct Args {
    /// Path to YAML config; configuration comes from the environment when omitted
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = match &args.config {
        Some(path) => config::load(Some(path))?,
        None => Config::from_env()?,
    };
    let client = NotionClient::new(cfg.notion.token.clone(), cfg.notion.version.clone())?;

    let mut missing_total = 0;
    for kind in [RecordKind::PullRequest, RecordKind::Issue] {
        let Ok(database) = cfg.require_database(kind) else {
            println!("{}: no database configured, skipping", kind.label());
            continue;
        };
        let db = client.retrieve_database(&database.id).await?;
        println!("{} database {} ({})", kind.label(), db.id, db.plain_title());
        for (name, prop) in &db.properties {
            println!("  {} -> {{ id: {}, type: {} }}", name, prop.id, prop.typ);
        }
        let missing = db.missing_properties(&database.fields.names());
        for name in &missing {
            println!("  MISSING: {name}");
        }
        missing_total += missing.len();
    }

    if missing_total > 0 {
        bail!("{missing_total} configured properties are missing in Notion");
    }
    Ok(())
}
