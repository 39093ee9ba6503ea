//! Record synchronization engine.
//!
//! One call handles one record: resolve an existing Notion page by external
//! number, create or update it, then persist the record and the page id into
//! the local cache. When any remote step fails the record is still cached with
//! a null page id before the remote error is returned.
//!
//! Concurrent calls for the same number are not serialized here; two racing
//! first syncs can both create a page. Callers run one invocation per record.
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::config::Databases;
use crate::db::RecordCache;
use crate::error::SyncResult;
use crate::mapping::{build_content_blocks, build_properties};
use crate::model::{DomainRecord, RecordKind};
use crate::normalize::normalize;
use crate::notion::NotionService;

/// Which branch of the upsert ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub kind: RecordKind,
    pub number: i64,
    pub action: UpsertAction,
    pub page_id: String,
    pub cache_row_id: i64,
}

pub struct SyncEngine<'a> {
    notion: &'a dyn NotionService,
    cache: &'a dyn RecordCache,
    databases: &'a Databases,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        notion: &'a dyn NotionService,
        cache: &'a dyn RecordCache,
        databases: &'a Databases,
    ) -> Self {
        Self {
            notion,
            cache,
            databases,
        }
    }

    /// Normalize a raw payload and sync it. Invalid payloads are rejected
    /// before any remote or cache access.
    pub async fn sync_payload(&self, kind: RecordKind, raw: &Value) -> SyncResult<SyncOutcome> {
        let record = normalize(kind, raw)?;
        self.sync(&record).await
    }

    #[instrument(skip_all, fields(kind = %record.kind(), number = record.number()))]
    pub async fn sync(&self, record: &DomainRecord) -> SyncResult<SyncOutcome> {
        let (action, page_id) = match self.push_remote(record).await {
            Ok(pushed) => pushed,
            Err(err) => {
                warn!(%err, "notion sync failed; caching record as unsynced");
                match self.cache.upsert(record, None).await {
                    Ok(_) => info!("record cached without notion page"),
                    Err(cache_err) => {
                        error!(%cache_err, "failed to cache record after notion failure")
                    }
                }
                return Err(err);
            }
        };

        // The page exists remotely at this point; a cache failure is still fatal.
        let cache_row_id = self.cache.upsert(record, Some(&page_id)).await?;
        info!(?action, page_id = %page_id, "record synced");

        Ok(SyncOutcome {
            kind: record.kind(),
            number: record.number(),
            action,
            page_id,
            cache_row_id,
        })
    }

    /// Resolve, map and upsert against Notion.
    async fn push_remote(&self, record: &DomainRecord) -> SyncResult<(UpsertAction, String)> {
        let database = self.databases.for_kind(record.kind());
        let existing = self.resolve_existing(record).await?;
        let properties = build_properties(record.mapping(), &database.fields);

        match existing {
            Some(page_id) => {
                self.notion.update_page(&page_id, properties).await?;
                Ok((UpsertAction::Updated, page_id))
            }
            None => {
                let children = build_content_blocks(record.mapping());
                let page_id = self
                    .notion
                    .create_page(&database.id, properties, children)
                    .await?;
                Ok((UpsertAction::Created, page_id))
            }
        }
    }

    /// First page carrying this record's number, if any. Extra matches are
    /// logged and left untouched.
    pub async fn resolve_existing(&self, record: &DomainRecord) -> SyncResult<Option<String>> {
        let database = self.databases.for_kind(record.kind());
        let pages = self
            .notion
            .find_pages_by_number(&database.id, &database.fields.number, record.number())
            .await?;
        if pages.len() > 1 {
            warn!(
                matches = pages.len(),
                chosen = %pages[0],
                "multiple notion pages share this number; using the first"
            );
        }
        Ok(pages.into_iter().next())
    }
}
