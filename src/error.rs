//! Error taxonomy for a single record synchronization.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Inbound payload is malformed or misses a required field. Nothing is cached.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    /// Notion could not be reached, refused our credentials or asked us to back off.
    #[error("notion unavailable: {0}")]
    RemoteUnavailable(String),
    /// Notion was reachable but rejected the query, create or update.
    #[error("notion write failed: {0}")]
    RemoteWriteFailed(String),
    #[error("local cache write failed: {0}")]
    LocalCacheWriteFailed(String),
}

impl SyncError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        SyncError::InvalidRecord(msg.into())
    }

    /// True for the errors that go through the recovery branch.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            SyncError::RemoteUnavailable(_) | SyncError::RemoteWriteFailed(_)
        )
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
