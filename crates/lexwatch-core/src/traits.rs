use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::AppError;
use crate::models::{CheckResult, TrackedDocument};

/// Remote access to tracked documents.
///
/// Each call carries its own deadline. Implementations report any network,
/// timeout or status failure as a transport error (see [`AppError::is_transport`]).
pub trait DocumentFetcher: Send + Sync + Clone {
    /// Metadata-only request returning the current content length.
    /// Must not transfer the body.
    fn head(&self, url: &str, timeout: Duration)
    -> impl Future<Output = Result<u64, AppError>> + Send;

    /// At most `max_bytes` from the start of the body.
    fn fetch_prefix(
        &self,
        url: &str,
        max_bytes: usize,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<u8>, AppError>> + Send;

    /// The complete body.
    fn fetch_full(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<u8>, AppError>> + Send;
}

/// Source of truth for the tracked set and its cached metadata.
pub trait DocumentStore: Send + Sync + Clone {
    /// Snapshot of every document to check.
    fn fetch_tracked_documents(
        &self,
    ) -> impl Future<Output = Result<Vec<TrackedDocument>, AppError>> + Send;

    /// Write back the cache value of a document that completed a full stage.
    fn persist_check_result(
        &self,
        result: &CheckResult,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// A store over a fixed, in-memory document list that discards writes.
///
/// Used for ad-hoc checks where nothing should be persisted.
#[derive(Debug, Clone, Default)]
pub struct StaticStore {
    documents: Arc<Vec<TrackedDocument>>,
}

impl StaticStore {
    pub fn new(documents: Vec<TrackedDocument>) -> Self {
        Self {
            documents: Arc::new(documents),
        }
    }
}

impl DocumentStore for StaticStore {
    async fn fetch_tracked_documents(&self) -> Result<Vec<TrackedDocument>, AppError> {
        Ok(self.documents.as_ref().clone())
    }

    async fn persist_check_result(&self, _result: &CheckResult) -> Result<(), AppError> {
        Ok(())
    }
}
