use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A remote consolidated text whose size and "last updated" marker are cached
/// locally for change detection.
///
/// Read-only to the engine for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedDocument {
    /// Stable identifier (e.g. "BOE-A-1978-31229").
    pub id: String,
    pub url: String,
    /// Content length seen on the last successful full check.
    pub cached_content_length: Option<u64>,
    /// "Last updated" date (`DD/MM/YYYY`) seen on the last successful full check.
    pub cached_last_update_date: Option<String>,
}

impl TrackedDocument {
    /// A document that has never been checked.
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            cached_content_length: None,
            cached_last_update_date: None,
        }
    }

    pub fn with_cache(mut self, content_length: u64, last_update_date: impl Into<String>) -> Self {
        self.cached_content_length = Some(content_length);
        self.cached_last_update_date = Some(last_update_date.into());
        self
    }

    /// True when there is no complete baseline to compare against: either the
    /// document was never checked or a previous run left half a cache entry.
    pub fn needs_baseline(&self) -> bool {
        self.cached_content_length.is_none() || self.cached_last_update_date.is_none()
    }
}

/// Result of the HEAD stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeCheckOutcome {
    pub current_content_length: u64,
}

/// Result of a date extraction over a partial or full body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateCheckOutcome {
    pub extracted_date: Option<String>,
}

/// Result of the full-download stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullCheckOutcome {
    pub extracted_date: Option<String>,
    pub authoritative_content_length: u64,
    pub raw_body: Vec<u8>,
}

/// Why a document was (or was not) classified as changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    SizeUnchanged,
    DateChanged,
    SizeChangedButDateSame,
    FirstCheck,
    Inconclusive,
}

impl ChangeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeReason::SizeUnchanged => "size_unchanged",
            ChangeReason::DateChanged => "date_changed",
            ChangeReason::SizeChangedButDateSame => "size_changed_but_date_same",
            ChangeReason::FirstCheck => "first_check",
            ChangeReason::Inconclusive => "inconclusive",
        }
    }
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-document output of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDecision {
    pub document_id: String,
    pub url: String,
    pub should_verify: bool,
    pub is_changed: bool,
    pub reason: ChangeReason,
    pub old_size: Option<u64>,
    pub new_size: Option<u64>,
    pub old_date: Option<String>,
    pub new_date: Option<String>,
}

/// Cache value written back after a completed full stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub document_id: String,
    pub content_length: u64,
    pub last_update_date: String,
}

/// A tracked document as stored, including bookkeeping columns.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub document: TrackedDocument,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
