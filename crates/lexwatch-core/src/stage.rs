//! The three verification stages, cheapest first.
//!
//! Head and Partial either resolve the document or hand the next stage what
//! it needs through [`StageOutcome::Escalate`]. Full always resolves or fails.

use std::fmt;

use crate::classify::{ChangeClassifier, SizeVerdict};
use crate::config::CheckConfig;
use crate::date_marker::extract_date_from_bytes;
use crate::error::AppError;
use crate::models::{
    ChangeDecision, CheckResult, DateCheckOutcome, FullCheckOutcome, SizeCheckOutcome,
    TrackedDocument,
};
use crate::stats::StageTally;
use crate::traits::DocumentFetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Head,
    Partial,
    Full,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Head => "head",
            Stage::Partial => "partial",
            Stage::Full => "full",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a stage that may defer to the next one.
#[derive(Debug)]
pub enum StageOutcome<C> {
    Resolved(Resolution),
    Escalate(C),
}

/// Data the head stage carries into the partial stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadEscalation {
    /// `None` when the metadata request itself failed.
    pub current_content_length: Option<u64>,
}

/// Why the partial stage deferred to a full download.
#[derive(Debug)]
pub enum PartialEscalation {
    NoMarker,
    Failed(AppError),
}

/// A decision plus the cache value to write back, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub decision: ChangeDecision,
    pub cache_update: Option<CheckResult>,
    /// The decision stands but the document still counts as an error
    /// (no date marker even in the full body).
    pub counts_as_error: bool,
}

impl Resolution {
    fn settled(decision: ChangeDecision) -> Self {
        Self {
            decision,
            cache_update: None,
            counts_as_error: false,
        }
    }
}

/// Runs the stages of one document against a fetcher.
pub struct StageRunner<'a, F> {
    fetcher: &'a F,
    config: &'a CheckConfig,
    classifier: ChangeClassifier,
}

impl<'a, F: DocumentFetcher> StageRunner<'a, F> {
    pub fn new(fetcher: &'a F, config: &'a CheckConfig) -> Self {
        Self {
            fetcher,
            config,
            classifier: ChangeClassifier::new(config.tolerance),
        }
    }

    pub fn classifier(&self) -> &ChangeClassifier {
        &self.classifier
    }

    /// Compare the current content length with the cached one.
    ///
    /// A failed metadata request escalates without a size.
    pub async fn head(
        &self,
        doc: &TrackedDocument,
        tally: &mut StageTally,
    ) -> StageOutcome<HeadEscalation> {
        let outcome = match self.fetcher.head(&doc.url, self.config.head_timeout).await {
            Ok(current_content_length) => SizeCheckOutcome {
                current_content_length,
            },
            Err(e) => {
                tracing::warn!(document_id = %doc.id, error = %e, "HEAD failed, escalating");
                return StageOutcome::Escalate(HeadEscalation {
                    current_content_length: None,
                });
            }
        };

        let current = outcome.current_content_length;
        match self.classifier.classify_size(current, doc.cached_content_length) {
            SizeVerdict::Unchanged { delta } => {
                tally.head_unchanged = true;
                tally.cached_offset = delta > 0;
                StageOutcome::Resolved(Resolution::settled(
                    self.classifier.size_unchanged(doc, current),
                ))
            }
            SizeVerdict::Ambiguous { .. } | SizeVerdict::MustVerify => {
                tally.size_change_detected = true;
                StageOutcome::Escalate(HeadEscalation {
                    current_content_length: Some(current),
                })
            }
        }
    }

    /// Look for the date marker in a bounded prefix of the body.
    pub async fn partial(
        &self,
        doc: &TrackedDocument,
        carried: HeadEscalation,
        tally: &mut StageTally,
    ) -> StageOutcome<PartialEscalation> {
        let prefix = match self
            .fetcher
            .fetch_prefix(&doc.url, self.config.partial_bytes, self.config.partial_timeout)
            .await
        {
            Ok(prefix) => prefix,
            Err(e) => return StageOutcome::Escalate(PartialEscalation::Failed(e)),
        };
        tally.bytes += prefix.len() as u64;

        let outcome = DateCheckOutcome {
            extracted_date: extract_date_from_bytes(&prefix),
        };
        match outcome.extracted_date {
            Some(date) => {
                tally.partial = true;
                StageOutcome::Resolved(Resolution::settled(self.classifier.classify_date(
                    doc,
                    &date,
                    carried.current_content_length,
                )))
            }
            None => StageOutcome::Escalate(PartialEscalation::NoMarker),
        }
    }

    /// Download the whole body: the last word on the date and the
    /// authoritative size. Transport failures are returned to the caller.
    pub async fn full(
        &self,
        doc: &TrackedDocument,
        tally: &mut StageTally,
    ) -> Result<Resolution, AppError> {
        let raw_body = self
            .fetcher
            .fetch_full(&doc.url, self.config.full_timeout)
            .await?;
        let outcome = FullCheckOutcome {
            extracted_date: extract_date_from_bytes(&raw_body),
            authoritative_content_length: raw_body.len() as u64,
            raw_body,
        };
        tally.bytes += outcome.authoritative_content_length;

        let size = outcome.authoritative_content_length;
        let cache_update = outcome.extracted_date.as_ref().map(|date| CheckResult {
            document_id: doc.id.clone(),
            content_length: size,
            last_update_date: date.clone(),
        });
        tally.full_download = cache_update.is_some();

        let resolution = if doc.needs_baseline() {
            Resolution {
                decision: self
                    .classifier
                    .first_check(doc, outcome.extracted_date.as_deref(), size),
                counts_as_error: cache_update.is_none(),
                cache_update,
            }
        } else {
            match outcome.extracted_date.as_deref() {
                Some(date) => Resolution {
                    decision: self.classifier.classify_date(doc, date, Some(size)),
                    cache_update,
                    counts_as_error: false,
                },
                None => Resolution {
                    decision: self.classifier.inconclusive(doc, size),
                    cache_update: None,
                    counts_as_error: true,
                },
            }
        };
        Ok(resolution)
    }
}
