//! Size-tolerance heuristic and change classification.
//!
//! Every stage builds its [`ChangeDecision`] through [`ChangeClassifier`], so
//! the tolerance and the reason vocabulary live in one place.

use crate::error::AppError;
use crate::models::{ChangeDecision, ChangeReason, TrackedDocument};

/// Byte delta treated as noise rather than a real change.
pub const DEFAULT_TOLERANCE: u64 = 100;

/// Verdict of comparing the current content length with the cached one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeVerdict {
    /// No cached length: there is no baseline, verification is mandatory.
    MustVerify,
    /// Delta within tolerance (inclusive).
    Unchanged { delta: u64 },
    /// Delta above tolerance: escalate to a date check.
    Ambiguous { delta: u64 },
}

impl SizeVerdict {
    pub fn should_verify(&self) -> bool {
        !matches!(self, SizeVerdict::Unchanged { .. })
    }
}

/// Compare two content lengths against `tolerance`.
pub fn classify_size(current: u64, cached: Option<u64>, tolerance: u64) -> SizeVerdict {
    let Some(cached) = cached else {
        return SizeVerdict::MustVerify;
    };
    let delta = current.abs_diff(cached);
    if delta <= tolerance {
        SizeVerdict::Unchanged { delta }
    } else {
        SizeVerdict::Ambiguous { delta }
    }
}

/// Builds decisions with a fixed tolerance.
#[derive(Debug, Clone, Copy)]
pub struct ChangeClassifier {
    tolerance: u64,
}

impl Default for ChangeClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl ChangeClassifier {
    pub fn new(tolerance: u64) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> u64 {
        self.tolerance
    }

    pub fn classify_size(&self, current: u64, cached: Option<u64>) -> SizeVerdict {
        classify_size(current, cached, self.tolerance)
    }

    /// Head resolved the document: the size moved by at most the tolerance.
    pub fn size_unchanged(&self, doc: &TrackedDocument, current: u64) -> ChangeDecision {
        ChangeDecision {
            should_verify: false,
            is_changed: false,
            reason: ChangeReason::SizeUnchanged,
            new_size: Some(current),
            new_date: doc.cached_last_update_date.clone(),
            ..base(doc)
        }
    }

    /// A date was extracted after the size moved: the marker decides.
    pub fn classify_date(
        &self,
        doc: &TrackedDocument,
        new_date: &str,
        new_size: Option<u64>,
    ) -> ChangeDecision {
        let is_changed = doc.cached_last_update_date.as_deref() != Some(new_date);
        let reason = if is_changed {
            ChangeReason::DateChanged
        } else {
            ChangeReason::SizeChangedButDateSame
        };
        ChangeDecision {
            should_verify: true,
            is_changed,
            reason,
            new_size,
            new_date: Some(new_date.to_string()),
            ..base(doc)
        }
    }

    /// No baseline existed; the full fetch establishes one.
    pub fn first_check(
        &self,
        doc: &TrackedDocument,
        new_date: Option<&str>,
        new_size: u64,
    ) -> ChangeDecision {
        ChangeDecision {
            should_verify: true,
            is_changed: false,
            reason: ChangeReason::FirstCheck,
            new_size: Some(new_size),
            new_date: new_date.map(str::to_string),
            ..base(doc)
        }
    }

    /// A full fetch found no date marker. Never reported as a change.
    pub fn inconclusive(&self, doc: &TrackedDocument, new_size: u64) -> ChangeDecision {
        ChangeDecision {
            should_verify: true,
            is_changed: false,
            reason: ChangeReason::Inconclusive,
            new_size: Some(new_size),
            new_date: None,
            ..base(doc)
        }
    }

    /// Check the decision invariants before a decision leaves the pipeline.
    pub fn ensure_consistent(decision: &ChangeDecision) -> Result<(), AppError> {
        let detail = if decision.is_changed && !decision.should_verify {
            "changed without verification"
        } else if decision.is_changed && decision.reason == ChangeReason::SizeUnchanged {
            "size_unchanged reported as a change"
        } else {
            return Ok(());
        };
        Err(AppError::ClassificationInconsistency {
            document_id: decision.document_id.clone(),
            detail: detail.to_string(),
        })
    }
}

fn base(doc: &TrackedDocument) -> ChangeDecision {
    ChangeDecision {
        document_id: doc.id.clone(),
        url: doc.url.clone(),
        should_verify: true,
        is_changed: false,
        reason: ChangeReason::Inconclusive,
        old_size: doc.cached_content_length,
        new_size: None,
        old_date: doc.cached_last_update_date.clone(),
        new_date: None,
    }
}
