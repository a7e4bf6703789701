use std::fmt;

use serde::{Deserialize, Serialize};

use crate::classify::ChangeClassifier;
use crate::models::{ChangeDecision, CheckResult, TrackedDocument};
use crate::report::{CheckEvent, CheckReporter};
use crate::stage::{PartialEscalation, Resolution, Stage, StageOutcome, StageRunner};
use crate::stats::StageTally;
use crate::traits::DocumentFetcher;

/// Where a document is in its pipeline.
///
/// `Pending → Checking → {Unchanged | Escalated → Resolved} → Done`.
/// Every document reaches `Done`, failed or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentState {
    Pending,
    Checking,
    Unchanged,
    Escalated,
    Resolved,
    Done,
}

impl DocumentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentState::Pending => "pending",
            DocumentState::Checking => "checking",
            DocumentState::Unchanged => "unchanged",
            DocumentState::Escalated => "escalated",
            DocumentState::Resolved => "resolved",
            DocumentState::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentState::Done)
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a worker reports to the aggregator for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentOutcome {
    pub document_id: String,
    /// `None` when the pipeline failed before reaching a decision.
    pub decision: Option<ChangeDecision>,
    /// Cache value to persist; only set after a full stage found a date.
    pub cache_update: Option<CheckResult>,
    pub tally: StageTally,
    pub failed: bool,
}

impl DocumentOutcome {
    pub fn is_changed(&self) -> bool {
        self.decision.as_ref().is_some_and(|d| d.is_changed)
    }
}

/// Drive one document through Head → Partial → Full until a stage resolves.
///
/// Never returns an error: failures are folded into the outcome.
pub async fn check_document<F, R>(
    runner: &StageRunner<'_, F>,
    doc: &TrackedDocument,
    reporter: &R,
) -> DocumentOutcome
where
    F: DocumentFetcher,
    R: CheckReporter + ?Sized,
{
    let transition = |state| {
        reporter.report(CheckEvent::Transition {
            document_id: &doc.id,
            state,
        })
    };
    let mut tally = StageTally::default();
    transition(DocumentState::Checking);

    let staged = if doc.needs_baseline() {
        reporter.report(CheckEvent::Escalated {
            document_id: &doc.id,
            from: Stage::Head,
            to: Stage::Full,
            cause: "no cached baseline",
        });
        transition(DocumentState::Escalated);
        run_full(runner, doc, &mut tally, reporter).await
    } else {
        match runner.head(doc, &mut tally).await {
            StageOutcome::Resolved(resolution) => {
                transition(DocumentState::Unchanged);
                Some((Stage::Head, resolution))
            }
            StageOutcome::Escalate(carried) => {
                let cause = if carried.current_content_length.is_some() {
                    "size outside tolerance"
                } else {
                    "head request failed"
                };
                reporter.report(CheckEvent::Escalated {
                    document_id: &doc.id,
                    from: Stage::Head,
                    to: Stage::Partial,
                    cause,
                });
                transition(DocumentState::Escalated);

                match runner.partial(doc, carried, &mut tally).await {
                    StageOutcome::Resolved(resolution) => Some((Stage::Partial, resolution)),
                    StageOutcome::Escalate(why) => {
                        let cause = match &why {
                            PartialEscalation::NoMarker => "no marker in prefix".to_string(),
                            PartialEscalation::Failed(e) => format!("prefix fetch failed: {e}"),
                        };
                        reporter.report(CheckEvent::Escalated {
                            document_id: &doc.id,
                            from: Stage::Partial,
                            to: Stage::Full,
                            cause: &cause,
                        });
                        run_full(runner, doc, &mut tally, reporter).await
                    }
                }
            }
        }
    };

    let outcome = match staged {
        Some((stage, resolution)) => settle(doc, stage, resolution, tally, reporter),
        None => DocumentOutcome {
            document_id: doc.id.clone(),
            decision: None,
            cache_update: None,
            tally,
            failed: true,
        },
    };
    transition(DocumentState::Done);
    outcome
}

async fn run_full<F, R>(
    runner: &StageRunner<'_, F>,
    doc: &TrackedDocument,
    tally: &mut StageTally,
    reporter: &R,
) -> Option<(Stage, Resolution)>
where
    F: DocumentFetcher,
    R: CheckReporter + ?Sized,
{
    match runner.full(doc, tally).await {
        Ok(resolution) => Some((Stage::Full, resolution)),
        Err(e) => {
            let error = e.to_string();
            reporter.report(CheckEvent::DocumentFailed {
                document_id: &doc.id,
                stage: Stage::Full,
                error: &error,
            });
            None
        }
    }
}

fn settle<R>(
    doc: &TrackedDocument,
    stage: Stage,
    resolution: Resolution,
    tally: StageTally,
    reporter: &R,
) -> DocumentOutcome
where
    R: CheckReporter + ?Sized,
{
    if let Err(e) = ChangeClassifier::ensure_consistent(&resolution.decision) {
        let error = e.to_string();
        reporter.report(CheckEvent::DocumentFailed {
            document_id: &doc.id,
            stage,
            error: &error,
        });
        return DocumentOutcome {
            document_id: doc.id.clone(),
            decision: None,
            cache_update: None,
            tally,
            failed: true,
        };
    }

    if stage != Stage::Head {
        reporter.report(CheckEvent::Transition {
            document_id: &doc.id,
            state: DocumentState::Resolved,
        });
    }
    reporter.report(CheckEvent::Resolved {
        decision: &resolution.decision,
        stage,
    });

    DocumentOutcome {
        document_id: doc.id.clone(),
        decision: Some(resolution.decision),
        cache_update: resolution.cache_update,
        tally,
        failed: resolution.counts_as_error,
    }
}
