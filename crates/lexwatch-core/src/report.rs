use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::ChangeDecision;
use crate::pipeline::DocumentState;
use crate::stage::Stage;
use crate::stats::{RunStats, format_bytes};

/// Final output of a change-check run.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub run_id: Uuid,
    /// Whether the orchestrator completed, not whether every document did.
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stats: RunStats,
    /// Decisions with `is_changed == true`, ordered by document id.
    pub changes: Vec<ChangeDecision>,
}

impl CheckReport {
    /// A run that could not start (store unreachable, invalid config).
    pub fn aborted(run_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            success: false,
            started_at,
            finished_at: Utc::now(),
            stats: RunStats::default(),
            changes: Vec::new(),
        }
    }
}

/// Events emitted by the orchestrator and the document pipeline.
#[derive(Debug, Clone)]
pub enum CheckEvent<'a> {
    RunStarted {
        run_id: Uuid,
        total: u64,
        workers: usize,
    },
    RunAborted {
        run_id: Uuid,
        error: &'a str,
    },
    Transition {
        document_id: &'a str,
        state: DocumentState,
    },
    Escalated {
        document_id: &'a str,
        from: Stage,
        to: Stage,
        cause: &'a str,
    },
    Resolved {
        decision: &'a ChangeDecision,
        stage: Stage,
    },
    DocumentFailed {
        document_id: &'a str,
        stage: Stage,
        error: &'a str,
    },
    PersistFailed {
        document_id: &'a str,
        error: &'a str,
    },
    /// A document that never produced an outcome (cancelled or lost worker).
    DocumentSkipped {
        document_id: &'a str,
    },
    RunFinished {
        run_id: Uuid,
        stats: &'a RunStats,
        elapsed: Duration,
    },
}

/// Receives check events (decoupled logging).
pub trait CheckReporter: Send + Sync {
    fn report(&self, event: CheckEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCheckReporter;

impl CheckReporter for TracingCheckReporter {
    fn report(&self, event: CheckEvent<'_>) {
        match event {
            CheckEvent::RunStarted {
                run_id,
                total,
                workers,
            } => {
                tracing::info!(%run_id, %total, %workers, "Change check started");
            }
            CheckEvent::RunAborted { run_id, error } => {
                tracing::error!(%run_id, %error, "Change check aborted");
            }
            CheckEvent::Transition { document_id, state } => {
                tracing::trace!(%document_id, %state, "Document state");
            }
            CheckEvent::Escalated {
                document_id,
                from,
                to,
                cause,
            } => {
                tracing::debug!(%document_id, %from, %to, %cause, "Escalating");
            }
            CheckEvent::Resolved { decision, stage } => {
                if decision.is_changed {
                    tracing::info!(
                        document_id = %decision.document_id,
                        %stage,
                        old_date = ?decision.old_date,
                        new_date = ?decision.new_date,
                        "Document CHANGED"
                    );
                } else if decision.new_date.is_none() {
                    tracing::warn!(
                        document_id = %decision.document_id,
                        %stage,
                        reason = %decision.reason,
                        "No date marker in full body"
                    );
                } else {
                    tracing::debug!(
                        document_id = %decision.document_id,
                        %stage,
                        reason = %decision.reason,
                        "Document resolved"
                    );
                }
            }
            CheckEvent::DocumentFailed {
                document_id,
                stage,
                error,
            } => {
                tracing::warn!(%document_id, %stage, %error, "Document check failed");
            }
            CheckEvent::PersistFailed { document_id, error } => {
                tracing::error!(%document_id, %error, "Failed to persist check result");
            }
            CheckEvent::DocumentSkipped { document_id } => {
                tracing::warn!(%document_id, "Document not checked");
            }
            CheckEvent::RunFinished {
                run_id,
                stats,
                elapsed,
            } => {
                tracing::info!(
                    %run_id,
                    checked = stats.checked,
                    head_unchanged = stats.head_unchanged,
                    partial = stats.partial,
                    full_download = stats.full_download,
                    changes = stats.changes_detected,
                    errors = stats.errors,
                    downloaded = %format_bytes(stats.total_bytes),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Change check finished"
                );
            }
        }
    }
}
