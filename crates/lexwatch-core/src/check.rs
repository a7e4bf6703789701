//! Batch orchestration of a change-check run.
//!
//! A fixed pool of workers pulls documents from a shared snapshot, each
//! worker pacing its own requests. Outcomes flow through a channel to a
//! single aggregation loop that owns the [`RunStats`], so no counter is ever
//! shared between tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::CheckConfig;
use crate::models::TrackedDocument;
use crate::pipeline::{DocumentOutcome, DocumentState, check_document};
use crate::report::{CheckEvent, CheckReport, CheckReporter, TracingCheckReporter};
use crate::stage::StageRunner;
use crate::stats::{RunStats, create_initial_stats};
use crate::throttle::{Pacing, ThrottledFetcher};
use crate::traits::{DocumentFetcher, DocumentStore};

/// Runs the staged change check over every tracked document.
///
/// Generic over the transport and the store so both can be swapped for
/// mocks in tests.
pub struct ChangeCheckService<F, S>
where
    F: DocumentFetcher,
    S: DocumentStore,
{
    fetcher: F,
    store: S,
    config: CheckConfig,
}

impl<F, S> ChangeCheckService<F, S>
where
    F: DocumentFetcher + 'static,
    S: DocumentStore + 'static,
{
    pub fn new(fetcher: F, store: S, config: CheckConfig) -> Self {
        Self {
            fetcher,
            store,
            config,
        }
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Check every tracked document, logging through `tracing`.
    pub async fn run(&self) -> CheckReport {
        self.run_with(CancellationToken::new(), Arc::new(TracingCheckReporter))
            .await
    }

    /// Check every tracked document.
    ///
    /// Cancelling `cancel_token` stops workers from starting new documents.
    /// Documents already in flight finish normally; documents that never ran
    /// are counted as errors.
    pub async fn run_with<R>(
        &self,
        cancel_token: CancellationToken,
        reporter: Arc<R>,
    ) -> CheckReport
    where
        R: CheckReporter + 'static,
    {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let loaded = match self.config.validate() {
            Ok(()) => self.store.fetch_tracked_documents().await,
            Err(e) => Err(e),
        };
        match loaded {
            Ok(documents) => {
                self.execute(run_id, started_at, documents, cancel_token, reporter)
                    .await
            }
            Err(e) => {
                let error = e.to_string();
                reporter.report(CheckEvent::RunAborted {
                    run_id,
                    error: &error,
                });
                CheckReport::aborted(run_id, started_at)
            }
        }
    }

    /// Check an explicit batch instead of the store's snapshot. Results of
    /// full stages are still persisted through the store.
    pub async fn check_documents<R>(
        &self,
        documents: Vec<TrackedDocument>,
        cancel_token: CancellationToken,
        reporter: Arc<R>,
    ) -> CheckReport
    where
        R: CheckReporter + 'static,
    {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        if let Err(e) = self.config.validate() {
            let error = e.to_string();
            reporter.report(CheckEvent::RunAborted {
                run_id,
                error: &error,
            });
            return CheckReport::aborted(run_id, started_at);
        }
        self.execute(run_id, started_at, documents, cancel_token, reporter)
            .await
    }

    /// Run the pipeline on one document without pacing or persistence.
    pub async fn check_single(&self, doc: &TrackedDocument) -> DocumentOutcome {
        let runner = StageRunner::new(&self.fetcher, &self.config);
        check_document(&runner, doc, &TracingCheckReporter).await
    }

    async fn execute<R>(
        &self,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        documents: Vec<TrackedDocument>,
        cancel_token: CancellationToken,
        reporter: Arc<R>,
    ) -> CheckReport
    where
        R: CheckReporter + 'static,
    {
        let clock = Instant::now();
        let total = documents.len();
        let workers = self.config.concurrency.min(total);
        reporter.report(CheckEvent::RunStarted {
            run_id,
            total: total as u64,
            workers,
        });

        let documents = Arc::new(documents);
        let next = Arc::new(AtomicUsize::new(0));
        let config = Arc::new(self.config.clone());
        let pacing = Pacing::from_config(&self.config);
        let (tx, mut rx) = mpsc::channel::<(usize, DocumentOutcome)>(workers.max(1) * 2);

        let mut pool = JoinSet::new();
        for _ in 0..workers {
            let fetcher = ThrottledFetcher::new(self.fetcher.clone(), pacing);
            let store = self.store.clone();
            let documents = Arc::clone(&documents);
            let next = Arc::clone(&next);
            let config = Arc::clone(&config);
            let reporter = Arc::clone(&reporter);
            let cancel_token = cancel_token.clone();
            let tx = tx.clone();

            pool.spawn(async move {
                let runner = StageRunner::new(&fetcher, &config);
                loop {
                    if cancel_token.is_cancelled() {
                        break;
                    }
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    let Some(doc) = documents.get(index) else {
                        break;
                    };

                    // A started document runs to completion: its cache write and
                    // its decision must land together.
                    let outcome = process(&runner, &store, doc, reporter.as_ref()).await;
                    if tx.send((index, outcome)).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut stats = create_initial_stats(total as u64);
        let mut changes = Vec::new();
        let mut reported = vec![false; total];
        while let Some((index, outcome)) = rx.recv().await {
            reported[index] = true;
            stats.record(
                &outcome.tally,
                outcome.decision.is_some(),
                outcome.is_changed(),
                outcome.failed,
            );
            if let Some(decision) = outcome.decision.filter(|d| d.is_changed) {
                changes.push(decision);
            }
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                tracing::error!(%run_id, error = %e, "Check worker terminated abnormally");
            }
        }

        account_unreported(&documents, &reported, &mut stats, reporter.as_ref());
        changes.sort_by(|a, b| a.document_id.cmp(&b.document_id));

        reporter.report(CheckEvent::RunFinished {
            run_id,
            stats: &stats,
            elapsed: clock.elapsed(),
        });

        CheckReport {
            run_id,
            success: true,
            started_at,
            finished_at: Utc::now(),
            stats,
            changes,
        }
    }
}

/// One document: run the pipeline, then write back the cache if a full
/// stage produced one.
async fn process<F, S, R>(
    runner: &StageRunner<'_, F>,
    store: &S,
    doc: &TrackedDocument,
    reporter: &R,
) -> DocumentOutcome
where
    F: DocumentFetcher,
    S: DocumentStore,
    R: CheckReporter + ?Sized,
{
    let mut outcome = check_document(runner, doc, reporter).await;
    if let Some(update) = &outcome.cache_update {
        if let Err(e) = store.persist_check_result(update).await {
            let error = e.to_string();
            reporter.report(CheckEvent::PersistFailed {
                document_id: &doc.id,
                error: &error,
            });
            outcome.failed = true;
        }
    }
    outcome
}

/// Close out documents that never reported: they end `Done` as errors.
fn account_unreported<R>(
    documents: &[TrackedDocument],
    reported: &[bool],
    stats: &mut RunStats,
    reporter: &R,
) where
    R: CheckReporter + ?Sized,
{
    for (doc, _) in documents
        .iter()
        .zip(reported)
        .filter(|(_, reported)| !**reported)
    {
        reporter.report(CheckEvent::DocumentSkipped {
            document_id: &doc.id,
        });
        reporter.report(CheckEvent::Transition {
            document_id: &doc.id,
            state: DocumentState::Done,
        });
        stats.errors += 1;
    }
}
