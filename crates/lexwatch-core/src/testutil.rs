//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests. All mocks use
//! `Arc<Mutex<_>>` for interior mutability, so clones share state and tests
//! can assert on recorded calls.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AppError;
use crate::models::{CheckResult, TrackedDocument};
use crate::pipeline::DocumentState;
use crate::report::{CheckEvent, CheckReporter};
use crate::traits::{DocumentFetcher, DocumentStore};

type Script<T> = Arc<Mutex<HashMap<String, VecDeque<Result<T, AppError>>>>>;

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

/// A consolidated-text page whose date marker sits after `padding` filler bytes.
pub fn marker_page(date: &str, padding: usize) -> Vec<u8> {
    format!(
        "<html><head><title>BOE</title></head><body><div>{}</div>\
         <p class=\"ult\">Última actualización publicada el {date}</p>\
         <div>Artículo 1.</div></body></html>",
        "x".repeat(padding)
    )
    .into_bytes()
}

/// `size` bytes of markup with no date marker.
pub fn page_of_size(size: usize) -> Vec<u8> {
    let mut page = b"<html>".to_vec();
    page.resize(size, b'x');
    page
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher with scripted responses per URL and per request kind.
///
/// Each call pops the next scripted response; the last one is replayed once
/// the script is exhausted. Unscripted URLs answer with an HTTP 404 error.
#[derive(Clone, Default)]
pub struct MockFetcher {
    heads: Script<u64>,
    prefixes: Script<Vec<u8>>,
    fulls: Script<Vec<u8>>,
    calls: Arc<Mutex<Vec<(String, &'static str)>>>,
    latency: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_head(self, url: &str, response: Result<u64, AppError>) -> Self {
        push(&self.heads, url, response);
        self
    }

    pub fn with_prefix(self, url: &str, response: Result<Vec<u8>, AppError>) -> Self {
        push(&self.prefixes, url, response);
        self
    }

    pub fn with_full(self, url: &str, response: Result<Vec<u8>, AppError>) -> Self {
        push(&self.fulls, url, response);
        self
    }

    /// Every request sleeps this long before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Request kinds ("head", "prefix", "full") issued for `url`, in order.
    pub fn calls_for(&self, url: &str) -> Vec<&'static str> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, kind)| *kind)
            .collect()
    }

    /// Highest number of requests observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn simulate(&self, url: &str, kind: &'static str) {
        self.calls.lock().unwrap().push((url.to_string(), kind));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl DocumentFetcher for MockFetcher {
    async fn head(&self, url: &str, _timeout: Duration) -> Result<u64, AppError> {
        self.simulate(url, "head").await;
        next(&self.heads, url)
    }

    async fn fetch_prefix(
        &self,
        url: &str,
        max_bytes: usize,
        _timeout: Duration,
    ) -> Result<Vec<u8>, AppError> {
        self.simulate(url, "prefix").await;
        next(&self.prefixes, url).map(|mut body| {
            body.truncate(max_bytes);
            body
        })
    }

    async fn fetch_full(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>, AppError> {
        self.simulate(url, "full").await;
        next(&self.fulls, url)
    }
}

fn push<T>(script: &Script<T>, url: &str, response: Result<T, AppError>) {
    script
        .lock()
        .unwrap()
        .entry(url.to_string())
        .or_default()
        .push_back(response);
}

fn next<T: Clone>(script: &Script<T>, url: &str) -> Result<T, AppError> {
    let mut script = script.lock().unwrap();
    let Some(queue) = script.get_mut(url) else {
        return Err(AppError::HttpError(format!("HTTP 404 for {url}")));
    };
    if queue.len() > 1 {
        return queue
            .pop_front()
            .unwrap_or_else(|| Err(AppError::Generic("empty script".into())));
    }
    match queue.front() {
        Some(Ok(value)) => Ok(value.clone()),
        Some(Err(e)) => Err(duplicate(e)),
        None => Err(AppError::HttpError(format!("HTTP 404 for {url}"))),
    }
}

fn duplicate(error: &AppError) -> AppError {
    match error {
        AppError::HttpError(m) => AppError::HttpError(m.clone()),
        AppError::Timeout(d) => AppError::Timeout(*d),
        AppError::NetworkError(m) => AppError::NetworkError(m.clone()),
        AppError::DatabaseError(m) => AppError::DatabaseError(m.clone()),
        AppError::ConfigError(m) => AppError::ConfigError(m.clone()),
        other => AppError::Generic(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// Mock store that serves a fixed document list and records persisted results.
#[derive(Clone, Default)]
pub struct MockStore {
    documents: Arc<Mutex<Vec<TrackedDocument>>>,
    persisted: Arc<Mutex<Vec<CheckResult>>>,
    fetch_error: Arc<Mutex<Option<AppError>>>,
    failing_ids: Arc<Mutex<HashSet<String>>>,
    persist_latency: Duration,
}

impl MockStore {
    pub fn new(documents: Vec<TrackedDocument>) -> Self {
        Self {
            documents: Arc::new(Mutex::new(documents)),
            ..Self::default()
        }
    }

    /// Store whose snapshot query fails once.
    pub fn with_fetch_error(error: AppError) -> Self {
        Self {
            fetch_error: Arc::new(Mutex::new(Some(error))),
            ..Self::default()
        }
    }

    /// Persisting the result of `document_id` fails.
    pub fn failing_persist_for(self, document_id: &str) -> Self {
        self.failing_ids
            .lock()
            .unwrap()
            .insert(document_id.to_string());
        self
    }

    /// Each write is recorded, then takes this long to return.
    pub fn with_persist_latency(mut self, latency: Duration) -> Self {
        self.persist_latency = latency;
        self
    }

    pub fn persisted(&self) -> Vec<CheckResult> {
        self.persisted.lock().unwrap().clone()
    }
}

impl DocumentStore for MockStore {
    async fn fetch_tracked_documents(&self) -> Result<Vec<TrackedDocument>, AppError> {
        if let Some(e) = self.fetch_error.lock().unwrap().take() {
            return Err(e);
        }
        Ok(self.documents.lock().unwrap().clone())
    }

    async fn persist_check_result(&self, result: &CheckResult) -> Result<(), AppError> {
        if self.failing_ids.lock().unwrap().contains(&result.document_id) {
            return Err(AppError::DatabaseError("disk full".into()));
        }
        self.persisted.lock().unwrap().push(result.clone());
        if !self.persist_latency.is_zero() {
            tokio::time::sleep(self.persist_latency).await;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that records transitions and failures for assertions.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    transitions: Arc<Mutex<Vec<(String, DocumentState)>>>,
    failures: Arc<Mutex<Vec<String>>>,
    persist_failures: Arc<Mutex<Vec<String>>>,
    skipped: Arc<Mutex<Vec<String>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn states_of(&self, document_id: &str) -> Vec<DocumentState> {
        self.transitions
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == document_id)
            .map(|(_, state)| *state)
            .collect()
    }

    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().unwrap().clone()
    }

    pub fn persist_failures(&self) -> Vec<String> {
        self.persist_failures.lock().unwrap().clone()
    }

    pub fn skipped(&self) -> Vec<String> {
        self.skipped.lock().unwrap().clone()
    }
}

impl CheckReporter for RecordingReporter {
    fn report(&self, event: CheckEvent<'_>) {
        match event {
            CheckEvent::Transition { document_id, state } => {
                self.transitions
                    .lock()
                    .unwrap()
                    .push((document_id.to_string(), state));
            }
            CheckEvent::DocumentFailed { document_id, .. } => {
                self.failures.lock().unwrap().push(document_id.to_string());
            }
            CheckEvent::PersistFailed { document_id, .. } => {
                self.persist_failures
                    .lock()
                    .unwrap()
                    .push(document_id.to_string());
            }
            CheckEvent::DocumentSkipped { document_id } => {
                self.skipped.lock().unwrap().push(document_id.to_string());
            }
            _ => {}
        }
    }
}
