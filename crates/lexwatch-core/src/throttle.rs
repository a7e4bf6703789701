//! Client-side request pacing.
//!
//! Every tracked document lives on the same upstream host, so each worker of
//! a run owns one [`ThrottledFetcher`] and waits between consecutive requests
//! it issues (head, prefix and full fetches alike). Workers do not wait on
//! each other; the pool size bounds the aggregate rate.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::CheckConfig;
use crate::error::AppError;
use crate::traits::DocumentFetcher;

/// Spacing between two requests of one worker: `delay` plus a uniform
/// random share of `jitter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub delay: Duration,
    pub jitter: Duration,
}

impl Pacing {
    pub fn from_config(config: &CheckConfig) -> Self {
        Self {
            delay: config.request_delay,
            jitter: config.request_jitter,
        }
    }

    fn gap(&self, rng: &mut u64) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.delay;
        }
        self.delay + Duration::from_millis(next_random(rng) % (jitter_ms + 1))
    }
}

struct Gate {
    /// Earliest instant the next request may start.
    not_before: Option<Instant>,
    rng: u64,
}

/// A [`DocumentFetcher`] wrapper that spaces out the requests it issues.
///
/// Clones share the same gate, so give each worker its own instance.
#[derive(Clone)]
pub struct ThrottledFetcher<F> {
    inner: F,
    pacing: Pacing,
    gate: Arc<Mutex<Gate>>,
}

impl<F: DocumentFetcher> ThrottledFetcher<F> {
    pub fn new(inner: F, pacing: Pacing) -> Self {
        Self {
            inner,
            pacing,
            gate: Arc::new(Mutex::new(Gate {
                not_before: None,
                rng: seed(),
            })),
        }
    }

    async fn wait_turn(&self) {
        let mut gate = self.gate.lock().await;
        if let Some(deadline) = gate.not_before {
            if deadline > Instant::now() {
                tracing::trace!(
                    wait_ms = %deadline.saturating_duration_since(Instant::now()).as_millis(),
                    "Pacing request"
                );
                tokio::time::sleep_until(deadline).await;
            }
        }
        let gap = self.pacing.gap(&mut gate.rng);
        gate.not_before = Some(Instant::now() + gap);
    }
}

impl<F: DocumentFetcher> DocumentFetcher for ThrottledFetcher<F> {
    async fn head(&self, url: &str, timeout: Duration) -> Result<u64, AppError> {
        self.wait_turn().await;
        self.inner.head(url, timeout).await
    }

    async fn fetch_prefix(
        &self,
        url: &str,
        max_bytes: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, AppError> {
        self.wait_turn().await;
        self.inner.fetch_prefix(url, max_bytes, timeout).await
    }

    async fn fetch_full(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, AppError> {
        self.wait_turn().await;
        self.inner.fetch_full(url, timeout).await
    }
}

fn seed() -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    // xorshift state must be non-zero
    nanos | 1
}

fn next_random(state: &mut u64) -> u64 {
    let mut x = *state;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    *state = x;
    x
}
