use std::time::Duration;

use crate::classify::DEFAULT_TOLERANCE;
use crate::error::AppError;

/// Default size of the prefix fetched by the partial stage. The marker sits
/// in the document header, well inside this window.
pub const DEFAULT_PARTIAL_BYTES: usize = 32 * 1024;

/// Configuration for one change-check run.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Maximum byte delta treated as noise.
    pub tolerance: u64,
    /// Number of workers; every request targets the same upstream host.
    pub concurrency: usize,
    /// Minimum pause between consecutive requests issued by one worker.
    pub request_delay: Duration,
    /// Random jitter (uniform [0, jitter]) added on top of `request_delay`.
    pub request_jitter: Duration,
    /// Bytes fetched by the partial stage.
    pub partial_bytes: usize,
    pub head_timeout: Duration,
    pub partial_timeout: Duration,
    pub full_timeout: Duration,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            concurrency: 4,
            request_delay: Duration::from_millis(100),
            request_jitter: Duration::ZERO,
            partial_bytes: DEFAULT_PARTIAL_BYTES,
            head_timeout: Duration::from_secs(10),
            partial_timeout: Duration::from_secs(15),
            full_timeout: Duration::from_secs(30),
        }
    }
}

impl CheckConfig {
    pub fn with_tolerance(mut self, tolerance: u64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_request_jitter(mut self, jitter: Duration) -> Self {
        self.request_jitter = jitter;
        self
    }

    pub fn with_partial_bytes(mut self, bytes: usize) -> Self {
        self.partial_bytes = bytes;
        self
    }

    /// Set the same deadline for every stage.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.head_timeout = timeout;
        self.partial_timeout = timeout;
        self.full_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.tolerance == 0 {
            return Err(AppError::ConfigError(
                "tolerance must be a positive number of bytes".into(),
            ));
        }
        if self.concurrency == 0 {
            return Err(AppError::ConfigError(
                "concurrency must be at least 1".into(),
            ));
        }
        if self.partial_bytes == 0 {
            return Err(AppError::ConfigError(
                "partial window must be at least 1 byte".into(),
            ));
        }
        if self.head_timeout.is_zero()
            || self.partial_timeout.is_zero()
            || self.full_timeout.is_zero()
        {
            return Err(AppError::ConfigError("timeouts must be non-zero".into()));
        }
        Ok(())
    }
}
