pub mod check;
pub mod classify;
pub mod config;
pub mod date_marker;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod stage;
pub mod stats;
pub mod throttle;
pub mod traits;

#[cfg(test)]
mod testutil;

pub use check::ChangeCheckService;
pub use classify::{ChangeClassifier, DEFAULT_TOLERANCE, SizeVerdict, classify_size};
pub use config::CheckConfig;
pub use date_marker::extract_date;
pub use error::AppError;
pub use models::{ChangeDecision, ChangeReason, CheckResult, TrackedDocument};
pub use report::{CheckReport, CheckReporter, TracingCheckReporter};
pub use stats::{RunStats, create_initial_stats, format_bytes};
pub use traits::{DocumentFetcher, DocumentStore, StaticStore};
