use chrono::{DateTime, Utc};
use lexwatch_core::error::AppError;
use lexwatch_core::models::ChangeDecision;
use lexwatch_core::report::CheckReport;
use lexwatch_core::stats::RunStats;
use serde::Serialize;
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

/// History of completed check runs.
#[derive(Clone)]
pub struct CheckRunRepository {
    pool: Pool<Postgres>,
}

/// A stored run, as listed by `recent_runs`.
#[derive(Debug, Clone, Serialize)]
pub struct CheckRunSummary {
    pub run_id: Uuid,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stats: RunStats,
    pub changes: Vec<ChangeDecision>,
}

impl CheckRunRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn save_run(&self, report: &CheckReport) -> Result<(), AppError> {
        let changes = serde_json::to_value(&report.changes)?;
        let stats = &report.stats;

        sqlx::query(
            r#"
            INSERT INTO check_runs (
                id, success, started_at, finished_at,
                total, checked, head_unchanged, size_change_detected, cached_offset,
                partial, full_download, changes_detected, errors, total_bytes,
                changes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(report.run_id)
        .bind(report.success)
        .bind(report.started_at)
        .bind(report.finished_at)
        .bind(to_db(stats.total)?)
        .bind(to_db(stats.checked)?)
        .bind(to_db(stats.head_unchanged)?)
        .bind(to_db(stats.size_change_detected)?)
        .bind(to_db(stats.cached_offset)?)
        .bind(to_db(stats.partial)?)
        .bind(to_db(stats.full_download)?)
        .bind(to_db(stats.changes_detected)?)
        .bind(to_db(stats.errors)?)
        .bind(to_db(stats.total_bytes)?)
        .bind(changes)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        tracing::debug!(run_id = %report.run_id, "Check run recorded");
        Ok(())
    }

    /// The `limit` most recent runs, newest first.
    pub async fn recent_runs(&self, limit: usize) -> Result<Vec<CheckRunSummary>, AppError> {
        let rows = sqlx::query_as::<_, CheckRunRow>(
            r#"
            SELECT * FROM check_runs
            ORDER BY started_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

fn to_db(value: u64) -> Result<i64, AppError> {
    i64::try_from(value)
        .map_err(|_| AppError::DatabaseError(format!("Counter {value} out of range")))
}

fn from_db(run_id: Uuid, column: &str, value: i64) -> Result<u64, AppError> {
    u64::try_from(value).map_err(|_| {
        AppError::DatabaseError(format!("Negative {column} counter ({value}) for run {run_id}"))
    })
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct CheckRunRow {
    id: Uuid,
    success: bool,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    total: i64,
    checked: i64,
    head_unchanged: i64,
    size_change_detected: i64,
    cached_offset: i64,
    partial: i64,
    full_download: i64,
    changes_detected: i64,
    errors: i64,
    total_bytes: i64,
    changes: serde_json::Value,
}

impl TryFrom<CheckRunRow> for CheckRunSummary {
    type Error = AppError;

    fn try_from(row: CheckRunRow) -> Result<Self, Self::Error> {
        let changes = serde_json::from_value(row.changes)?;
        let run_id = row.id;
        let count = |column: &str, value: i64| from_db(run_id, column, value);

        Ok(CheckRunSummary {
            run_id: row.id,
            success: row.success,
            started_at: row.started_at,
            finished_at: row.finished_at,
            stats: RunStats {
                total: count("total", row.total)?,
                checked: count("checked", row.checked)?,
                head_unchanged: count("head_unchanged", row.head_unchanged)?,
                size_change_detected: count("size_change_detected", row.size_change_detected)?,
                cached_offset: count("cached_offset", row.cached_offset)?,
                partial: count("partial", row.partial)?,
                full_download: count("full_download", row.full_download)?,
                changes_detected: count("changes_detected", row.changes_detected)?,
                errors: count("errors", row.errors)?,
                total_bytes: count("total_bytes", row.total_bytes)?,
            },
            changes,
        })
    }
}
