use chrono::{DateTime, Utc};
use lexwatch_core::error::AppError;
use lexwatch_core::models::{CheckResult, DocumentRecord, TrackedDocument};
use lexwatch_core::traits::DocumentStore;
use sqlx::{PgPool, Pool, Postgres};

/// Tracked documents and their cached size/date in PostgreSQL.
#[derive(Clone)]
pub struct DocumentRepository {
    pool: Pool<Postgres>,
}

impl DocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Start tracking a document. Re-tracking an id updates its URL and keeps
    /// the cache unless the URL changed.
    pub async fn track(&self, id: &str, url: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO tracked_documents (id, url)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET
                url = EXCLUDED.url,
                cached_content_length = CASE
                    WHEN tracked_documents.url = EXCLUDED.url
                    THEN tracked_documents.cached_content_length END,
                cached_last_update_date = CASE
                    WHEN tracked_documents.url = EXCLUDED.url
                    THEN tracked_documents.cached_last_update_date END,
                updated_at = NOW()
            "#,
        )
        .bind(id)
        .bind(url)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        tracing::info!(document_id = %id, %url, "Tracking document");
        Ok(())
    }

    /// Returns whether the document was tracked.
    pub async fn untrack(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query(r#"DELETE FROM tracked_documents WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get(&self, id: &str) -> Result<Option<DocumentRecord>, AppError> {
        let row = sqlx::query_as::<_, TrackedDocumentRow>(
            r#"SELECT * FROM tracked_documents WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        row.map(TryInto::try_into).transpose()
    }

    /// All tracked documents with bookkeeping columns, ordered by id.
    pub async fn list(&self) -> Result<Vec<DocumentRecord>, AppError> {
        let rows = sqlx::query_as::<_, TrackedDocumentRow>(
            r#"SELECT * FROM tracked_documents ORDER BY id"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

impl DocumentStore for DocumentRepository {
    async fn fetch_tracked_documents(&self) -> Result<Vec<TrackedDocument>, AppError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .map(|record| record.document)
            .collect())
    }

    async fn persist_check_result(&self, result: &CheckResult) -> Result<(), AppError> {
        let content_length = i64::try_from(result.content_length).map_err(|_| {
            AppError::DatabaseError(format!(
                "Content length {} out of range for {}",
                result.content_length, result.document_id
            ))
        })?;

        let updated = sqlx::query(
            r#"
            UPDATE tracked_documents
            SET cached_content_length = $2,
                cached_last_update_date = $3,
                last_checked_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(&result.document_id)
        .bind(content_length)
        .bind(&result.last_update_date)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if updated.rows_affected() == 0 {
            return Err(AppError::DatabaseError(format!(
                "Document {} is no longer tracked",
                result.document_id
            )));
        }
        Ok(())
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct TrackedDocumentRow {
    id: String,
    url: String,
    cached_content_length: Option<i64>,
    cached_last_update_date: Option<String>,
    last_checked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TrackedDocumentRow> for DocumentRecord {
    type Error = AppError;

    fn try_from(row: TrackedDocumentRow) -> Result<Self, Self::Error> {
        let cached_content_length = row
            .cached_content_length
            .map(u64::try_from)
            .transpose()
            .map_err(|_| {
                AppError::DatabaseError(format!("Negative cached size for {}", row.id))
            })?;

        Ok(DocumentRecord {
            document: TrackedDocument {
                id: row.id,
                url: row.url,
                cached_content_length,
                cached_last_update_date: row.cached_last_update_date,
            },
            last_checked_at: row.last_checked_at,
            created_at: row.created_at,
        })
    }
}
