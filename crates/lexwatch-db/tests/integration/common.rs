use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

/// Schema from `migrations/`, one statement per entry.
const MIGRATIONS: &[&str] = &[
    // 001_tracked_documents.sql
    r#"CREATE TABLE IF NOT EXISTS tracked_documents (
        id VARCHAR(64) PRIMARY KEY,
        url VARCHAR NOT NULL,
        cached_content_length BIGINT,
        cached_last_update_date VARCHAR(10),
        last_checked_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT chk_tracked_documents_length CHECK (
            cached_content_length IS NULL OR cached_content_length >= 0
        )
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_tracked_documents_checked
        ON tracked_documents(last_checked_at NULLS FIRST)"#,
    // 002_check_runs.sql
    r#"CREATE TABLE IF NOT EXISTS check_runs (
        id UUID PRIMARY KEY,
        success BOOLEAN NOT NULL,
        started_at TIMESTAMPTZ NOT NULL,
        finished_at TIMESTAMPTZ NOT NULL,
        total BIGINT NOT NULL DEFAULT 0,
        checked BIGINT NOT NULL DEFAULT 0,
        head_unchanged BIGINT NOT NULL DEFAULT 0,
        size_change_detected BIGINT NOT NULL DEFAULT 0,
        cached_offset BIGINT NOT NULL DEFAULT 0,
        partial BIGINT NOT NULL DEFAULT 0,
        full_download BIGINT NOT NULL DEFAULT 0,
        changes_detected BIGINT NOT NULL DEFAULT 0,
        errors BIGINT NOT NULL DEFAULT 0,
        total_bytes BIGINT NOT NULL DEFAULT 0,
        changes JSONB NOT NULL DEFAULT '[]'::jsonb
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_check_runs_started ON check_runs(started_at DESC)"#,
];

/// Starts PostgreSQL 16 and returns a migrated pool.
///
/// Keep the container alive for the whole test; dropping it stops the server.
pub async fn setup_test_db() -> (PgPool, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("postgres", "16")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "lexwatch_test")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let connection_string = format!("postgresql://postgres:postgres@{host}:{port}/lexwatch_test");

    const MAX_RETRIES: u32 = 30;
    let mut retries = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(&connection_string)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!("Failed to connect to database after {MAX_RETRIES} retries: {e}");
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    };

    for migration in MIGRATIONS {
        sqlx::query(migration)
            .execute(&pool)
            .await
            .expect("Failed to run migration");
    }

    (pool, container)
}
