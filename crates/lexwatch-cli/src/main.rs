use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use lexwatch_client::ReqwestFetcher;
use lexwatch_core::models::TrackedDocument;
use lexwatch_core::{
    ChangeCheckService, CheckConfig, CheckReport, StaticStore, TracingCheckReporter, format_bytes,
};
use lexwatch_db::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(
    name = "lexwatch",
    version,
    about = "Detect changes in consolidated legal texts"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every tracked document and record the run (requires DATABASE_URL)
    Check {
        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Check a single URL without touching the database
    CheckUrl {
        /// Document URL
        #[arg(short, long)]
        url: String,

        /// Identifier used in the output (defaults to the URL)
        #[arg(long)]
        id: Option<String>,

        /// Previously seen content length, in bytes
        #[arg(long, requires = "cached_date")]
        cached_size: Option<u64>,

        /// Previously seen "last updated" date (DD/MM/YYYY)
        #[arg(long, requires = "cached_size")]
        cached_date: Option<String>,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Start tracking a document
    Track {
        /// Stable document identifier (e.g. BOE-A-1978-31229)
        #[arg(short, long)]
        id: String,

        /// Document URL
        #[arg(short, long)]
        url: String,
    },

    /// Stop tracking a document
    Untrack {
        #[arg(short, long)]
        id: String,
    },

    /// List tracked documents and their cached metadata
    List,

    /// Show recent check runs
    History {
        /// Number of runs to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

/// Engine tuning shared by the check commands.
#[derive(Args)]
struct EngineArgs {
    /// Byte delta treated as noise
    #[arg(long, env = "LEXWATCH_TOLERANCE", default_value_t = lexwatch_core::DEFAULT_TOLERANCE)]
    tolerance: u64,

    /// Number of concurrent workers
    #[arg(short, long, env = "LEXWATCH_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Minimum delay between requests of one worker, in milliseconds
    #[arg(long, env = "LEXWATCH_DELAY_MS", default_value_t = 100)]
    delay_ms: u64,

    /// Random jitter added to the delay, in milliseconds
    #[arg(long, env = "LEXWATCH_JITTER_MS", default_value_t = 0)]
    jitter_ms: u64,

    /// Bytes fetched by the partial stage
    #[arg(
        long,
        env = "LEXWATCH_PARTIAL_BYTES",
        default_value_t = lexwatch_core::config::DEFAULT_PARTIAL_BYTES
    )]
    partial_bytes: usize,

    /// User-Agent header sent upstream
    #[arg(long, env = "LEXWATCH_USER_AGENT")]
    user_agent: Option<String>,
}

impl EngineArgs {
    fn config(&self) -> Result<CheckConfig> {
        let config = CheckConfig::default()
            .with_tolerance(self.tolerance)
            .with_concurrency(self.concurrency)
            .with_request_delay(Duration::from_millis(self.delay_ms))
            .with_request_jitter(Duration::from_millis(self.jitter_ms))
            .with_partial_bytes(self.partial_bytes);
        config.validate().map_err(|e| anyhow::anyhow!(e))?;
        Ok(config)
    }

    fn fetcher(&self) -> Result<ReqwestFetcher> {
        match &self.user_agent {
            Some(agent) => ReqwestFetcher::with_user_agent(agent),
            None => ReqwestFetcher::new(),
        }
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to create HTTP client")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("lexwatch=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { engine } => {
            let db = connect_db().await?;
            cmd_check(&engine, &db).await?;
        }
        Commands::CheckUrl {
            url,
            id,
            cached_size,
            cached_date,
            engine,
        } => {
            let mut doc = TrackedDocument::new(id.unwrap_or_else(|| url.clone()), url);
            if let (Some(size), Some(date)) = (cached_size, cached_date) {
                doc = doc.with_cache(size, date);
            }
            cmd_check_url(&engine, doc).await?;
        }
        Commands::Track { id, url } => {
            url::Url::parse(&url).with_context(|| format!("Invalid URL: {url}"))?;
            let db = connect_db().await?;
            db.document_repo()
                .track(&id, &url)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            println!("Tracking {id}");
        }
        Commands::Untrack { id } => {
            let db = connect_db().await?;
            let removed = db
                .document_repo()
                .untrack(&id)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            if removed {
                println!("Stopped tracking {id}");
            } else {
                println!("{id} was not tracked");
            }
        }
        Commands::List => {
            let db = connect_db().await?;
            cmd_list(&db).await?;
        }
        Commands::History { limit } => {
            let db = connect_db().await?;
            cmd_history(&db, limit).await?;
        }
    }

    Ok(())
}

/// Connect to PostgreSQL using DATABASE_URL and apply migrations.
async fn connect_db() -> Result<Database> {
    let config = DatabaseConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let db = Database::connect(&config)
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to connect to database")?;
    db.migrate().await.map_err(|e| anyhow::anyhow!(e))?;
    Ok(db)
}

async fn cmd_check(engine: &EngineArgs, db: &Database) -> Result<()> {
    let service = ChangeCheckService::new(engine.fetcher()?, db.document_repo(), engine.config()?);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing documents in flight");
            on_signal.cancel();
        }
    });

    let report = service
        .run_with(cancel, Arc::new(TracingCheckReporter))
        .await;

    if let Err(e) = db.run_repo().save_run(&report).await {
        tracing::error!(run_id = %report.run_id, error = %e, "Failed to record check run");
    }

    log_summary(&report);
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.success {
        bail!("Change check aborted; see log for details");
    }
    Ok(())
}

async fn cmd_check_url(engine: &EngineArgs, doc: TrackedDocument) -> Result<()> {
    let service = ChangeCheckService::new(
        engine.fetcher()?,
        StaticStore::default(),
        engine.config()?,
    );

    tracing::info!(url = %doc.url, "Checking");
    let outcome = service.check_single(&doc).await;

    match outcome.decision {
        Some(decision) => {
            println!("{}", serde_json::to_string_pretty(&decision)?);
            if let Some(cache) = outcome.cache_update {
                tracing::info!(
                    size = cache.content_length,
                    date = %cache.last_update_date,
                    "New cache values"
                );
            }
            Ok(())
        }
        None => bail!("Could not reach a decision for {}", doc.url),
    }
}

async fn cmd_list(db: &Database) -> Result<()> {
    let records = db
        .document_repo()
        .list()
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if records.is_empty() {
        println!("No tracked documents");
        return Ok(());
    }

    for record in &records {
        let doc = &record.document;
        let size = doc
            .cached_content_length
            .map(format_bytes)
            .unwrap_or_else(|| "-".into());
        let checked = record
            .last_checked_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".into());
        println!(
            "  {} {} (size: {}, updated: {}, checked: {})",
            doc.id,
            doc.url,
            size,
            doc.cached_last_update_date.as_deref().unwrap_or("-"),
            checked,
        );
    }

    println!("\nTotal: {} documents", records.len());
    Ok(())
}

async fn cmd_history(db: &Database, limit: usize) -> Result<()> {
    let runs = db
        .run_repo()
        .recent_runs(limit)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if runs.is_empty() {
        println!("No check runs recorded");
        return Ok(());
    }

    for run in &runs {
        let status = if run.success { "ok" } else { "ABORTED" };
        println!(
            "  [{}] {} {} (checked: {}/{}, changes: {}, errors: {}, downloaded: {})",
            status,
            run.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            run.run_id,
            run.stats.checked,
            run.stats.total,
            run.stats.changes_detected,
            run.stats.errors,
            format_bytes(run.stats.total_bytes),
        );
        for change in &run.changes {
            println!(
                "      {} {} -> {}",
                change.document_id,
                change.old_date.as_deref().unwrap_or("-"),
                change.new_date.as_deref().unwrap_or("-"),
            );
        }
    }

    Ok(())
}

fn log_summary(report: &CheckReport) {
    let stats = &report.stats;
    let elapsed = report.finished_at - report.started_at;
    tracing::info!(
        "Checked {}/{} documents in {:.1}s: {} unchanged by size, {} partial, {} full, \
         {} changed, {} errors, {} downloaded",
        stats.checked,
        stats.total,
        elapsed.num_milliseconds() as f64 / 1000.0,
        stats.head_unchanged,
        stats.partial,
        stats.full_download,
        stats.changes_detected,
        stats.errors,
        format_bytes(stats.total_bytes),
    );
    for change in &report.changes {
        tracing::info!(
            document_id = %change.document_id,
            url = %change.url,
            "Changed: {} -> {}",
            change.old_date.as_deref().unwrap_or("-"),
            change.new_date.as_deref().unwrap_or("-"),
        );
    }
}
