pub mod config;
pub mod database;
pub mod document_repository;
pub mod run_repository;

pub use config::DatabaseConfig;
pub use database::Database;
pub use document_repository::DocumentRepository;
pub use run_repository::{CheckRunRepository, CheckRunSummary};
