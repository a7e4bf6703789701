use lexwatch_core::models::CheckResult;
use lexwatch_core::traits::DocumentStore;
use lexwatch_db::{Database, DocumentRepository};

use crate::integration::common::setup_test_db;

fn result(id: &str, size: u64, date: &str) -> CheckResult {
    CheckResult {
        document_id: id.into(),
        content_length: size,
        last_update_date: date.into(),
    }
}

#[tokio::test]
async fn track_and_fetch_documents() {
    let (pool, _container) = setup_test_db().await;
    let repo = DocumentRepository::new(pool);

    repo.track("BOE-A-2015-11430", "https://www.boe.es/buscar/act.php?id=BOE-A-2015-11430")
        .await
        .unwrap();
    repo.track("BOE-A-1978-31229", "https://www.boe.es/buscar/act.php?id=BOE-A-1978-31229")
        .await
        .unwrap();

    let documents = repo.fetch_tracked_documents().await.unwrap();
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].id, "BOE-A-1978-31229");
    assert!(documents.iter().all(|d| d.needs_baseline()));
}

#[tokio::test]
async fn persist_updates_cache_and_check_time() {
    let (pool, _container) = setup_test_db().await;
    let repo = DocumentRepository::new(pool);
    repo.track("doc-1", "https://example.com/doc-1").await.unwrap();

    repo.persist_check_result(&result("doc-1", 74037, "31/12/2025"))
        .await
        .unwrap();

    let record = repo.get("doc-1").await.unwrap().expect("tracked");
    assert_eq!(record.document.cached_content_length, Some(74037));
    assert_eq!(
        record.document.cached_last_update_date.as_deref(),
        Some("31/12/2025")
    );
    assert!(record.last_checked_at.is_some());
    assert!(!record.document.needs_baseline());
}

#[tokio::test]
async fn retrack_same_url_keeps_cache() {
    let (pool, _container) = setup_test_db().await;
    let repo = DocumentRepository::new(pool);
    repo.track("doc-1", "https://example.com/doc-1").await.unwrap();
    repo.persist_check_result(&result("doc-1", 5000, "01/02/2024"))
        .await
        .unwrap();

    repo.track("doc-1", "https://example.com/doc-1").await.unwrap();
    let record = repo.get("doc-1").await.unwrap().unwrap();
    assert_eq!(record.document.cached_content_length, Some(5000));

    repo.track("doc-1", "https://example.com/moved").await.unwrap();
    let record = repo.get("doc-1").await.unwrap().unwrap();
    assert_eq!(record.document.url, "https://example.com/moved");
    assert!(record.document.needs_baseline());
}

#[tokio::test]
async fn persist_for_untracked_document_fails() {
    let (pool, _container) = setup_test_db().await;
    let repo = DocumentRepository::new(pool);
    repo.track("doc-1", "https://example.com/doc-1").await.unwrap();

    assert!(repo.untrack("doc-1").await.unwrap());
    assert!(!repo.untrack("doc-1").await.unwrap());

    let err = repo
        .persist_check_result(&result("doc-1", 10, "01/01/2024"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no longer tracked"));
}

#[tokio::test]
async fn migrations_apply_on_existing_schema() {
    let (pool, _container) = setup_test_db().await;
    let db = Database::from_pool(pool);

    db.migrate().await.unwrap();
    assert!(db.document_repo().list().await.unwrap().is_empty());
}
