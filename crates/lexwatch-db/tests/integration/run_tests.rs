use chrono::{Duration, Utc};
use lexwatch_core::models::{ChangeDecision, ChangeReason};
use lexwatch_core::report::CheckReport;
use lexwatch_core::stats::create_initial_stats;
use lexwatch_db::CheckRunRepository;
use uuid::Uuid;

use crate::integration::common::setup_test_db;

fn report(started_ago_secs: i64, changes: Vec<ChangeDecision>) -> CheckReport {
    let started_at = Utc::now() - Duration::seconds(started_ago_secs);
    let mut stats = create_initial_stats(3);
    stats.checked = 3;
    stats.head_unchanged = 2;
    stats.size_change_detected = 1;
    stats.partial = 1;
    stats.changes_detected = changes.len() as u64;
    stats.total_bytes = 32 * 1024;

    CheckReport {
        run_id: Uuid::new_v4(),
        success: true,
        started_at,
        finished_at: started_at + Duration::seconds(2),
        stats,
        changes,
    }
}

fn changed(id: &str) -> ChangeDecision {
    ChangeDecision {
        document_id: id.into(),
        url: format!("https://example.com/{id}"),
        should_verify: true,
        is_changed: true,
        reason: ChangeReason::DateChanged,
        old_size: Some(5000),
        new_size: Some(5600),
        old_date: Some("01/01/2024".into()),
        new_date: Some("15/03/2024".into()),
    }
}

#[tokio::test]
async fn save_and_list_runs() {
    let (pool, _container) = setup_test_db().await;
    let repo = CheckRunRepository::new(pool);

    let report = report(0, vec![changed("doc-2")]);
    repo.save_run(&report).await.unwrap();

    let runs = repo.recent_runs(10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_id, report.run_id);
    assert_eq!(runs[0].stats, report.stats);
    assert_eq!(runs[0].changes, report.changes);
}

#[tokio::test]
async fn recent_runs_newest_first_and_limited() {
    let (pool, _container) = setup_test_db().await;
    let repo = CheckRunRepository::new(pool);

    let oldest = report(300, vec![]);
    let middle = report(200, vec![]);
    let newest = report(100, vec![changed("doc-1")]);
    for run in [&middle, &oldest, &newest] {
        repo.save_run(run).await.unwrap();
    }

    let runs = repo.recent_runs(2).await.unwrap();
    let ids: Vec<_> = runs.iter().map(|r| r.run_id).collect();
    assert_eq!(ids, vec![newest.run_id, middle.run_id]);
}
