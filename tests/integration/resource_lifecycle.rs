use super::test_utils::{file, png_bytes, record, Harness};
use permit_preview::lifecycle::HandleRole;
use permit_preview::record::ApprovalStatus;
use std::sync::Arc;

#[tokio::test]
async fn current_entry_survives_other_records_completing() {
    let harness = Harness::new();
    harness
        .fetcher
        .serve("ref/x1", png_bytes(12, 12), Some("image/png"));
    let x = record(
        "APP-600",
        vec![file("x1", ApprovalStatus::Approved, "ref/x1", "image/png")],
    );
    let x_outcome = harness.session().request_preview(&x).await.unwrap();
    let x_entry = harness.orchestrator.cache().peek(&x.id).unwrap();
    let x_handles: Vec<_> = x_entry.handles().collect();
    assert_eq!(x_handles.len(), 3);

    let y_tasks: Vec<_> = (0..4)
        .map(|n| {
            let session = harness.session();
            let record = record(&format!("APP-61{n}"), vec![]);
            tokio::spawn(async move { session.request_preview(&record).await })
        })
        .collect();
    for task in y_tasks {
        task.await.unwrap().unwrap();
    }

    let lifecycle = harness.orchestrator.lifecycle();
    for handle in &x_handles {
        assert!(lifecycle.is_live(*handle), "{handle} was released");
        assert!(lifecycle.is_retained(*handle));
    }
    assert_eq!(
        harness.orchestrator.cache().peek(&x.id).unwrap().composite,
        x_outcome.composite
    );
}

#[tokio::test]
async fn closing_a_view_keeps_cached_handles() {
    let harness = Harness::new();
    let session = harness.session();
    let record = record("APP-620", vec![]);
    let outcome = session.request_preview(&record).await.unwrap();

    assert_eq!(session.close_preview(), 0);
    assert!(session.held().is_none());
    assert!(harness.orchestrator.lifecycle().is_live(outcome.primary));
    assert_eq!(
        harness.orchestrator.lifecycle().role(outcome.primary),
        Some(HandleRole::Primary)
    );
}

#[tokio::test]
async fn closing_a_view_releases_handles_no_entry_retains() {
    let harness = Harness::new();
    let session = harness.session();
    let record = record("APP-621", vec![]);
    session.request_preview(&record).await.unwrap();

    // produced for this view but referenced by no cache entry
    let lifecycle = Arc::clone(harness.orchestrator.lifecycle());
    let stray = lifecycle.track(
        permit_preview::document::PagedDocument::default(),
        HandleRole::Attachment,
        &record.id,
        Some(session.view()),
    );
    assert_eq!(session.close_preview(), 1);
    assert!(!lifecycle.is_live(stray));
}

#[tokio::test]
async fn shutdown_releases_everything() {
    let harness = Harness::new();
    let session = harness.session();
    session.request_preview(&record("APP-630", vec![])).await.unwrap();
    session.request_preview(&record("APP-631", vec![])).await.unwrap();
    assert_eq!(harness.orchestrator.cache().len(), 2);

    assert_eq!(harness.orchestrator.shutdown(), 2);
    assert!(harness.orchestrator.cache().is_empty());
    assert_eq!(harness.orchestrator.lifecycle().live_count(), 0);
}
