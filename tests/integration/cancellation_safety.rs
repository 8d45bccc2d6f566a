use super::test_utils::{
    file, png_bytes, record, Harness, MockFallback, MockPrimary, PrimaryBehavior,
};
use permit_preview::record::ApprovalStatus;
use permit_preview::{CancellationToken, PreviewError, PreviewSource};
use std::sync::Arc;

#[tokio::test]
async fn cancel_during_primary_render_writes_nothing() {
    let harness = Harness::new();
    harness.primary.hold();
    let session = harness.session();
    let record = record("APP-300", vec![]);

    let task = {
        let session = Arc::clone(&session);
        let record = record.clone();
        tokio::spawn(async move { session.request_preview(&record).await })
    };
    harness.primary.started.notified().await;
    session.cancel_preview();

    let result = task.await.unwrap();
    assert!(matches!(result, Err(PreviewError::Cancelled)));
    assert!(!result.unwrap_err().is_user_visible());
    assert!(harness.orchestrator.cache().peek(&record.id).is_none());
    assert_eq!(harness.orchestrator.lifecycle().live_count(), 0);
    assert!(!harness.orchestrator.is_in_flight(&record.id));
    assert!(session.held().is_none());
}

#[tokio::test]
async fn cancel_during_attachment_collection_rolls_back_staged_entry() {
    let harness = Harness::new();
    harness
        .fetcher
        .serve("s3://permits/slow", png_bytes(10, 10), Some("image/png"));
    harness.fetcher.hold("s3://permits/slow");
    let session = harness.session();
    let record = record(
        "APP-301",
        vec![file("slow", ApprovalStatus::Approved, "s3://permits/slow", "image/png")],
    );

    let task = {
        let session = Arc::clone(&session);
        let record = record.clone();
        tokio::spawn(async move { session.request_preview(&record).await })
    };
    harness.fetcher.started.notified().await;
    // primary stage is already committed at this point
    assert!(harness.orchestrator.cache().peek(&record.id).is_some());
    session.cancel_preview();

    let result = task.await.unwrap();
    assert!(matches!(result, Err(PreviewError::Cancelled)));
    assert!(harness.orchestrator.cache().peek(&record.id).is_none());
    assert_eq!(harness.orchestrator.lifecycle().live_count(), 0);
}

#[tokio::test]
async fn switching_records_cancels_the_previous_request() {
    let harness = Harness::new();
    harness.primary.hold();
    let session = harness.session();
    let first = record("APP-302", vec![]);
    let second = record("APP-303", vec![]);

    let task = {
        let session = Arc::clone(&session);
        let first = first.clone();
        tokio::spawn(async move { session.request_preview(&first).await })
    };
    harness.primary.started.notified().await;

    harness.primary.release();
    let outcome = session.request_preview(&second).await.unwrap();

    let superseded = task.await.unwrap();
    assert!(matches!(superseded, Err(PreviewError::Cancelled)));
    assert_eq!(outcome.record_id, second.id);
    assert!(harness.orchestrator.cache().peek(&first.id).is_none());
    assert!(harness.orchestrator.cache().peek(&second.id).is_some());
    assert_eq!(session.held().map(|held| held.record_id), Some(second.id));
}

#[tokio::test]
async fn late_response_of_superseded_request_is_discarded() {
    let harness = Harness::with(
        MockPrimary::new(PrimaryBehavior::Succeed { pages: 1 }),
        MockFallback::new(),
    );
    harness.primary.hold();
    let orchestrator = Arc::clone(&harness.orchestrator);
    let mut record = record("APP-304", vec![]);

    let stale = {
        let orchestrator = Arc::clone(&orchestrator);
        let record = record.clone();
        tokio::spawn(async move {
            orchestrator
                .request(&record, None, CancellationToken::new())
                .await
        })
    };
    harness.primary.started.notified().await;

    record.status = "for_release".to_string();
    harness.primary.release();
    let fresh = orchestrator
        .request(&record, None, CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(stale.await.unwrap(), Err(PreviewError::Cancelled)));
    let entry = orchestrator.cache().peek(&record.id).unwrap();
    assert_eq!(entry.primary, Some(fresh.primary));
    assert_eq!(entry.signature, fresh.signature);
    assert_eq!(orchestrator.lifecycle().live_count(), 1);
}

#[tokio::test]
async fn resumed_request_keeps_primary_staged_by_the_superseded_one() {
    let harness = Harness::new();
    harness
        .fetcher
        .serve("s3://permits/held", png_bytes(16, 16), Some("image/png"));
    harness.fetcher.hold("s3://permits/held");
    let orchestrator = Arc::clone(&harness.orchestrator);
    let record = record(
        "APP-305",
        vec![file("held", ApprovalStatus::Approved, "s3://permits/held", "image/png")],
    );

    let first = {
        let orchestrator = Arc::clone(&orchestrator);
        let record = record.clone();
        tokio::spawn(async move {
            orchestrator
                .request(&record, None, CancellationToken::new())
                .await
        })
    };
    harness.fetcher.started.notified().await;
    let staged = orchestrator.cache().peek(&record.id).unwrap();
    assert!(!staged.complete);

    let second = {
        let orchestrator = Arc::clone(&orchestrator);
        let record = record.clone();
        tokio::spawn(async move {
            orchestrator
                .request(&record, None, CancellationToken::new())
                .await
        })
    };
    harness.fetcher.started.notified().await;

    // the superseded request rolls back while the newer one waits on its fetch
    assert!(matches!(first.await.unwrap(), Err(PreviewError::Cancelled)));
    harness.fetcher.gate.notify_one();
    let outcome = second.await.unwrap().unwrap();

    assert_eq!(outcome.source, PreviewSource::Resumed);
    assert_eq!(Some(outcome.primary), staged.primary);
    assert_eq!(harness.primary.calls(), 1);
    let lifecycle = orchestrator.lifecycle();
    assert!(lifecycle.is_live(outcome.primary));
    assert!(orchestrator.resolve(outcome.primary).is_some());
    let composite = outcome.composite.expect("composite with the held image");
    assert_eq!(orchestrator.resolve(composite).unwrap().page_count(), 3);

    let entry = orchestrator.cache().peek(&record.id).unwrap();
    assert!(entry.complete);
    assert_eq!(entry.primary, Some(outcome.primary));
}
