use super::test_utils::{file, png_bytes, record, Harness};
use permit_preview::record::ApprovalStatus;
use permit_preview::{signature, PreviewSource};

#[tokio::test]
async fn approving_an_attachment_forces_regeneration() {
    let harness = Harness::new();
    harness
        .fetcher
        .serve("s3://permits/f1", png_bytes(30, 30), Some("image/png"));
    let mut record = record(
        "APP-200",
        vec![file("f1", ApprovalStatus::Pending, "s3://permits/f1", "image/png")],
    );
    let session = harness.session();

    let before = session.request_preview(&record).await.unwrap();
    assert_eq!(before.composite, None);
    assert_eq!(harness.fetcher.calls(), 0);

    record.find_file_mut("f1").unwrap().status = ApprovalStatus::Approved;
    assert_ne!(signature(Some(&record)), Some(before.signature.clone()));

    let after = session.request_preview(&record).await.unwrap();
    assert_eq!(harness.primary.calls(), 2);
    assert_eq!(after.source, PreviewSource::Primary);
    assert!(after.composite.is_some());

    let lifecycle = harness.orchestrator.lifecycle();
    assert!(!lifecycle.is_live(before.primary));
    assert!(lifecycle.is_live(after.primary));
}

#[tokio::test]
async fn record_level_field_change_invalidates_cache() {
    let harness = Harness::new();
    let session = harness.session();
    let mut record = record("APP-201", vec![]);

    session.request_preview(&record).await.unwrap();
    record.overall_status = "released".to_string();
    let outcome = session.request_preview(&record).await.unwrap();

    assert_eq!(harness.primary.calls(), 2);
    assert_ne!(outcome.source, PreviewSource::Cached);
    assert_eq!(harness.orchestrator.cache().len(), 1);
}

#[tokio::test]
async fn untracked_field_change_keeps_cache() {
    let harness = Harness::new();
    let session = harness.session();
    let mut record = record("APP-202", vec![]);

    session.request_preview(&record).await.unwrap();
    record.requirements[0].name = "Renamed requirement".to_string();
    let outcome = session.request_preview(&record).await.unwrap();

    assert_eq!(harness.primary.calls(), 1);
    assert_eq!(outcome.source, PreviewSource::Cached);
}
