use super::test_utils::{file, png_bytes, record, Harness};
use permit_preview::orchestrator::GenerationState;
use permit_preview::record::ApprovalStatus;
use permit_preview::PreviewSource;

#[tokio::test]
async fn unchanged_record_is_rendered_once() {
    let harness = Harness::new();
    let session = harness.session();
    let record = record("APP-100", vec![]);

    let first = session.request_preview(&record).await.unwrap();
    let second = session.request_preview(&record).await.unwrap();

    assert_eq!(harness.primary.calls(), 1);
    assert_eq!(harness.fallback.calls(), 0);
    assert_eq!(first.source, PreviewSource::Primary);
    assert_eq!(second.source, PreviewSource::Cached);
    assert_eq!(second.primary, first.primary);
    assert_eq!(second.composite, None);
    assert_eq!(
        second.path,
        vec![
            GenerationState::Idle,
            GenerationState::RequestIssued,
            GenerationState::Cached
        ]
    );
}

#[tokio::test]
async fn cached_composite_skips_attachment_fetches() {
    let harness = Harness::new();
    harness
        .fetcher
        .serve("s3://permits/f1", png_bytes(40, 20), Some("image/png"));
    let record = record(
        "APP-101",
        vec![file("f1", ApprovalStatus::Approved, "s3://permits/f1", "image/png")],
    );
    let session = harness.session();

    let first = session.request_preview(&record).await.unwrap();
    let second = session.request_preview(&record).await.unwrap();

    assert_eq!(harness.primary.calls(), 1);
    assert_eq!(harness.fetcher.calls(), 1);
    assert!(first.composite.is_some());
    assert_eq!(second.composite, first.composite);
    assert_eq!(second.deliverable(), first.deliverable());
}

#[tokio::test]
async fn separate_sessions_share_the_cache() {
    let harness = Harness::new();
    let record = record("APP-102", vec![]);

    let a = harness.session().request_preview(&record).await.unwrap();
    let b = harness.session().request_preview(&record).await.unwrap();

    assert_eq!(harness.primary.calls(), 1);
    assert_eq!(b.source, PreviewSource::Cached);
    assert_eq!(a.primary, b.primary);
}
