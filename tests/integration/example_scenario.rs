use super::test_utils::{file, png_bytes, record, Harness};
use permit_preview::document::Page;
use permit_preview::record::ApprovalStatus;
use permit_preview::{signature, PreviewSource};

/// Approved PNG attachment is merged; rejecting it regenerates without its page.
#[tokio::test]
async fn approved_attachment_then_rejected() {
    let harness = Harness::new();
    harness
        .fetcher
        .serve("s3://permits/x/f1", png_bytes(300, 200), Some("image/png"));
    let mut x = record(
        "APP-X",
        vec![file("F1", ApprovalStatus::Approved, "s3://permits/x/f1", "image/png")],
    );
    let session = harness.session();

    let first = session.request_preview(&x).await.unwrap();
    assert_eq!(first.source, PreviewSource::Primary);
    let composite = harness
        .orchestrator
        .resolve(first.composite.expect("composite with F1"))
        .unwrap();
    assert_eq!(composite.page_count(), 3);
    assert!(matches!(composite.pages()[2], Page::Raster(_)));

    let entry = harness.orchestrator.cache().peek(&x.id).unwrap();
    assert_eq!(Some(entry.signature.clone()), signature(Some(&x)));
    assert_eq!(entry.composite, first.composite);

    x.find_file_mut("F1").unwrap().status = ApprovalStatus::Rejected;
    let second = session.request_preview(&x).await.unwrap();

    assert_eq!(harness.primary.calls(), 2);
    assert_eq!(second.composite, None);
    let deliverable = harness.orchestrator.resolve(second.deliverable()).unwrap();
    assert_eq!(deliverable.page_count(), 2);
    assert!(deliverable
        .pages()
        .iter()
        .all(|page| matches!(page, Page::Embedded { .. })));

    let lifecycle = harness.orchestrator.lifecycle();
    assert!(!lifecycle.is_live(first.primary));
    assert!(!lifecycle.is_live(first.composite.unwrap()));
    assert_eq!(lifecycle.live_count(), 1);
}
