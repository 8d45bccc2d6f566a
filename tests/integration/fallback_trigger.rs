use super::test_utils::{record, Harness, MockFallback, MockPrimary, PrimaryBehavior};
use permit_preview::error::RenderError;
use permit_preview::orchestrator::{Advisory, GenerationState};
use permit_preview::{PreviewError, PreviewSource};

#[tokio::test]
async fn engine_unavailable_falls_back_with_one_time_advisory() {
    let harness = Harness::with(
        MockPrimary::new(PrimaryBehavior::Unavailable),
        MockFallback::new(),
    );
    let session = harness.session();

    let first = session.request_preview(&record("APP-500", vec![])).await.unwrap();
    assert_eq!(first.source, PreviewSource::Fallback);
    assert_eq!(harness.fallback.calls(), 1);
    assert!(matches!(
        first.advisory,
        Some(Advisory::ConverterUnavailable { .. })
    ));
    assert!(first
        .path
        .contains(&GenerationState::PrimaryFailedRecoverable));

    let second = session.request_preview(&record("APP-501", vec![])).await.unwrap();
    assert_eq!(second.source, PreviewSource::Fallback);
    assert_eq!(second.advisory, None);
}

#[tokio::test]
async fn fallback_output_is_cached_like_primary_output() {
    let harness = Harness::with(
        MockPrimary::new(PrimaryBehavior::Unavailable),
        MockFallback::new(),
    );
    let session = harness.session();
    let record = record("APP-502", vec![]);

    session.request_preview(&record).await.unwrap();
    let again = session.request_preview(&record).await.unwrap();

    assert_eq!(again.source, PreviewSource::Cached);
    assert_eq!(harness.primary.calls(), 1);
    assert_eq!(harness.fallback.calls(), 1);
}

#[tokio::test]
async fn other_primary_failures_still_try_the_fallback() {
    let harness = Harness::with(MockPrimary::new(PrimaryBehavior::Fail), MockFallback::new());

    let outcome = harness
        .session()
        .request_preview(&record("APP-503", vec![]))
        .await
        .unwrap();

    assert_eq!(outcome.source, PreviewSource::Fallback);
    assert_eq!(outcome.advisory, None);
    assert!(outcome.path.contains(&GenerationState::PrimaryFailed));
}

#[tokio::test]
async fn both_strategies_failing_is_reported_and_not_cached() {
    let harness = Harness::with(
        MockPrimary::new(PrimaryBehavior::Unavailable),
        MockFallback::failing(),
    );
    let record = record("APP-504", vec![]);

    let err = harness.session().request_preview(&record).await.unwrap_err();
    match &err {
        PreviewError::GenerationFailed {
            record_id,
            primary,
            fallback,
        } => {
            assert_eq!(record_id, &record.id);
            assert!(primary.is_recoverable());
            assert!(matches!(fallback, RenderError::TemplateUnavailable(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_user_visible());
    assert!(harness.orchestrator.cache().is_empty());
    assert_eq!(harness.orchestrator.lifecycle().live_count(), 0);
}

#[tokio::test]
async fn recovered_converter_is_used_again_after_a_record_change() {
    let harness = Harness::with(
        MockPrimary::new(PrimaryBehavior::Unavailable),
        MockFallback::new(),
    );
    let session = harness.session();
    let mut record = record("APP-505", vec![]);

    session.request_preview(&record).await.unwrap();
    harness
        .primary
        .set_behavior(PrimaryBehavior::Succeed { pages: 3 });
    record.status = "for_release".to_string();
    let outcome = session.request_preview(&record).await.unwrap();

    assert_eq!(outcome.source, PreviewSource::Primary);
    assert_eq!(
        harness
            .orchestrator
            .resolve(outcome.primary)
            .unwrap()
            .page_count(),
        3
    );
}
