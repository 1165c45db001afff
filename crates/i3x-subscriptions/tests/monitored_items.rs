//! Registration/unregistration invariants from spec.md §8: registering
//! then unregistering the same root with the same `maxDepth` leaves
//! `monitoredItems` unchanged, and unknown roots don't abort the call.

use std::sync::Arc;

use i3x_datasource::mock::MockSource;
use i3x_datasource::DataSource;
use i3x_graph::QueryEngine;
use i3x_subscriptions::SubscriptionEngine;

#[tokio::test]
async fn register_then_unregister_same_root_is_a_no_op() {
    let source: Arc<dyn DataSource> = Arc::new(MockSource::new());
    let engine = SubscriptionEngine::new(QueryEngine::new(source));
    let sub_id = engine.create("QoS2").unwrap();

    let before = engine.register(&sub_id, &["pump-101".to_string()], 0).await.unwrap();
    assert!(before.monitored_item_count > 0);

    let after = engine.unregister(&sub_id, &["pump-101".to_string()], 0).await.unwrap();
    assert_eq!(after.monitored_item_count, 0);
}

#[tokio::test]
async fn registering_unknown_root_fails_atomically() {
    let source: Arc<dyn DataSource> = Arc::new(MockSource::new());
    let engine = SubscriptionEngine::new(QueryEngine::new(source));
    let sub_id = engine.create("QoS2").unwrap();

    let err = engine
        .register(&sub_id, &["pump-101".to_string(), "ghost-instance".to_string()], 1)
        .await
        .unwrap_err();
    assert!(matches!(err, i3x_subscriptions::SubscriptionError::NotFound(_)));

    // No partial registration: pump-101 must not have been added either.
    let outcome = engine.unregister(&sub_id, &["pump-101".to_string()], 1).await.unwrap();
    assert_eq!(outcome.monitored_item_count, 0);
}

#[tokio::test]
async fn unregistering_unknown_root_is_silently_ignored() {
    let source: Arc<dyn DataSource> = Arc::new(MockSource::new());
    let engine = SubscriptionEngine::new(QueryEngine::new(source));
    let sub_id = engine.create("QoS0").unwrap();
    engine.register(&sub_id, &["pump-101".to_string()], 1).await.unwrap();

    let outcome = engine
        .unregister(&sub_id, &["nonexistent-ghost".to_string()], 1)
        .await
        .unwrap();
    assert_eq!(outcome.monitored_item_count, 1);
}

#[tokio::test]
async fn registration_is_additive_across_calls() {
    let source: Arc<dyn DataSource> = Arc::new(MockSource::new());
    let engine = SubscriptionEngine::new(QueryEngine::new(source));
    let sub_id = engine.create("QoS0").unwrap();

    engine.register(&sub_id, &["pump-101-state".to_string()], 1).await.unwrap();
    let outcome = engine
        .register(&sub_id, &["pump-101-production-rate".to_string()], 1)
        .await
        .unwrap();
    assert_eq!(outcome.monitored_item_count, 2);
}
