//! QoS0 push delivery (spec.md §4.6, §8): delivered updates are a
//! subsequence of dispatched updates — dropped when no stream is open,
//! delivered (in order) once one is.

use std::sync::Arc;

use i3x_datasource::mock::MockSource;
use i3x_datasource::DataSource;
use i3x_graph::QueryEngine;
use i3x_model::{Quality, Record};
use i3x_subscriptions::SubscriptionEngine;

#[tokio::test]
async fn update_before_stream_is_opened_is_dropped() {
    let source: Arc<dyn DataSource> = Arc::new(MockSource::new());
    let engine = SubscriptionEngine::new(QueryEngine::new(source.clone()));
    let sub_id = engine.create("QoS0").unwrap();
    engine.register(&sub_id, &["sensor-001".to_string()], 1).await.unwrap();

    let instance = source.get_instance("sensor-001", false).await.unwrap();
    engine
        .dispatch(instance, Record::new(serde_json::json!(1.0), Quality::Good, "2026-07-20T08:00:00Z"))
        .await;

    // No stream was opened: the dispatcher must not have blocked or panicked,
    // and there's nothing to drain — at-most-once means this update is gone.
    let mut rx = engine.open_stream(&sub_id).unwrap();
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn updates_after_stream_opens_are_delivered_in_order() {
    let source: Arc<dyn DataSource> = Arc::new(MockSource::new());
    let engine = SubscriptionEngine::new(QueryEngine::new(source.clone()));
    let sub_id = engine.create("QoS0").unwrap();
    engine.register(&sub_id, &["sensor-001".to_string()], 1).await.unwrap();

    let mut rx = engine.open_stream(&sub_id).unwrap();
    let instance = source.get_instance("sensor-001", false).await.unwrap();
    for i in 0..2 {
        let record = Record::new(serde_json::json!(60.0 + i as f64), Quality::Good, format!("2026-07-20T08:0{i}:00Z"));
        engine.dispatch(instance.clone(), record).await;
    }

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first["timestamp"], "2026-07-20T08:00:00Z");
    assert_eq!(second["timestamp"], "2026-07-20T08:01:00Z");
}

#[tokio::test]
async fn delete_closes_the_stream() {
    let source: Arc<dyn DataSource> = Arc::new(MockSource::new());
    let engine = SubscriptionEngine::new(QueryEngine::new(source));
    let sub_id = engine.create("QoS0").unwrap();
    let mut rx = engine.open_stream(&sub_id).unwrap();

    engine.delete(&sub_id).unwrap();
    assert!(rx.recv().await.is_none());
}
