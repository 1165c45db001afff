//! End-to-end scenario 3 of spec.md §8: create a QoS2 subscription,
//! register a root, dispatch three updates, and confirm `sync` drains them
//! in observation order with an empty second call.

use std::sync::Arc;

use i3x_datasource::mock::MockSource;
use i3x_datasource::DataSource;
use i3x_graph::QueryEngine;
use i3x_model::{Quality, Record};
use i3x_subscriptions::SubscriptionEngine;

#[tokio::test]
async fn qos2_sync_drains_in_observation_order_then_empties() {
    let source: Arc<dyn DataSource> = Arc::new(MockSource::new());
    let graph = QueryEngine::new(source.clone());
    let engine = SubscriptionEngine::new(graph);

    let sub_id = engine.create("QoS2").unwrap();
    engine
        .register(&sub_id, &["sensor-001".to_string()], 1)
        .await
        .unwrap();

    let instance = source.get_instance("sensor-001", false).await.unwrap();
    for i in 0..3 {
        let record = Record::new(serde_json::json!(60.0 + i as f64), Quality::Good, format!("2026-07-20T08:0{i}:00Z"));
        engine.dispatch(instance.clone(), record).await;
    }

    let first_sync = engine.sync(&sub_id).unwrap();
    assert_eq!(first_sync.len(), 3);
    assert_eq!(first_sync[0]["timestamp"], "2026-07-20T08:00:00Z");
    assert_eq!(first_sync[2]["timestamp"], "2026-07-20T08:02:00Z");

    let second_sync = engine.sync(&sub_id).unwrap();
    assert!(second_sync.is_empty());
}

#[tokio::test]
async fn sync_on_qos0_subscription_is_unsupported() {
    let source: Arc<dyn DataSource> = Arc::new(MockSource::new());
    let engine = SubscriptionEngine::new(QueryEngine::new(source));
    let sub_id = engine.create("QoS0").unwrap();
    assert!(engine.sync(&sub_id).is_err());
}

#[tokio::test]
async fn stream_on_qos2_subscription_is_unsupported() {
    let source: Arc<dyn DataSource> = Arc::new(MockSource::new());
    let engine = SubscriptionEngine::new(QueryEngine::new(source));
    let sub_id = engine.create("QoS2").unwrap();
    assert!(engine.open_stream(&sub_id).is_err());
}

#[tokio::test]
async fn invalid_qos_is_rejected_at_creation() {
    let source: Arc<dyn DataSource> = Arc::new(MockSource::new());
    let engine = SubscriptionEngine::new(QueryEngine::new(source));
    assert!(engine.create("QoS1").is_err());
}
