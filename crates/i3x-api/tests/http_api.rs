//! End-to-end HTTP coverage over the mock data source: every request goes
//! through the real router (`tower::ServiceExt::oneshot`), exercising
//! request parsing, the query/subscription engines, and status-code
//! mapping together.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use i3x_api::{build_router, AppState};
use i3x_datasource::mock::MockSource;
use i3x_datasource::DataSource;
use i3x_graph::QueryEngine;
use i3x_subscriptions::SubscriptionEngine;
use tower::ServiceExt;

fn test_state() -> AppState {
    let source: Arc<dyn DataSource> = Arc::new(MockSource::new());
    let graph = QueryEngine::new(source);
    let subscriptions = Arc::new(SubscriptionEngine::new(graph.clone()));
    AppState::new(graph, subscriptions)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn get_object_returns_the_instance() {
    let router = build_router(test_state());
    let response = router
        .oneshot(
            Request::builder()
                .uri("/objects/pump-101")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["elementId"], "pump-101");
}

#[tokio::test]
async fn unknown_object_maps_not_found_to_404() {
    let router = build_router(test_state());
    let response = router
        .oneshot(
            Request::builder()
                .uri("/objects/ghost-instance")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn composition_value_recursion_matches_scenario_one() {
    let router = build_router(test_state());
    let response = router
        .oneshot(
            Request::builder()
                .uri("/objects/pump-101/value?maxDepth=0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body.get("pump-101-state").is_some());
    assert!(body.get("pump-101-production").is_some());
    assert!(body.get("_value").is_none());
}

#[tokio::test]
async fn write_coercion_accepts_string_to_number() {
    let router = build_router(test_state());
    let path = "/objects/pump-101-production-rate/value";
    let response = router
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(path)
                .header("content-type", "application/json")
                .body(Body::from("\"150.5\""))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn history_put_is_not_implemented() {
    let router = build_router(test_state());
    let response = router
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/objects/sensor-001/history")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn subscription_lifecycle_round_trips_through_http() {
    let router = build_router(test_state());

    let create = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/subscriptions")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"qos":"QoS2"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::OK);
    let created = body_json(create).await;
    let subscription_id = created["subscriptionId"].as_str().unwrap().to_string();

    let register = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/subscriptions/{subscription_id}/register"))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"elementIds":["sensor-001"],"maxDepth":1}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(register.status(), StatusCode::OK);

    let delete = router
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/subscriptions/{subscription_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(delete.status(), StatusCode::OK);
}
