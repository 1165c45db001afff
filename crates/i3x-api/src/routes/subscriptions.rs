//! Subscription lifecycle endpoints (spec.md §6, §4.6): create, register/
//! unregister monitored items, the QoS0 stream, QoS2 sync, and delete.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub qos: String,
}

pub async fn create_subscription(
    State(state): State<AppState>,
    Json(request): Json<CreateSubscriptionRequest>,
) -> Result<Json<Value>, ApiError> {
    let subscription_id = state.subscriptions.create(&request.qos)?;
    Ok(Json(serde_json::json!({
        "subscriptionId": subscription_id,
        "message": "subscription created",
    })))
}

#[derive(Debug, Deserialize)]
pub struct MonitoredItemsRequest {
    #[serde(rename = "elementIds")]
    pub element_ids: Vec<String>,
    #[serde(rename = "maxDepth", default)]
    pub max_depth: u32,
}

pub async fn register_items(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
    Json(request): Json<MonitoredItemsRequest>,
) -> Result<Json<Value>, ApiError> {
    let outcome = state
        .subscriptions
        .register(&subscription_id, &request.element_ids, request.max_depth)
        .await?;
    Ok(Json(serde_json::json!(outcome)))
}

pub async fn unregister_items(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
    Json(request): Json<MonitoredItemsRequest>,
) -> Result<Json<Value>, ApiError> {
    let outcome = state
        .subscriptions
        .unregister(&subscription_id, &request.element_ids, request.max_depth)
        .await?;
    Ok(Json(serde_json::json!(outcome)))
}

/// QoS0 stream (spec.md §6 "QoS0 stream framing"): one JSON array per
/// message, each terminated by a newline, held open until the client
/// disconnects or the subscription is deleted.
pub async fn stream_updates(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
) -> Result<Response, ApiError> {
    let receiver = state.subscriptions.open_stream(&subscription_id)?;
    let body_stream = ReceiverStream::new(receiver).map(|value| {
        let mut line = serde_json::to_vec(&serde_json::json!([value])).unwrap_or_default();
        line.push(b'\n');
        Ok::<_, std::convert::Infallible>(line)
    });
    let response = Response::builder()
        .header(axum::http::header::CONTENT_TYPE, "application/x-ndjson")
        .body(Body::from_stream(body_stream))
        .expect("static response parts are always valid");
    Ok(response)
}

pub async fn sync_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let pending = state.subscriptions.sync(&subscription_id)?;
    Ok(Json(serde_json::json!(pending)))
}

pub async fn delete_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.subscriptions.delete(&subscription_id)?;
    Ok(Json(serde_json::json!({ "message": "subscription deleted" })))
}
