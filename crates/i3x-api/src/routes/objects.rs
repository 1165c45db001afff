//! Object instance endpoints (spec.md §6): list/get, related lookups,
//! recursive value/history retrieval, and value writes.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListObjectsParams {
    #[serde(rename = "typeId")]
    pub type_id: Option<String>,
    #[serde(rename = "includeMetadata", default)]
    pub include_metadata: bool,
}

/// List objects, optionally filtered by `typeId`. Minimal projection
/// (no record history) unless `includeMetadata` is set, in which case
/// every instance is re-fetched with its full record history attached
/// (spec.md §9 resolution: `includeMetadata` is a display toggle, never a
/// recursion control).
pub async fn list_objects(
    State(state): State<AppState>,
    Query(params): Query<ListObjectsParams>,
) -> Result<Json<Value>, ApiError> {
    let instances = state.graph.list_instances(params.type_id.as_deref()).await?;
    if !params.include_metadata {
        return Ok(Json(serde_json::json!(instances)));
    }

    let mut detailed = Vec::with_capacity(instances.len());
    for instance in instances {
        detailed.push(state.graph.get_instance(&instance.element_id, true).await?);
    }
    Ok(Json(serde_json::json!(detailed)))
}

pub async fn get_object(
    State(state): State<AppState>,
    Path(element_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let instance = state.graph.get_instance(&element_id, false).await?;
    Ok(Json(serde_json::json!(instance)))
}

#[derive(Debug, Deserialize)]
pub struct RelatedParams {
    #[serde(rename = "relationshiptype")]
    pub relationship_type: Option<String>,
}

pub async fn related_objects(
    State(state): State<AppState>,
    Path(element_id): Path<String>,
    Query(params): Query<RelatedParams>,
) -> Result<Json<Value>, ApiError> {
    let related = state
        .graph
        .get_related_instances(&element_id, params.relationship_type.as_deref())
        .await?;
    Ok(Json(serde_json::json!(related)))
}

/// Last-known-value requests default to the instance itself (`maxDepth: 1`),
/// matching `subscriptions.py`/`cnc_data_source.py`'s default — a bare
/// request for "the value" doesn't walk the full composite tree unless the
/// caller asks for it.
fn default_value_max_depth() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct MaxDepthParam {
    #[serde(rename = "maxDepth", default = "default_value_max_depth")]
    pub max_depth: u32,
}

pub async fn get_value(
    State(state): State<AppState>,
    Path(element_id): Path<String>,
    Query(params): Query<MaxDepthParam>,
) -> Result<Json<Value>, ApiError> {
    let value = state
        .graph
        .get_values(&element_id, None, None, params.max_depth, false)
        .await?;
    Ok(Json(value))
}

#[derive(Debug, Deserialize, Default)]
pub struct HistoryParams {
    #[serde(rename = "startTime")]
    pub start_time: Option<String>,
    #[serde(rename = "endTime")]
    pub end_time: Option<String>,
    #[serde(rename = "maxDepth", default)]
    pub max_depth: u32,
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(element_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Value>, ApiError> {
    let value = state
        .graph
        .get_values(
            &element_id,
            params.start_time.as_deref(),
            params.end_time.as_deref(),
            params.max_depth,
            true,
        )
        .await?;
    Ok(Json(value))
}

pub async fn put_value(
    State(state): State<AppState>,
    Path(element_id): Path<String>,
    Json(new_value): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let outcome = state.graph.update_value(&element_id, new_value).await?;
    Ok(Json(serde_json::json!(outcome)))
}

/// Historical writes are declared by spec.md §6 but every concrete source
/// returns `Unsupported` (spec.md §9 resolution 3) — there is no
/// `DataSource::update_history` to call through to.
pub async fn put_history(Path(_element_id): Path<String>) -> Result<Json<Value>, ApiError> {
    Err(ApiError::Unsupported("history writes are not supported".to_string()))
}
