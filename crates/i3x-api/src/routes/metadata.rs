//! Namespace, object-type, and relationship-type endpoints (spec.md §6,
//! rows "List namespaces" / "Get/list object types" / "List/get
//! relationship types"). Thin pass-throughs onto the query engine.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NamespaceFilter {
    #[serde(rename = "namespaceUri")]
    pub namespace_uri: Option<String>,
}

pub async fn list_namespaces(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let namespaces = state.graph.list_namespaces().await?;
    Ok(Json(serde_json::json!(namespaces)))
}

pub async fn list_object_types(
    State(state): State<AppState>,
    Query(filter): Query<NamespaceFilter>,
) -> Result<Json<Value>, ApiError> {
    let types = state.graph.list_object_types(filter.namespace_uri.as_deref()).await?;
    Ok(Json(serde_json::json!(types)))
}

pub async fn get_object_type(
    State(state): State<AppState>,
    Path(element_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let object_type = state.graph.get_object_type(&element_id).await?;
    Ok(Json(serde_json::json!(object_type)))
}

pub async fn list_relationship_types(
    State(state): State<AppState>,
    Query(filter): Query<NamespaceFilter>,
) -> Result<Json<Value>, ApiError> {
    let types = state
        .graph
        .list_relationship_types(filter.namespace_uri.as_deref())
        .await?;
    Ok(Json(serde_json::json!(types)))
}

pub async fn get_relationship_type(
    State(state): State<AppState>,
    Path(element_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let relationship_type = state.graph.get_relationship_type(&element_id).await?;
    Ok(Json(serde_json::json!(relationship_type)))
}
