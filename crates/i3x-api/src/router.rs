use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::routes::{metadata, objects, subscriptions};
use crate::state::AppState;

/// Build the full HTTP router over the endpoint table in spec.md §6.
/// `i3x-server` nests this under its bind address; kept separate from the
/// binary so it can also be exercised directly in tests via `tower::util`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/namespaces", get(metadata::list_namespaces))
        .route("/objecttypes", get(metadata::list_object_types))
        .route("/objecttypes/{id}", get(metadata::get_object_type))
        .route("/relationshiptypes", get(metadata::list_relationship_types))
        .route("/relationshiptypes/{id}", get(metadata::get_relationship_type))
        .route("/objects", get(objects::list_objects))
        .route("/objects/{id}", get(objects::get_object))
        .route("/objects/{id}/related", get(objects::related_objects))
        .route("/objects/{id}/value", get(objects::get_value).put(objects::put_value))
        .route("/objects/{id}/history", get(objects::get_history).put(objects::put_history))
        .route("/subscriptions", post(subscriptions::create_subscription))
        .route("/subscriptions/{id}/register", post(subscriptions::register_items))
        .route("/subscriptions/{id}/unregister", post(subscriptions::unregister_items))
        .route("/subscriptions/{id}/stream", get(subscriptions::stream_updates))
        .route("/subscriptions/{id}/sync", post(subscriptions::sync_subscription))
        .route("/subscriptions/{id}", delete(subscriptions::delete_subscription))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
