//! The pluggable data-source contract (C2) and its reference backends.
//!
//! A [`DataSource`] is a uniform read/write/subscribe surface over one
//! backend. The multi-source manager (`i3x-manager`) composes several of
//! these; the graph and subscription engines never talk to a concrete
//! backend directly.

mod error;
pub mod retrieval;

pub mod cnc;
pub mod mock;
pub mod mqtt;

use std::sync::Arc;

use async_trait::async_trait;
use i3x_model::{ObjectInstance, ObjectType, RelationshipType, Value};

pub use error::DataSourceError;

/// Called by a data source whenever it observes a new record, whether
/// synthesized (mock/CNC) or mirrored from an external system (MQTT).
pub type OnUpdate = Arc<dyn Fn(ObjectInstance, i3x_model::Record) + Send + Sync>;

/// The outcome of an `updateValue` call (spec.md §4.2).
#[derive(Debug, Clone, serde::Serialize)]
pub struct UpdateOutcome {
    #[serde(rename = "elementId")]
    pub element_id: String,
    pub success: bool,
    pub message: String,
}

impl UpdateOutcome {
    pub fn ok(element_id: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            success: true,
            message: "updated".to_string(),
        }
    }
}

/// The uniform capability set every backend must expose (spec.md §4.2).
///
/// All operations are async: even an in-memory mock source may briefly
/// contend on its internal lock, and the MQTT adapter is fundamentally
/// network-bound. Implementations must return the typed errors in
/// [`DataSourceError`] rather than panicking.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Initialize the source. After this returns, updates may arrive
    /// asynchronously via `on_update`. Idempotent if already started.
    async fn start(&self, on_update: OnUpdate) -> Result<(), DataSourceError>;

    /// Quiesce updates and release resources. No further `on_update` calls
    /// after this returns; any updater task must be joined first.
    async fn stop(&self) -> Result<(), DataSourceError>;

    async fn list_namespaces(&self) -> Result<Vec<i3x_model::Namespace>, DataSourceError>;

    async fn list_object_types(
        &self,
        namespace_uri: Option<&str>,
    ) -> Result<Vec<ObjectType>, DataSourceError>;

    async fn get_object_type(&self, element_id: &str) -> Result<ObjectType, DataSourceError>;

    async fn list_relationship_types(
        &self,
        namespace_uri: Option<&str>,
    ) -> Result<Vec<RelationshipType>, DataSourceError>;

    async fn get_relationship_type(
        &self,
        element_id: &str,
    ) -> Result<RelationshipType, DataSourceError>;

    async fn list_instances(
        &self,
        type_id: Option<&str>,
    ) -> Result<Vec<ObjectInstance>, DataSourceError>;

    async fn get_instance(
        &self,
        element_id: &str,
        with_records: bool,
    ) -> Result<ObjectInstance, DataSourceError>;

    /// If `relationship_type` is absent, the union of all related
    /// instances; otherwise only those on the named edge, matched
    /// case-insensitively (spec.md §4.2).
    async fn get_related_instances(
        &self,
        element_id: &str,
        relationship_type: Option<&str>,
    ) -> Result<Vec<ObjectInstance>, DataSourceError>;

    /// The central recursive value-retrieval algorithm of spec.md §4.5.
    #[allow(clippy::too_many_arguments)]
    async fn get_values(
        &self,
        element_id: &str,
        start: Option<&str>,
        end: Option<&str>,
        max_depth: u32,
        return_history: bool,
    ) -> Result<Value, DataSourceError>;

    async fn update_value(
        &self,
        element_id: &str,
        new_value: Value,
    ) -> Result<UpdateOutcome, DataSourceError>;

    /// Used by the subscription engine to expand monitored trees.
    async fn list_all_instances(&self) -> Result<Vec<ObjectInstance>, DataSourceError>;
}
