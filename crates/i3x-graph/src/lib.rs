//! The graph/query engine (C5): pass-through lookups over a [`DataSource`],
//! plus the one piece of logic that doesn't belong to any single backend —
//! instance-tree expansion by `parentId`, used by the subscription engine
//! to turn a registered root into its full monitored-item set (spec.md
//! §4.5, "Instance-tree expansion (internal, used by §4.6)").
//!
//! Recursive *value* retrieval (the composition/`HasComponent` algorithm)
//! lives per-backend in `i3x_datasource::retrieval`, since it needs direct
//! access to a backend's record store; this crate only re-exposes it
//! through [`DataSource::get_values`].

mod tree;

use std::sync::Arc;

use i3x_datasource::{DataSource, DataSourceError, UpdateOutcome};
use i3x_model::{Namespace, ObjectInstance, ObjectType, RelationshipType, Value};

pub use tree::expand_instance_tree;

/// The read-side query engine: a thin, named wrapper over whatever
/// [`DataSource`] it's given (a single backend or an
/// `i3x_manager::MultiSourceManager`) so callers depend on `i3x-graph`
/// rather than reaching into `i3x-datasource` or `i3x-manager` directly.
#[derive(Clone)]
pub struct QueryEngine {
    source: Arc<dyn DataSource>,
}

impl QueryEngine {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    pub async fn list_namespaces(&self) -> Result<Vec<Namespace>, DataSourceError> {
        self.source.list_namespaces().await
    }

    pub async fn list_object_types(&self, namespace_uri: Option<&str>) -> Result<Vec<ObjectType>, DataSourceError> {
        self.source.list_object_types(namespace_uri).await
    }

    pub async fn get_object_type(&self, element_id: &str) -> Result<ObjectType, DataSourceError> {
        self.source.get_object_type(element_id).await
    }

    pub async fn list_relationship_types(
        &self,
        namespace_uri: Option<&str>,
    ) -> Result<Vec<RelationshipType>, DataSourceError> {
        self.source.list_relationship_types(namespace_uri).await
    }

    pub async fn get_relationship_type(&self, element_id: &str) -> Result<RelationshipType, DataSourceError> {
        self.source.get_relationship_type(element_id).await
    }

    pub async fn list_instances(&self, type_id: Option<&str>) -> Result<Vec<ObjectInstance>, DataSourceError> {
        self.source.list_instances(type_id).await
    }

    pub async fn get_instance(&self, element_id: &str, with_records: bool) -> Result<ObjectInstance, DataSourceError> {
        self.source.get_instance(element_id, with_records).await
    }

    /// Related-object lookup (spec.md §4.5): delegates to the data source,
    /// preserving its natural (insertion) order.
    pub async fn get_related_instances(
        &self,
        element_id: &str,
        relationship_type: Option<&str>,
    ) -> Result<Vec<ObjectInstance>, DataSourceError> {
        self.source.get_related_instances(element_id, relationship_type).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn get_values(
        &self,
        element_id: &str,
        start: Option<&str>,
        end: Option<&str>,
        max_depth: u32,
        return_history: bool,
    ) -> Result<Value, DataSourceError> {
        self.source
            .get_values(element_id, start, end, max_depth, return_history)
            .await
    }

    pub async fn update_value(&self, element_id: &str, new_value: Value) -> Result<UpdateOutcome, DataSourceError> {
        self.source.update_value(element_id, new_value).await
    }

    /// Expand `root_id`'s instance tree per spec.md §4.5, used by the
    /// subscription engine to compute a monitored-item set.
    pub async fn expand_instance_tree(&self, root_id: &str, max_depth: u32) -> Result<Vec<String>, DataSourceError> {
        let all = self.source.list_all_instances().await?;
        tree::expand_instance_tree(&all, root_id, max_depth)
    }
}
