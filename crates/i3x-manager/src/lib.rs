//! The multi-source manager (C4): composes several named [`DataSource`]s
//! behind a routing table mapping operation names to a preferred source,
//! with deterministic fallback across the rest (spec.md §4.4), grounded in
//! the reference prototype's `DataSourceManager._get_source_for_operation`
//! / `_try_all_sources`.
//!
//! The manager itself implements [`DataSource`], so the graph and
//! subscription engines never need to know whether they're talking to one
//! backend or several.

mod routing;

use std::sync::Arc;

use async_trait::async_trait;
use i3x_datasource::{DataSource, DataSourceError, OnUpdate, UpdateOutcome};
use i3x_model::{ObjectInstance, ObjectType, RelationshipType, Value};
use tracing::{error, info};

pub use routing::RoutingTable;

/// One named, managed backend.
struct Named {
    name: String,
    source: Arc<dyn DataSource>,
}

/// Composes N named data sources plus a [`RoutingTable`] (spec.md §4.4).
///
/// Fallback order with no explicit `primary` is declaration order — the
/// order `sources` were passed to [`MultiSourceManager::new`] — per
/// spec.md §9's open question, resolved in `DESIGN.md`.
pub struct MultiSourceManager {
    sources: Vec<Named>,
    routing: RoutingTable,
}

impl MultiSourceManager {
    pub fn new(sources: Vec<(String, Arc<dyn DataSource>)>, routing: RoutingTable) -> Self {
        Self {
            sources: sources
                .into_iter()
                .map(|(name, source)| Named { name, source })
                .collect(),
            routing,
        }
    }

    fn preferred_index(&self, operation: &str) -> usize {
        let preferred_name = self.routing.preferred_for(operation).or_else(|| self.routing.primary());
        preferred_name
            .and_then(|name| self.sources.iter().position(|s| s.name == name))
            .unwrap_or(0)
    }

    /// Try `f` against the preferred source for `operation`, falling back
    /// to the remaining sources in declaration order on any error that
    /// isn't `NotFound` (spec.md §4.4: "`NotFound` is not retried — absence
    /// from the configured source is authoritative").
    async fn route<T, F, Fut>(&self, operation: &str, f: F) -> Result<T, DataSourceError>
    where
        F: Fn(Arc<dyn DataSource>) -> Fut,
        Fut: std::future::Future<Output = Result<T, DataSourceError>>,
    {
        if self.sources.is_empty() {
            return Err(DataSourceError::TransientError("no data sources configured".into()));
        }
        let preferred = self.preferred_index(operation);
        let mut last_err = None;
        for (i, named) in self.sources.iter().enumerate().skip(preferred).chain(
            self.sources
                .iter()
                .enumerate()
                .take(preferred),
        ) {
            let _ = i;
            match f(named.source.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_authoritative_absence() => return Err(err),
                Err(err) => {
                    info!(source = %named.name, %operation, error = %err, "falling back to next source");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| DataSourceError::TransientError("all sources exhausted".into())))
    }
}

#[async_trait]
impl DataSource for MultiSourceManager {
    async fn start(&self, on_update: OnUpdate) -> Result<(), DataSourceError> {
        for named in &self.sources {
            match named.source.start(on_update.clone()).await {
                Ok(()) => info!(source = %named.name, "started data source"),
                Err(err) => error!(source = %named.name, error = %err, "failed to start data source"),
            }
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), DataSourceError> {
        for named in &self.sources {
            match named.source.stop().await {
                Ok(()) => info!(source = %named.name, "stopped data source"),
                Err(err) => error!(source = %named.name, error = %err, "error stopping data source"),
            }
        }
        Ok(())
    }

    async fn list_namespaces(&self) -> Result<Vec<i3x_model::Namespace>, DataSourceError> {
        self.route("list_namespaces", |s| async move { s.list_namespaces().await }).await
    }

    async fn list_object_types(&self, namespace_uri: Option<&str>) -> Result<Vec<ObjectType>, DataSourceError> {
        self.route("list_object_types", |s| async move { s.list_object_types(namespace_uri).await })
            .await
    }

    async fn get_object_type(&self, element_id: &str) -> Result<ObjectType, DataSourceError> {
        self.route("get_object_type", |s| async move { s.get_object_type(element_id).await })
            .await
    }

    async fn list_relationship_types(
        &self,
        namespace_uri: Option<&str>,
    ) -> Result<Vec<RelationshipType>, DataSourceError> {
        self.route("list_relationship_types", |s| async move {
            s.list_relationship_types(namespace_uri).await
        })
        .await
    }

    async fn get_relationship_type(&self, element_id: &str) -> Result<RelationshipType, DataSourceError> {
        self.route("get_relationship_type", |s| async move { s.get_relationship_type(element_id).await })
            .await
    }

    async fn list_instances(&self, type_id: Option<&str>) -> Result<Vec<ObjectInstance>, DataSourceError> {
        self.route("list_instances", |s| async move { s.list_instances(type_id).await }).await
    }

    async fn get_instance(&self, element_id: &str, with_records: bool) -> Result<ObjectInstance, DataSourceError> {
        self.route("get_instance", |s| async move { s.get_instance(element_id, with_records).await })
            .await
    }

    async fn get_related_instances(
        &self,
        element_id: &str,
        relationship_type: Option<&str>,
    ) -> Result<Vec<ObjectInstance>, DataSourceError> {
        self.route("get_related_instances", |s| async move {
            s.get_related_instances(element_id, relationship_type).await
        })
        .await
    }

    async fn get_values(
        &self,
        element_id: &str,
        start: Option<&str>,
        end: Option<&str>,
        max_depth: u32,
        return_history: bool,
    ) -> Result<Value, DataSourceError> {
        self.route("get_values", |s| async move {
            s.get_values(element_id, start, end, max_depth, return_history).await
        })
        .await
    }

    async fn update_value(&self, element_id: &str, new_value: Value) -> Result<UpdateOutcome, DataSourceError> {
        self.route("update_value", |s| {
            let new_value = new_value.clone();
            async move { s.update_value(element_id, new_value).await }
        })
        .await
    }

    async fn list_all_instances(&self) -> Result<Vec<ObjectInstance>, DataSourceError> {
        self.route("list_all_instances", |s| async move { s.list_all_instances().await }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A data source whose every operation returns a fixed canned error,
    /// used to exercise fallback without standing up a real backend —
    /// the corpus's preferred alternative to a mocking library.
    struct FailingSource {
        error: DataSourceError,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DataSource for FailingSource {
        async fn start(&self, _on_update: OnUpdate) -> Result<(), DataSourceError> {
            Ok(())
        }
        async fn stop(&self) -> Result<(), DataSourceError> {
            Ok(())
        }
        async fn list_namespaces(&self) -> Result<Vec<i3x_model::Namespace>, DataSourceError> {
            Err(self.error.clone())
        }
        async fn list_object_types(&self, _: Option<&str>) -> Result<Vec<ObjectType>, DataSourceError> {
            Err(self.error.clone())
        }
        async fn get_object_type(&self, _: &str) -> Result<ObjectType, DataSourceError> {
            Err(self.error.clone())
        }
        async fn list_relationship_types(&self, _: Option<&str>) -> Result<Vec<RelationshipType>, DataSourceError> {
            Err(self.error.clone())
        }
        async fn get_relationship_type(&self, _: &str) -> Result<RelationshipType, DataSourceError> {
            Err(self.error.clone())
        }
        async fn list_instances(&self, _: Option<&str>) -> Result<Vec<ObjectInstance>, DataSourceError> {
            Err(self.error.clone())
        }
        async fn get_instance(&self, _: &str, _: bool) -> Result<ObjectInstance, DataSourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(self.error.clone())
        }
        async fn get_related_instances(&self, _: &str, _: Option<&str>) -> Result<Vec<ObjectInstance>, DataSourceError> {
            Err(self.error.clone())
        }
        async fn get_values(&self, _: &str, _: Option<&str>, _: Option<&str>, _: u32, _: bool) -> Result<Value, DataSourceError> {
            Err(self.error.clone())
        }
        async fn update_value(&self, _: &str, _: Value) -> Result<UpdateOutcome, DataSourceError> {
            Err(self.error.clone())
        }
        async fn list_all_instances(&self) -> Result<Vec<ObjectInstance>, DataSourceError> {
            Err(self.error.clone())
        }
    }

    /// A data source that always succeeds with a canned instance.
    struct OkSource;

    #[async_trait]
    impl DataSource for OkSource {
        async fn start(&self, _on_update: OnUpdate) -> Result<(), DataSourceError> {
            Ok(())
        }
        async fn stop(&self) -> Result<(), DataSourceError> {
            Ok(())
        }
        async fn list_namespaces(&self) -> Result<Vec<i3x_model::Namespace>, DataSourceError> {
            Ok(vec![])
        }
        async fn list_object_types(&self, _: Option<&str>) -> Result<Vec<ObjectType>, DataSourceError> {
            Ok(vec![])
        }
        async fn get_object_type(&self, _: &str) -> Result<ObjectType, DataSourceError> {
            Err(DataSourceError::not_found("x"))
        }
        async fn list_relationship_types(&self, _: Option<&str>) -> Result<Vec<RelationshipType>, DataSourceError> {
            Ok(vec![])
        }
        async fn get_relationship_type(&self, _: &str) -> Result<RelationshipType, DataSourceError> {
            Err(DataSourceError::not_found("x"))
        }
        async fn list_instances(&self, _: Option<&str>) -> Result<Vec<ObjectInstance>, DataSourceError> {
            Ok(vec![])
        }
        async fn get_instance(&self, element_id: &str, _: bool) -> Result<ObjectInstance, DataSourceError> {
            Ok(ObjectInstance::new(element_id, "ok", "ns", "type", "/", false))
        }
        async fn get_related_instances(&self, _: &str, _: Option<&str>) -> Result<Vec<ObjectInstance>, DataSourceError> {
            Ok(vec![])
        }
        async fn get_values(&self, _: &str, _: Option<&str>, _: Option<&str>, _: u32, _: bool) -> Result<Value, DataSourceError> {
            Ok(Value::Null)
        }
        async fn update_value(&self, element_id: &str, _: Value) -> Result<UpdateOutcome, DataSourceError> {
            Ok(UpdateOutcome::ok(element_id))
        }
        async fn list_all_instances(&self) -> Result<Vec<ObjectInstance>, DataSourceError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn falls_back_to_second_source_on_transient_error() {
        let manager = MultiSourceManager::new(
            vec![
                (
                    "primary".to_string(),
                    Arc::new(FailingSource {
                        error: DataSourceError::TransientError("down".into()),
                        calls: AtomicUsize::new(0),
                    }) as Arc<dyn DataSource>,
                ),
                ("fallback".to_string(), Arc::new(OkSource) as Arc<dyn DataSource>),
            ],
            RoutingTable::new(Default::default(), Some("primary".to_string())),
        );
        let instance = manager.get_instance("thing-1", false).await.unwrap();
        assert_eq!(instance.element_id, "thing-1");
    }

    #[tokio::test]
    async fn not_found_is_authoritative_and_not_retried() {
        let manager = MultiSourceManager::new(
            vec![
                (
                    "primary".to_string(),
                    Arc::new(FailingSource {
                        error: DataSourceError::not_found("x"),
                        calls: AtomicUsize::new(0),
                    }) as Arc<dyn DataSource>,
                ),
                ("fallback".to_string(), Arc::new(OkSource) as Arc<dyn DataSource>),
            ],
            RoutingTable::new(Default::default(), Some("primary".to_string())),
        );
        let err = manager.get_instance("thing-1", false).await.unwrap_err();
        assert!(matches!(err, DataSourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn both_not_found_returns_not_found_without_retry_loop() {
        let manager = MultiSourceManager::new(
            vec![
                (
                    "mock".to_string(),
                    Arc::new(FailingSource {
                        error: DataSourceError::not_found("x"),
                        calls: AtomicUsize::new(0),
                    }) as Arc<dyn DataSource>,
                ),
                (
                    "mqtt".to_string(),
                    Arc::new(FailingSource {
                        error: DataSourceError::not_found("x"),
                        calls: AtomicUsize::new(0),
                    }) as Arc<dyn DataSource>,
                ),
            ],
            RoutingTable::new(Default::default(), Some("mock".to_string())),
        );
        let err = manager.get_object_type("x").await.unwrap_err();
        assert!(matches!(err, DataSourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn routing_table_operation_override_wins_over_primary() {
        let manager = MultiSourceManager::new(
            vec![
                ("mock".to_string(), Arc::new(OkSource) as Arc<dyn DataSource>),
                (
                    "mqtt".to_string(),
                    Arc::new(FailingSource {
                        error: DataSourceError::TransientError("down".into()),
                        calls: AtomicUsize::new(0),
                    }) as Arc<dyn DataSource>,
                ),
            ],
            RoutingTable::new(
                [("get_instance".to_string(), "mock".to_string())].into_iter().collect(),
                Some("mqtt".to_string()),
            ),
        );
        let instance = manager.get_instance("thing-1", false).await.unwrap();
        assert_eq!(instance.element_id, "thing-1");
    }

    #[tokio::test]
    async fn no_primary_falls_back_to_declaration_order() {
        let manager = MultiSourceManager::new(
            vec![
                (
                    "first".to_string(),
                    Arc::new(FailingSource {
                        error: DataSourceError::TransientError("down".into()),
                        calls: AtomicUsize::new(0),
                    }) as Arc<dyn DataSource>,
                ),
                ("second".to_string(), Arc::new(OkSource) as Arc<dyn DataSource>),
            ],
            RoutingTable::new(Default::default(), None),
        );
        let instance = manager.get_instance("thing-1", false).await.unwrap();
        assert_eq!(instance.element_id, "thing-1");
    }
}
