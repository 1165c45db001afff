//! In-memory mock data source: a small hard-coded object graph whose
//! numeric record values drift by up to ±10% on a background tick
//! (spec.md §4.3), grounded in the reference mock prototype's
//! `mock_updater.randomize_numeric_values`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ahash::AHashMap;
use async_trait::async_trait;
use i3x_model::{
    Namespace, ObjectInstance, ObjectType, Quality, RelationshipType, RelationshipValue, Value,
    REL_COMPONENT_OF, REL_HAS_COMPONENT, REL_HAS_CHILDREN, REL_HAS_PARENT, ROOT_PARENT_ID,
};
use i3x_store::RecordStore;
use parking_lot::RwLock;
use rand::Rng;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::DataSourceError;
use crate::{retrieval, DataSource, OnUpdate, UpdateOutcome};

const NS_URI: &str = "https://i3x.example/mock";

fn seed_namespaces() -> Vec<Namespace> {
    vec![Namespace::new(NS_URI, "Mock Plant")]
}

fn seed_object_types() -> Vec<ObjectType> {
    vec![
        ObjectType::new(
            "work-unit-type",
            "WorkUnitType",
            NS_URI,
            serde_json::json!({"type": "object"}),
        ),
        ObjectType::new(
            "state-type",
            "StateType",
            NS_URI,
            serde_json::json!({"type": "object", "properties": {"description": {"type": "string"}}}),
        ),
        ObjectType::new(
            "production-type",
            "ProductionType",
            NS_URI,
            serde_json::json!({"type": "object"}),
        ),
        ObjectType::new(
            "measurement-type",
            "MeasurementType",
            NS_URI,
            serde_json::json!({"type": "number"}),
        ),
        ObjectType::new(
            "sensor-type",
            "SensorType",
            NS_URI,
            serde_json::json!({"type": "number"}),
        ),
    ]
}

fn seed_relationship_types() -> Vec<RelationshipType> {
    vec![
        RelationshipType::new(REL_HAS_PARENT, "HasParent", NS_URI, REL_HAS_CHILDREN),
        RelationshipType::new(REL_HAS_CHILDREN, "HasChildren", NS_URI, REL_HAS_PARENT),
        RelationshipType::new(REL_HAS_COMPONENT, "HasComponent", NS_URI, REL_COMPONENT_OF),
        RelationshipType::new(REL_COMPONENT_OF, "ComponentOf", NS_URI, REL_HAS_COMPONENT),
        RelationshipType::new("Monitors", "Monitors", NS_URI, "MonitoredBy"),
        RelationshipType::new("MonitoredBy", "MonitoredBy", NS_URI, "Monitors"),
        RelationshipType::new("SuppliesTo", "SuppliesTo", NS_URI, "SuppliedBy"),
        RelationshipType::new("SuppliedBy", "SuppliedBy", NS_URI, "SuppliesTo"),
    ]
}

fn seed_instances(store: &RecordStore) -> AHashMap<String, ObjectInstance> {
    let mut instances = AHashMap::new();

    let mut pump = ObjectInstance::new("pump-101", "pump-101", NS_URI, "work-unit-type", ROOT_PARENT_ID, true);
    pump.relationships.insert(
        REL_HAS_COMPONENT.to_string(),
        RelationshipValue::Many(vec!["pump-101-state".into(), "pump-101-production".into()]),
    );
    pump.relationships
        .insert("SuppliesTo".to_string(), RelationshipValue::Single("tank-201".into()));
    instances.insert(pump.element_id.clone(), pump);

    let mut pump_state = ObjectInstance::new(
        "pump-101-state",
        "pump-101 State",
        NS_URI,
        "state-type",
        "pump-101",
        false,
    );
    pump_state
        .relationships
        .insert(REL_COMPONENT_OF.to_string(), RelationshipValue::Single("pump-101".into()));
    store.append(
        "pump-101-state",
        i3x_model::Record::new(
            serde_json::json!({"description": "Pump is in operation"}),
            Quality::Good,
            "2026-07-20T08:00:00Z",
        ),
    );
    instances.insert(pump_state.element_id.clone(), pump_state);

    let mut pump_production = ObjectInstance::new(
        "pump-101-production",
        "pump-101 Production",
        NS_URI,
        "production-type",
        "pump-101",
        true,
    );
    pump_production
        .relationships
        .insert(REL_COMPONENT_OF.to_string(), RelationshipValue::Single("pump-101".into()));
    pump_production.relationships.insert(
        REL_HAS_COMPONENT.to_string(),
        RelationshipValue::Single("pump-101-production-rate".into()),
    );
    instances.insert(pump_production.element_id.clone(), pump_production);

    let mut production_rate = ObjectInstance::new(
        "pump-101-production-rate",
        "pump-101 Production Rate",
        NS_URI,
        "measurement-type",
        "pump-101-production",
        false,
    );
    production_rate.relationships.insert(
        REL_COMPONENT_OF.to_string(),
        RelationshipValue::Single("pump-101-production".into()),
    );
    store.append(
        "pump-101-production-rate",
        i3x_model::Record::new(serde_json::json!(142.5), Quality::Good, "2026-07-20T08:00:00Z"),
    );
    instances.insert(production_rate.element_id.clone(), production_rate);

    let mut tank = ObjectInstance::new("tank-201", "tank-201", NS_URI, "work-unit-type", ROOT_PARENT_ID, false);
    tank.relationships
        .insert("SuppliedBy".to_string(), RelationshipValue::Single("pump-101".into()));
    tank.relationships
        .insert("MonitoredBy".to_string(), RelationshipValue::Single("sensor-001".into()));
    instances.insert(tank.element_id.clone(), tank);

    let mut sensor = ObjectInstance::new("sensor-001", "TempSensor-101", NS_URI, "sensor-type", ROOT_PARENT_ID, false);
    sensor
        .relationships
        .insert("Monitors".to_string(), RelationshipValue::Single("tank-201".into()));
    store.append(
        "sensor-001",
        i3x_model::Record::new(serde_json::json!(67.1), Quality::Good, "2026-07-20T08:00:00Z"),
    );
    instances.insert(sensor.element_id.clone(), sensor);

    instances
}

/// Recursively jitter every numeric leaf by up to ±10%, preserving
/// integer-ness, leaving strings/bools/null/empty containers untouched.
fn jitter(value: &Value, rng: &mut impl Rng) -> Value {
    match value {
        Value::Number(n) => {
            let factor = 1.0 + rng.random_range(-0.10..=0.10);
            if let Some(i) = n.as_i64() {
                Value::Number(((i as f64) * factor).round().max(0.0).into())
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f * factor)
                    .map(Value::Number)
                    .unwrap_or_else(|| value.clone())
            } else {
                value.clone()
            }
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| jitter(v, rng)).collect()),
        Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), jitter(v, rng))).collect()),
        other => other.clone(),
    }
}

struct Inner {
    namespaces: Vec<Namespace>,
    object_types: Vec<ObjectType>,
    relationship_types: Vec<RelationshipType>,
    instances: RwLock<AHashMap<String, ObjectInstance>>,
    store: RecordStore,
    stop_signal: Notify,
    running: AtomicBool,
    updater: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn instance_snapshot(&self, element_id: &str) -> Option<ObjectInstance> {
        self.instances.read().get(element_id).cloned()
    }

    fn tick(&self, on_update: &OnUpdate) {
        let mut rng = rand::rng();
        let ids: Vec<String> = self.instances.read().keys().cloned().collect();
        for id in ids {
            let Some(instance) = self.instance_snapshot(&id) else { continue };
            if instance.is_static() || !self.store.contains(&id) {
                continue;
            }
            let Some(head) = self.store.head(&id) else { continue };
            let jittered = jitter(&head.value, &mut rng);
            if jittered == head.value {
                continue;
            }
            let record = i3x_model::Record::now(jittered);
            self.store.append(&id, record.clone());
            on_update(instance, record);
        }
    }
}

/// An in-memory mock data source. Cheaply cloneable: internal state lives
/// behind an `Arc`, so the background perturbation task can hold its own
/// owning handle instead of borrowing `self` (spec.md §4.3, §5).
#[derive(Clone)]
pub struct MockSource(std::sync::Arc<Inner>);

impl MockSource {
    pub fn new() -> Self {
        let store = RecordStore::default();
        let instances = seed_instances(&store);
        Self(std::sync::Arc::new(Inner {
            namespaces: seed_namespaces(),
            object_types: seed_object_types(),
            relationship_types: seed_relationship_types(),
            instances: RwLock::new(instances),
            store,
            stop_signal: Notify::new(),
            running: AtomicBool::new(false),
            updater: parking_lot::Mutex::new(None),
        }))
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for MockSource {
    async fn start(&self, on_update: OnUpdate) -> Result<(), DataSourceError> {
        if self.0.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!("mock data source starting perturbation worker");
        let inner = self.0.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(2));
            loop {
                tokio::select! {
                    _ = interval.tick() => inner.tick(&on_update),
                    _ = inner.stop_signal.notified() => {
                        debug!("mock data source perturbation worker stopping");
                        break;
                    }
                }
            }
        });
        *self.0.updater.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self) -> Result<(), DataSourceError> {
        if !self.0.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.0.stop_signal.notify_waiters();
        if let Some(handle) = self.0.updater.lock().take() {
            let _ = handle.await;
        }
        Ok(())
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, DataSourceError> {
        Ok(self.0.namespaces.clone())
    }

    async fn list_object_types(&self, namespace_uri: Option<&str>) -> Result<Vec<ObjectType>, DataSourceError> {
        Ok(self
            .0
            .object_types
            .iter()
            .filter(|t| namespace_uri.is_none_or_eq(&t.namespace_uri))
            .cloned()
            .collect())
    }

    async fn get_object_type(&self, element_id: &str) -> Result<ObjectType, DataSourceError> {
        self.0
            .object_types
            .iter()
            .find(|t| t.element_id == element_id)
            .cloned()
            .ok_or_else(|| DataSourceError::not_found(element_id))
    }

    async fn list_relationship_types(
        &self,
        namespace_uri: Option<&str>,
    ) -> Result<Vec<RelationshipType>, DataSourceError> {
        Ok(self
            .0
            .relationship_types
            .iter()
            .filter(|t| namespace_uri.is_none_or_eq(&t.namespace_uri))
            .cloned()
            .collect())
    }

    async fn get_relationship_type(&self, element_id: &str) -> Result<RelationshipType, DataSourceError> {
        self.0
            .relationship_types
            .iter()
            .find(|t| t.element_id == element_id)
            .cloned()
            .ok_or_else(|| DataSourceError::not_found(element_id))
    }

    async fn list_instances(&self, type_id: Option<&str>) -> Result<Vec<ObjectInstance>, DataSourceError> {
        Ok(self
            .0
            .instances
            .read()
            .values()
            .filter(|i| type_id.map(|t| i.type_id == t).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn get_instance(&self, element_id: &str, with_records: bool) -> Result<ObjectInstance, DataSourceError> {
        let mut instance = self
            .0
            .instance_snapshot(element_id)
            .ok_or_else(|| DataSourceError::not_found(element_id))?;
        if with_records {
            instance.records = Some(self.0.store.full_history(element_id));
        }
        Ok(instance)
    }

    async fn get_related_instances(
        &self,
        element_id: &str,
        relationship_type: Option<&str>,
    ) -> Result<Vec<ObjectInstance>, DataSourceError> {
        let instances = self.0.instances.read();
        let instance = instances.get(element_id).ok_or_else(|| DataSourceError::not_found(element_id))?;
        let ids = instance.related_ids(relationship_type);
        Ok(ids.iter().filter_map(|id| instances.get(id).cloned()).collect())
    }

    async fn get_values(
        &self,
        element_id: &str,
        start: Option<&str>,
        end: Option<&str>,
        max_depth: u32,
        return_history: bool,
    ) -> Result<Value, DataSourceError> {
        let instances = self.0.instances.read();
        retrieval::get_values(&instances, &self.0.store, element_id, start, end, max_depth, return_history)
    }

    async fn update_value(&self, element_id: &str, new_value: Value) -> Result<UpdateOutcome, DataSourceError> {
        if !self.0.instances.read().contains_key(element_id) {
            return Err(DataSourceError::not_found(element_id));
        }
        let current = self
            .0
            .store
            .head(element_id)
            .ok_or_else(|| DataSourceError::ValidationError("no prior value to validate against".into()))?;
        let mut coerced = i3x_model::schema::validate_and_coerce(&current.value, &new_value)?;
        let now = i3x_model::time::now_rfc3339();
        if let Value::Object(map) = &mut coerced {
            for key in ["timestamp", "Timestamp"] {
                if map.contains_key(key) {
                    map.insert(key.to_string(), Value::String(now.clone()));
                }
            }
        }
        self.0.store.replace_head(element_id, coerced, now, None)?;
        Ok(UpdateOutcome::ok(element_id))
    }

    async fn list_all_instances(&self) -> Result<Vec<ObjectInstance>, DataSourceError> {
        Ok(self.0.instances.read().values().cloned().collect())
    }
}

trait OptionStrExt {
    fn is_none_or_eq(&self, other: &str) -> bool;
}

impl OptionStrExt for Option<&str> {
    fn is_none_or_eq(&self, other: &str) -> bool {
        match self {
            None => true,
            Some(s) => *s == other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_graph_resolves_composition_tree() {
        let source = MockSource::new();
        let value = source.get_values("pump-101", None, None, 0, false).await.unwrap();
        assert!(value.is_object());
        assert!(value.get("pump-101-production").is_some());
    }

    #[tokio::test]
    async fn update_value_rejects_shape_mismatch() {
        let source = MockSource::new();
        let err = source
            .update_value("pump-101-production-rate", serde_json::json!("not-a-number-shape"))
            .await
            .unwrap_err();
        assert!(matches!(err, DataSourceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn update_value_coerces_and_replaces_head() {
        let source = MockSource::new();
        source
            .update_value("pump-101-production-rate", serde_json::json!("150"))
            .await
            .unwrap();
        let head = source.0.store.head("pump-101-production-rate").unwrap();
        assert_eq!(head.value, serde_json::json!(150));
    }

    #[tokio::test]
    async fn related_instances_are_filtered_by_edge_name() {
        let source = MockSource::new();
        let related = source.get_related_instances("pump-101", Some("suppliesto")).await.unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].element_id, "tank-201");
    }
}
