//! CNC simulator data source: the same storage shape as [`crate::mock`], but
//! the updater applies type-aware physics heuristics instead of uniform
//! jitter — spindle RPM drift, commanded-position convergence, coolant
//! level/temperature decay, state-dependent power draw (spec.md §4.3),
//! grounded in the reference prototype's
//! `cnc_updater.CNCDataUpdater._update_cnc_values` dispatch-by-`typeId`.
//!
//! Updates run at 1 Hz, matching the original `time.sleep(1)` cadence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ahash::AHashMap;
use async_trait::async_trait;
use i3x_model::{
    Namespace, ObjectInstance, ObjectType, RelationshipType, RelationshipValue, Value,
    REL_COMPONENT_OF, REL_HAS_COMPONENT, REL_HAS_CHILDREN, REL_HAS_PARENT, ROOT_PARENT_ID,
};
use i3x_store::RecordStore;
use parking_lot::RwLock;
use rand::Rng;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::DataSourceError;
use crate::{retrieval, DataSource, OnUpdate, UpdateOutcome};

const CNC_NS: &str = "http://cesmii.net/profiles/CNC";
const ISA95_NS: &str = "https://isa.org/isa95";

fn seed_namespaces() -> Vec<Namespace> {
    vec![
        Namespace::new(ISA95_NS, "ISA95"),
        Namespace::new(CNC_NS, "CESMII CNC Profile"),
    ]
}

fn seed_object_types() -> Vec<ObjectType> {
    vec![
        ObjectType::new(
            "work-center-type",
            "WorkCenterType",
            ISA95_NS,
            serde_json::json!({"type": "object"}),
        ),
        ObjectType::new(
            "cnc-base-type",
            "CNCBaseType",
            CNC_NS,
            serde_json::json!({"type": "object"}),
        ),
        ObjectType::new(
            "machine-status-type",
            "MachineStatusType",
            CNC_NS,
            serde_json::json!({
                "type": "object",
                "properties": {
                    "MachineState": {"type": "string"},
                    "PowerConsumption": {"type": "number"},
                    "EnergyIntensity": {"type": "number"}
                }
            }),
        ),
        ObjectType::new(
            "motor-type",
            "MotorType",
            CNC_NS,
            serde_json::json!({
                "type": "object",
                "properties": {
                    "RPM": {"type": "number"},
                    "Current": {"type": "number"},
                    "Vibration": {"type": "number"},
                    "LoadRate": {"type": "number"},
                    "Efficiency": {"type": "number"}
                }
            }),
        ),
        ObjectType::new(
            "position-type",
            "PositionType",
            CNC_NS,
            serde_json::json!({
                "type": "object",
                "properties": {
                    "ActualPosition": {"type": "number"},
                    "CommandedPosition": {"type": "number"},
                    "RemainingDistance": {"type": "number"}
                }
            }),
        ),
        ObjectType::new(
            "coolant-tank-type",
            "CoolantTankType",
            CNC_NS,
            serde_json::json!({
                "type": "object",
                "properties": {
                    "Level": {"type": "number"},
                    "Temperature": {"type": "number"}
                }
            }),
        ),
        ObjectType::new(
            "coolant-pump-type",
            "CoolantPumpType",
            CNC_NS,
            serde_json::json!({
                "type": "object",
                "properties": {
                    "Flow": {"type": "number"},
                    "Pressure": {"type": "number"},
                    "Power": {"type": "number"}
                }
            }),
        ),
    ]
}

fn seed_relationship_types() -> Vec<RelationshipType> {
    vec![
        RelationshipType::new(REL_HAS_PARENT, "HasParent", ISA95_NS, REL_HAS_CHILDREN),
        RelationshipType::new(REL_HAS_CHILDREN, "HasChildren", ISA95_NS, REL_HAS_PARENT),
        RelationshipType::new(REL_HAS_COMPONENT, "HasComponent", CNC_NS, REL_COMPONENT_OF),
        RelationshipType::new(REL_COMPONENT_OF, "ComponentOf", CNC_NS, REL_HAS_COMPONENT),
    ]
}

struct Seed {
    instances: AHashMap<String, ObjectInstance>,
}

fn child(
    seed: &mut Seed,
    store: &RecordStore,
    element_id: &str,
    display_name: &str,
    type_id: &str,
    parent_id: &str,
    is_composition: bool,
    value: Option<Value>,
) {
    let mut instance = ObjectInstance::new(element_id, display_name, CNC_NS, type_id, parent_id, is_composition);
    instance
        .relationships
        .insert(REL_COMPONENT_OF.to_string(), RelationshipValue::Single(parent_id.to_string()));
    if let Some(v) = value {
        store.append(element_id, i3x_model::Record::now(v));
    }
    if !parent_id.is_empty() && parent_id != ROOT_PARENT_ID {
        if let Some(parent) = seed.instances.get_mut(parent_id) {
            match parent.relationships.get_mut(REL_HAS_COMPONENT) {
                Some(existing) => existing.push(element_id.to_string()),
                None => {
                    parent.relationships.insert(
                        REL_HAS_COMPONENT.to_string(),
                        RelationshipValue::Single(element_id.to_string()),
                    );
                }
            }
        }
    }
    seed.instances.insert(element_id.to_string(), instance);
}

fn seed_machine(seed: &mut Seed, store: &RecordStore, id_prefix: &str, running: bool) {
    child(
        seed,
        store,
        id_prefix,
        id_prefix,
        "cnc-base-type",
        "work-center-1",
        true,
        None,
    );
    child(
        seed,
        store,
        &format!("{id_prefix}-status"),
        "Machine Status",
        "machine-status-type",
        id_prefix,
        false,
        Some(serde_json::json!({
            "MachineState": if running { "Running" } else { "Idle" },
            "PowerConsumption": if running { 10.0 } else { 3.0 },
            "EnergyIntensity": if running { 0.4 } else { 0.0 },
        })),
    );
    child(
        seed,
        store,
        &format!("{id_prefix}-spindle"),
        "Spindle",
        "motor-type",
        id_prefix,
        false,
        Some(serde_json::json!({
            "RPM": if running { 3200.0 } else { 0.0 },
            "Current": if running { 4.2 } else { 0.0 },
            "Vibration": if running { 0.08 } else { 0.0 },
            "LoadRate": if running { 55.0 } else { 0.0 },
            "Efficiency": 92.0,
        })),
    );
    child(
        seed,
        store,
        &format!("{id_prefix}-x-axis"),
        "X Axis",
        "position-type",
        id_prefix,
        false,
        Some(serde_json::json!({
            "ActualPosition": 0.0,
            "CommandedPosition": if running { 120.0 } else { 0.0 },
            "RemainingDistance": if running { 120.0 } else { 0.0 },
        })),
    );
    child(
        seed,
        store,
        &format!("{id_prefix}-coolant-tank"),
        "Coolant Tank",
        "coolant-tank-type",
        id_prefix,
        false,
        Some(serde_json::json!({"Level": 85.0, "Temperature": 22.0})),
    );
    child(
        seed,
        store,
        &format!("{id_prefix}-coolant-pump"),
        "Coolant Pump",
        "coolant-pump-type",
        id_prefix,
        false,
        Some(serde_json::json!({
            "Flow": if running { 12.0 } else { 0.0 },
            "Pressure": if running { 4.0 } else { 0.0 },
            "Power": if running { 0.75 } else { 0.0 },
        })),
    );
}

fn seed_instances(store: &RecordStore) -> AHashMap<String, ObjectInstance> {
    let mut seed = Seed {
        instances: AHashMap::new(),
    };
    let work_center = ObjectInstance::new(
        "work-center-1",
        "CNC Work Center",
        ISA95_NS,
        "work-center-type",
        ROOT_PARENT_ID,
        true,
    );
    seed.instances.insert(work_center.element_id.clone(), work_center);
    seed_machine(&mut seed, store, "cnc-001", true);
    seed_machine(&mut seed, store, "cnc-002", false);

    for id in ["cnc-001", "cnc-002"] {
        if let Some(inst) = seed.instances.get_mut(id) {
            inst.relationships
                .insert(REL_COMPONENT_OF.to_string(), RelationshipValue::Single("work-center-1".into()));
        }
        if let Some(wc) = seed.instances.get_mut("work-center-1") {
            match wc.relationships.get_mut(REL_HAS_COMPONENT) {
                Some(existing) => existing.push(id.to_string()),
                None => {
                    wc.relationships
                        .insert(REL_HAS_COMPONENT.to_string(), RelationshipValue::Single(id.to_string()));
                }
            }
        }
    }
    seed.instances
}

/// Apply the per-`typeId` physics heuristic to `value` in place, returning
/// whether anything actually changed (mirrors the original's
/// `old_record != current_record` change-suppression).
fn apply_physics(type_id: &str, element_id: &str, value: &mut Value, rng: &mut impl Rng) -> bool {
    let Value::Object(map) = value else { return false };
    let before = Value::Object(map.clone());
    match type_id {
        "motor-type" => {
            let rpm = map.get("RPM").and_then(Value::as_f64).unwrap_or(0.0);
            if rpm > 0.0 {
                set_num(map, "RPM", (rpm + rng.random_range(-50.0..=50.0)).max(0.0));
                let current = map.get("Current").and_then(Value::as_f64).unwrap_or(0.0);
                set_num(map, "Current", (current + rng.random_range(-0.5..=0.5)).max(0.5));
                let vibration = map.get("Vibration").and_then(Value::as_f64).unwrap_or(0.0);
                set_num(map, "Vibration", (vibration + rng.random_range(-0.02..=0.02)).max(0.01));
                let load = map.get("LoadRate").and_then(Value::as_f64).unwrap_or(0.0);
                set_num(map, "LoadRate", (load + rng.random_range(-2.0..=2.0)).clamp(0.0, 100.0));
                let eff = map.get("Efficiency").and_then(Value::as_f64).unwrap_or(92.0);
                set_num(map, "Efficiency", (eff + rng.random_range(-0.5..=0.5)).clamp(80.0, 98.0));
            }
        }
        "position-type" => {
            let actual = map.get("ActualPosition").and_then(Value::as_f64).unwrap_or(0.0);
            let commanded = map
                .get("CommandedPosition")
                .and_then(Value::as_f64)
                .unwrap_or(actual);
            let diff = commanded - actual;
            if diff.abs() > 0.001 {
                let step = diff * rng.random_range(0.3..=0.7);
                let new_actual = actual + step;
                set_num(map, "ActualPosition", new_actual);
                set_num(map, "RemainingDistance", (commanded - new_actual).abs());
            } else if rng.random_bool(0.1) {
                let new_commanded = commanded + rng.random_range(-50.0..=50.0);
                set_num(map, "CommandedPosition", new_commanded);
                set_num(map, "RemainingDistance", (new_commanded - actual).abs());
            }
        }
        "machine-status-type" => {
            let running = map.get("MachineState").and_then(Value::as_str) == Some("Running");
            if running {
                let power = map.get("PowerConsumption").and_then(Value::as_f64).unwrap_or(10.0);
                set_num(map, "PowerConsumption", (power + rng.random_range(-0.5..=0.5)).max(5.0));
                let intensity = map.get("EnergyIntensity").and_then(Value::as_f64).unwrap_or(0.4);
                set_num(map, "EnergyIntensity", (intensity + rng.random_range(-0.02..=0.02)).max(0.1));
            } else {
                let power = map.get("PowerConsumption").and_then(Value::as_f64).unwrap_or(3.0);
                set_num(map, "PowerConsumption", (power + rng.random_range(-0.1..=0.1)).max(1.0));
                set_num(map, "EnergyIntensity", 0.0);
            }
        }
        "coolant-tank-type" => {
            if let Some(level) = map.get("Level").and_then(Value::as_f64) {
                set_num(map, "Level", (level + rng.random_range(-0.2..=0.1)).clamp(10.0, 100.0));
            }
            if let Some(temp) = map.get("Temperature").and_then(Value::as_f64) {
                set_num(map, "Temperature", (temp + rng.random_range(-0.3..=0.3)).clamp(18.0, 35.0));
            }
        }
        "coolant-pump-type" => {
            if element_id.starts_with("cnc-001") {
                let flow = map.get("Flow").and_then(Value::as_f64).unwrap_or(12.0);
                set_num(map, "Flow", (flow + rng.random_range(-0.5..=0.5)).clamp(8.0, 18.0));
                let pressure = map.get("Pressure").and_then(Value::as_f64).unwrap_or(4.0);
                set_num(map, "Pressure", (pressure + rng.random_range(-0.1..=0.1)).clamp(3.0, 6.0));
                let power = map.get("Power").and_then(Value::as_f64).unwrap_or(0.75);
                set_num(map, "Power", (power + rng.random_range(-0.05..=0.05)).clamp(0.5, 1.5));
            }
        }
        _ => {}
    }
    before != *value
}

fn set_num(map: &mut serde_json::Map<String, Value>, key: &str, v: f64) {
    if let Some(n) = serde_json::Number::from_f64(v) {
        map.insert(key.to_string(), Value::Number(n));
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
    fn tick(&self, on_update: &OnUpdate) {
        let mut rng = rand::rng();
        let ids: Vec<String> = self.instances.read().keys().cloned().collect();
        for id in ids {
            let Some(instance) = self.instances.read().get(&id).cloned() else {
                continue;
            };
            let Some(head) = self.store.head(&id) else { continue };
            let mut value = head.value.clone();
            if !apply_physics(&instance.type_id, &id, &mut value, &mut rng) {
                continue;
            }
            let record = i3x_model::Record::now(value);
            self.store.append(&id, record.clone());
            on_update(instance, record);
        }
    }
}

/// A CNC machine simulator. Same interior shape as [`crate::mock::MockSource`]
/// but with a physics-aware updater ticking at 1 Hz (spec.md §4.3).
#[derive(Clone)]
pub struct CncSource(std::sync::Arc<Inner>);

impl CncSource {
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

impl Default for CncSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for CncSource {
    async fn start(&self, on_update: OnUpdate) -> Result<(), DataSourceError> {
        if self.0.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!("cnc data source starting physics worker");
        let inner = self.0.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    _ = interval.tick() => inner.tick(&on_update),
                    _ = inner.stop_signal.notified() => {
                        debug!("cnc data source physics worker stopping");
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
            .filter(|t| namespace_uri.map(|ns| ns == t.namespace_uri).unwrap_or(true))
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
            .filter(|t| namespace_uri.map(|ns| ns == t.namespace_uri).unwrap_or(true))
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
            .instances
            .read()
            .get(element_id)
            .cloned()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spindle_drifts_when_running() {
        let source = CncSource::new();
        let before = source.0.store.head("cnc-001-spindle").unwrap().value;
        let mut rng = rand::rng();
        let mut value = before.clone();
        let changed = apply_physics("motor-type", "cnc-001-spindle", &mut value, &mut rng);
        assert!(changed || before["RPM"].as_f64() == Some(0.0));
    }

    #[tokio::test]
    async fn idle_machine_spindle_does_not_drift() {
        let source = CncSource::new();
        let value = source.0.store.head("cnc-002-spindle").unwrap().value;
        assert_eq!(value["RPM"].as_f64(), Some(0.0));
    }

    #[tokio::test]
    async fn work_center_composes_both_machines() {
        let source = CncSource::new();
        let value = source.get_values("work-center-1", None, None, 0, false).await.unwrap();
        assert!(value.get("cnc-001").is_some());
        assert!(value.get("cnc-002").is_some());
    }
}
