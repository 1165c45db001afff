//! The recursive value-retrieval algorithm (spec.md §4.5), shared by every
//! in-process data source (mock, CNC) that keeps its own instance table and
//! record store. Sources that have no composition edges (the MQTT adapter)
//! don't need this — their projection is always a single instance's own
//! records.

use std::collections::HashSet;

use ahash::AHashMap;
use i3x_model::{ObjectInstance, Quality, Record, Value, REL_HAS_COMPONENT};
use i3x_store::RecordStore;

use crate::error::DataSourceError;

fn project_record(record: &Record) -> Value {
    serde_json::json!({
        "value": record.value,
        "quality": record.quality.as_str(),
        "timestamp": record.timestamp,
    })
}

/// The projection of a single instance's own record history, or `None` if
/// it has no records at all.
fn own_projection(
    store: &RecordStore,
    element_id: &str,
    start: Option<&str>,
    end: Option<&str>,
    return_history: bool,
) -> Option<Value> {
    if !store.contains(element_id) {
        return None;
    }
    if start.is_some() || end.is_some() {
        let records = store.range(element_id, start, end);
        return Some(Value::Array(records.iter().map(project_record).collect()));
    }
    if return_history {
        let records = store.full_history(element_id);
        return Some(Value::Array(records.iter().map(project_record).collect()));
    }
    store.head(element_id).as_ref().map(project_record)
}

/// Implements the §4.5 recursive algorithm for one instance, recursing
/// over `HasComponent` children when the instance is a composition and the
/// requested depth allows it. `visited` guards against cycles even though
/// composition edges are invariantly acyclic (spec.md §3).
pub fn get_values(
    instances: &AHashMap<String, ObjectInstance>,
    store: &RecordStore,
    element_id: &str,
    start: Option<&str>,
    end: Option<&str>,
    max_depth: u32,
    return_history: bool,
) -> Result<Value, DataSourceError> {
    let mut visited = HashSet::new();
    compute(
        instances,
        store,
        element_id,
        start,
        end,
        max_depth,
        return_history,
        &mut visited,
    )
}

#[allow(clippy::too_many_arguments)]
fn compute(
    instances: &AHashMap<String, ObjectInstance>,
    store: &RecordStore,
    element_id: &str,
    start: Option<&str>,
    end: Option<&str>,
    depth: u32,
    return_history: bool,
    visited: &mut HashSet<String>,
) -> Result<Value, DataSourceError> {
    let Some(instance) = instances.get(element_id) else {
        return Err(DataSourceError::not_found(element_id));
    };
    if !visited.insert(element_id.to_string()) {
        return Ok(Value::Null);
    }

    let own = own_projection(store, element_id, start, end, return_history);
    let child_ids = if instance.is_composition {
        instance.related_ids(Some(REL_HAS_COMPONENT))
    } else {
        Vec::new()
    };
    let should_recurse = !child_ids.is_empty() && (depth == 0 || depth > 1);

    if !should_recurse {
        // A composition with children that isn't recursed into (depth
        // exhausted) still reports its composite shape as an empty mapping
        // rather than null (spec.md §4.5; mirrors cnc_data_source.py's
        // `if composed_of: return {}`).
        if instance.is_composition && !child_ids.is_empty() {
            return Ok(own.unwrap_or_else(|| Value::Object(serde_json::Map::new())));
        }
        return Ok(own.unwrap_or(Value::Null));
    }

    let next_depth = if depth == 0 { 0 } else { depth - 1 };
    let mut map = serde_json::Map::new();
    if let Some(own_value) = own {
        map.insert(i3x_model::OWN_VALUE_KEY.to_string(), own_value);
    }
    for child_id in child_ids {
        let mut branch_visited = visited.clone();
        let child_value = compute(
            instances,
            store,
            &child_id,
            start,
            end,
            next_depth,
            return_history,
            &mut branch_visited,
        )
        .unwrap_or(Value::Null);
        // A child that yields nothing is included as an empty mapping, not
        // omitted or nulled (spec.md §4.5; cnc_data_source.py:133).
        let child_value = match child_value {
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other,
        };
        map.insert(child_id, child_value);
    }
    Ok(Value::Object(map))
}

/// Record the current time as the update `quality`/`timestamp` pair when a
/// data source synthesizes a fresh observation (used by mock/CNC updaters).
pub fn stamp(value: Value, quality: Quality) -> Record {
    Record::now_with_quality(value, quality)
}
