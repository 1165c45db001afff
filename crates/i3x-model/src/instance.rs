use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{Record, Value, ROOT_PARENT_ID};

/// Either a single related element, or an ordered list of them — a
/// `relationships` entry can be either depending on the edge's cardinality
/// (spec.md §3: "mapping from relationship-type name to either a single
/// `elementId` or an ordered list of `elementId`s").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipValue {
    Single(String),
    Many(Vec<String>),
}

impl RelationshipValue {
    /// Flatten to a slice view regardless of cardinality.
    pub fn as_ids(&self) -> Vec<&str> {
        match self {
            Self::Single(id) => vec![id.as_str()],
            Self::Many(ids) => ids.iter().map(String::as_str).collect(),
        }
    }

    pub fn push(&mut self, id: String) {
        match self {
            Self::Single(existing) => {
                *self = Self::Many(vec![std::mem::take(existing), id]);
            }
            Self::Many(ids) => ids.push(id),
        }
    }
}

/// A node in the industrial object graph, addressed by `elementId`.
///
/// `relationships` preserves insertion order: spec.md §4.5 requires related-
/// object queries to return results in "the source's natural order
/// (insertion order in the relationships map)", hence [`IndexMap`] rather
/// than a hash map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectInstance {
    #[serde(rename = "elementId")]
    pub element_id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "namespaceUri")]
    pub namespace_uri: String,
    #[serde(rename = "typeId")]
    pub type_id: String,
    #[serde(rename = "parentId")]
    pub parent_id: String,
    #[serde(rename = "isComposition")]
    pub is_composition: bool,
    #[serde(default)]
    pub relationships: IndexMap<String, RelationshipValue>,
    /// Record history, present only when explicitly requested
    /// (`getInstance(elementId, withRecords)`), or when the owning data
    /// source keeps instances and records in the same table (mock/CNC).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<Record>>,
    /// Free-form, backend-specific metadata (e.g. the mock source's
    /// `static` flag that excludes an instance from the perturbation
    /// worker). Never interpreted by the graph or subscription engines.
    #[serde(default, flatten)]
    pub metadata: serde_json::Map<String, Value>,
}

impl ObjectInstance {
    pub fn new(
        element_id: impl Into<String>,
        display_name: impl Into<String>,
        namespace_uri: impl Into<String>,
        type_id: impl Into<String>,
        parent_id: impl Into<String>,
        is_composition: bool,
    ) -> Self {
        Self {
            element_id: element_id.into(),
            display_name: display_name.into(),
            namespace_uri: namespace_uri.into(),
            type_id: type_id.into(),
            parent_id: parent_id.into(),
            is_composition,
            relationships: IndexMap::new(),
            records: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn is_root_parent(&self) -> bool {
        self.parent_id == ROOT_PARENT_ID
    }

    /// `true` when `metadata.static == true`; instances so flagged are
    /// excluded from the mock/CNC perturbation workers (spec.md §4.3).
    pub fn is_static(&self) -> bool {
        self.metadata
            .get("static")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Every `elementId` this instance directly relates to, case-
    /// insensitively matched on `relationship_type` when given, else the
    /// union of all related ids (spec.md §4.2 `getRelatedInstances`).
    pub fn related_ids(&self, relationship_type: Option<&str>) -> Vec<String> {
        match relationship_type {
            Some(rel) => self
                .relationships
                .iter()
                .filter(|(k, _)| k.eq_ignore_ascii_case(rel))
                .flat_map(|(_, v)| v.as_ids())
                .map(str::to_string)
                .collect(),
            None => {
                let mut seen = std::collections::HashSet::new();
                let mut out = Vec::new();
                for ids in self.relationships.values() {
                    for id in ids.as_ids() {
                        if seen.insert(id.to_string()) {
                            out.push(id.to_string());
                        }
                    }
                }
                out
            }
        }
    }

    pub fn composition_children_ids(&self) -> Vec<String> {
        self.related_ids(Some(crate::REL_HAS_COMPONENT))
    }

    pub fn head(&self) -> Option<&Record> {
        self.records.as_ref().and_then(|r| r.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn related_ids_matches_case_insensitively_and_dedupes() {
        let mut inst = ObjectInstance::new("pump-101", "Pump 101", "ns", "pump-type", "/", false);
        inst.relationships
            .insert("SuppliesTo".into(), RelationshipValue::Single("tank-201".into()));
        inst.relationships
            .insert("Monitors".into(), RelationshipValue::Many(vec!["tank-201".into(), "sensor-1".into()]));

        assert_eq!(inst.related_ids(Some("suppliesto")), vec!["tank-201".to_string()]);
        let mut all = inst.related_ids(None);
        all.sort();
        assert_eq!(all, vec!["sensor-1".to_string(), "tank-201".to_string()]);
    }
}
