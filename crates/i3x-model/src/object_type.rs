use serde::{Deserialize, Serialize};

use crate::Value;

/// A structural description (JSON-Schema-like) of permissible record values
/// for instances of an [`ObjectType`]. Immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectType {
    #[serde(rename = "elementId")]
    pub element_id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "namespaceUri")]
    pub namespace_uri: String,
    pub schema: Value,
}

impl ObjectType {
    pub fn new(
        element_id: impl Into<String>,
        display_name: impl Into<String>,
        namespace_uri: impl Into<String>,
        schema: Value,
    ) -> Self {
        Self {
            element_id: element_id.into(),
            display_name: display_name.into(),
            namespace_uri: namespace_uri.into(),
            schema,
        }
    }
}
