use serde::{Deserialize, Serialize};

/// A named directed edge kind with a declared inverse. `reverseOf` must
/// resolve to a [`RelationshipType`] whose own `reverseOf` points back
/// (spec.md §3 invariant 4 / §8 "for every relationship type R...").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipType {
    #[serde(rename = "elementId")]
    pub element_id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "namespaceUri")]
    pub namespace_uri: String,
    #[serde(rename = "reverseOf")]
    pub reverse_of: String,
}

impl RelationshipType {
    pub fn new(
        element_id: impl Into<String>,
        display_name: impl Into<String>,
        namespace_uri: impl Into<String>,
        reverse_of: impl Into<String>,
    ) -> Self {
        Self {
            element_id: element_id.into(),
            display_name: display_name.into(),
            namespace_uri: namespace_uri.into(),
            reverse_of: reverse_of.into(),
        }
    }
}
