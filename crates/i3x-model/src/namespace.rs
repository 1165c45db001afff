use serde::{Deserialize, Serialize};

/// A globally-unique namespace a type or relationship type is declared in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub uri: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
}

impl Namespace {
    pub fn new(uri: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            display_name: display_name.into(),
        }
    }
}
