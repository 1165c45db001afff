use std::collections::HashMap;

/// `{operation -> sourceName, primary -> sourceName}` (spec.md §9 "Design
/// notes": a factory-consumed configuration value, not a literal format).
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct RoutingTable {
    #[serde(flatten)]
    operations: HashMap<String, String>,
    primary: Option<String>,
}

impl RoutingTable {
    pub fn new(operations: HashMap<String, String>, primary: Option<String>) -> Self {
        Self { operations, primary }
    }

    pub fn preferred_for(&self, operation: &str) -> Option<String> {
        self.operations.get(operation).cloned()
    }

    pub fn primary(&self) -> Option<String> {
        self.primary.clone()
    }
}
