use serde::{Deserialize, Serialize};

use crate::{Quality, Value};

/// One timestamped, quality-tagged value observation (spec.md §3).
///
/// Records are kept newest-first within a [`crate::ObjectInstance`]'s
/// history; the most recent one is the "last known value".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub value: Value,
    #[serde(default)]
    pub quality: Quality,
    pub timestamp: String,
}

impl Record {
    pub fn new(value: Value, quality: Quality, timestamp: impl Into<String>) -> Self {
        Self {
            value,
            quality,
            timestamp: timestamp.into(),
        }
    }

    /// A good-quality record stamped with the current time.
    pub fn now(value: Value) -> Self {
        Self::new(value, Quality::Good, crate::time::now_rfc3339())
    }

    /// A record stamped with the current time at an explicit quality.
    pub fn now_with_quality(value: Value, quality: Quality) -> Self {
        Self::new(value, quality, crate::time::now_rfc3339())
    }
}
