//! The value record store (C1): per-instance ordered record history, kept
//! newest-first, with thread-safe append/head/range/replace operations.
//!
//! A data source owns one [`RecordStore`] and uses it as the backing table
//! for every instance it serves; the store itself knows nothing about
//! instances, types, or the graph — only `elementId -> [Record]`.

mod error;

use std::collections::VecDeque;

use ahash::AHashMap;
use i3x_model::{time, Quality, Record, Value};
use parking_lot::{Mutex, RwLock};

pub use error::StoreError;

/// One instance's record history. A plain [`Mutex`] around a deque is
/// enough: writers hold it only for the duration of a push/swap, so readers
/// never observe a torn record (spec.md §4.1, §5).
struct Table {
    records: Mutex<VecDeque<Record>>,
}

impl Table {
    fn new() -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
        }
    }
}

/// Thread-safe keyed record history.
///
/// The outer map is guarded by an [`RwLock`] because new element ids are
/// registered far less often than records are appended to existing ones;
/// per-instance contention is isolated to that instance's own [`Mutex`].
pub struct RecordStore {
    tables: RwLock<AHashMap<String, Table>>,
    /// Maximum records retained per instance; `None` means unbounded. When
    /// set, the store behaves as a ring buffer but always keeps at least
    /// the most recent record (spec.md §4.1).
    capacity: Option<usize>,
}

impl RecordStore {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            tables: RwLock::new(AHashMap::new()),
            capacity,
        }
    }

    fn with_table<R>(&self, element_id: &str, f: impl FnOnce(&Table) -> R) -> R {
        if let Some(table) = self.tables.read().get(element_id) {
            return f(table);
        }
        let mut tables = self.tables.write();
        let table = tables.entry(element_id.to_string()).or_insert_with(Table::new);
        f(table)
    }

    /// Push `record` to the head of `element_id`'s history, trimming to
    /// `capacity` if configured.
    pub fn append(&self, element_id: &str, record: Record) {
        self.with_table(element_id, |table| {
            let mut records = table.records.lock();
            records.push_front(record);
            if let Some(cap) = self.capacity {
                while records.len() > cap.max(1) {
                    records.pop_back();
                }
            }
        });
    }

    /// The most recent record, or `None` if the instance has no history.
    pub fn head(&self, element_id: &str) -> Option<Record> {
        let tables = self.tables.read();
        tables.get(element_id)?.records.lock().front().cloned()
    }

    /// The full history, newest-first.
    pub fn full_history(&self, element_id: &str) -> Vec<Record> {
        let tables = self.tables.read();
        tables
            .get(element_id)
            .map(|t| t.records.lock().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Records whose timestamp lies in `[start, end]` inclusive. A bound
    /// that fails to parse as RFC-3339 excludes nothing on that side.
    pub fn range(&self, element_id: &str, start: Option<&str>, end: Option<&str>) -> Vec<Record> {
        let start = start.and_then(|s| time::parse(s).ok());
        let end = end.and_then(|s| time::parse(s).ok());
        self.full_history(element_id)
            .into_iter()
            .filter(|r| {
                let Ok(ts) = time::parse(&r.timestamp) else {
                    return false;
                };
                start.map(|s| ts >= s).unwrap_or(true) && end.map(|e| ts <= e).unwrap_or(true)
            })
            .collect()
    }

    /// Atomically swap the head record's value and timestamp. Quality is
    /// preserved unless `quality` overrides it (spec.md §4.1).
    pub fn replace_head(
        &self,
        element_id: &str,
        new_value: Value,
        now_ts: impl Into<String>,
        quality: Option<Quality>,
    ) -> Result<Record, StoreError> {
        let tables = self.tables.read();
        let Some(table) = tables.get(element_id) else {
            return Err(StoreError::NotFound(element_id.to_string()));
        };
        let mut records = table.records.lock();
        let Some(head) = records.front_mut() else {
            return Err(StoreError::EmptyHistory(element_id.to_string()));
        };
        head.value = new_value;
        head.timestamp = now_ts.into();
        if let Some(q) = quality {
            head.quality = q;
        }
        Ok(head.clone())
    }

    /// Whether any history has ever been recorded for `element_id`.
    pub fn contains(&self, element_id: &str) -> bool {
        self.tables.read().contains_key(element_id)
    }

    pub fn remove(&self, element_id: &str) {
        self.tables.write().remove(element_id);
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn append_and_head_roundtrip() {
        let store = RecordStore::default();
        store.append("pump-1", Record::new(json!(10), Quality::Good, "2026-01-01T00:00:00Z"));
        store.append("pump-1", Record::new(json!(11), Quality::Good, "2026-01-01T00:01:00Z"));
        assert_eq!(store.head("pump-1").unwrap().value, json!(11));
        assert_eq!(store.full_history("pump-1").len(), 2);
    }

    #[test]
    fn capacity_trims_oldest_but_keeps_one() {
        let store = RecordStore::new(Some(2));
        for i in 0..5 {
            store.append("x", Record::new(json!(i), Quality::Good, format!("2026-01-01T00:0{i}:00Z")));
        }
        assert_eq!(store.full_history("x").len(), 2);
        assert_eq!(store.head("x").unwrap().value, json!(4));
    }

    #[test]
    fn range_is_inclusive_on_both_ends() {
        let store = RecordStore::default();
        store.append("x", Record::new(json!(1), Quality::Good, "2026-01-01T00:00:00Z"));
        store.append("x", Record::new(json!(2), Quality::Good, "2026-01-01T00:01:00Z"));
        store.append("x", Record::new(json!(3), Quality::Good, "2026-01-01T00:02:00Z"));
        let filtered = store.range("x", Some("2026-01-01T00:00:00Z"), Some("2026-01-01T00:01:00Z"));
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn replace_head_preserves_quality_unless_overridden() {
        let store = RecordStore::default();
        store.append("x", Record::new(json!(1), Quality::Bad, "2026-01-01T00:00:00Z"));
        let updated = store.replace_head("x", json!(2), "2026-01-01T00:05:00Z", None).unwrap();
        assert_eq!(updated.quality, Quality::Bad);
        assert_eq!(updated.value, json!(2));
    }

    #[test]
    fn replace_head_missing_instance_is_not_found() {
        let store = RecordStore::default();
        let err = store.replace_head("ghost", json!(1), "2026-01-01T00:00:00Z", None);
        assert_eq!(err.unwrap_err(), StoreError::NotFound("ghost".to_string()));
    }
}
