//! MQTT adapter: subscribes to a configured topic set and maintains a
//! topic→latest-record cache (spec.md §4.3), grounded in the reference
//! prototype's `MQTTDataSource` (`on_connect`/`on_message` callbacks,
//! topic→cache dict, JSON-with-string-fallback parsing) but reworked onto
//! `rumqttc`'s async event loop instead of a callback-based client thread.
//!
//! Namespaces, object types, and `HasChildren`/`HasParent` edges are
//! synthesized from observed topics rather than declared up front, since
//! MQTT itself carries no schema. History is `Unsupported`.

use std::sync::atomic::{AtomicBool, Ordering};

use ahash::AHashMap;
use async_trait::async_trait;
use globset::{Glob, GlobSetBuilder};
use i3x_model::{
    Namespace, ObjectInstance, ObjectType, RelationshipType, RelationshipValue, Value,
    REL_HAS_CHILDREN, REL_HAS_PARENT, ROOT_PARENT_ID,
};
use i3x_store::RecordStore;
use parking_lot::RwLock;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::DataSourceError;
use crate::{DataSource, OnUpdate, UpdateOutcome};

const MQTT_NS: &str = "http://i3x.org/mfg/mqtt";

/// Configuration for [`MqttSource`]: broker endpoint, topic subscriptions,
/// and `*`-wildcard per-segment exclusion patterns (spec.md §4.3).
#[derive(Debug, Clone, serde::Deserialize)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub topics: Vec<String>,
    #[serde(default)]
    pub excluded_topics: Vec<String>,
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "i3x-server".to_string()
}

/// Convert a topic path to an `elementId` by replacing `/` with `_`
/// (spec.md §4.3, mirroring `_topic_to_element_id`).
pub fn topic_to_element_id(topic: &str) -> String {
    topic.replace('/', "_")
}

fn element_id_to_topic(element_id: &str) -> String {
    element_id.replace('_', "/")
}

/// Direct-child match per spec.md §4.3: a longer topic sharing `parent`'s
/// prefix up to exactly one additional path segment.
fn is_direct_child(parent: &str, candidate: &str) -> bool {
    let parent_segments: Vec<&str> = parent.split('/').collect();
    let candidate_segments: Vec<&str> = candidate.split('/').collect();
    candidate_segments.len() == parent_segments.len() + 1
        && candidate_segments[..parent_segments.len()] == parent_segments[..]
}

/// Build a prefix-hierarchy exclusion matcher: `a/b` excludes `a/b`,
/// `a/b/c`, and anything beneath, and each path segment may itself carry a
/// `*` wildcard (spec.md §4.3).
struct ExclusionFilter {
    exact_and_descendants: Vec<Vec<String>>,
    globs: globset::GlobSet,
}

impl ExclusionFilter {
    fn new(patterns: &[String]) -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut exact_and_descendants = Vec::new();
        for pattern in patterns {
            let segments: Vec<String> = pattern.split('/').map(str::to_string).collect();
            exact_and_descendants.push(segments);
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }
        let globs = builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap());
        Self {
            exact_and_descendants,
            globs,
        }
    }

    fn excludes(&self, topic: &str) -> bool {
        if self.globs.is_match(topic) {
            return true;
        }
        let topic_segments: Vec<&str> = topic.split('/').collect();
        self.exact_and_descendants.iter().any(|pattern_segments| {
            if pattern_segments.len() > topic_segments.len() {
                return false;
            }
            pattern_segments
                .iter()
                .zip(topic_segments.iter())
                .all(|(pat, seg)| segment_matches(pat, seg))
        })
    }
}

fn segment_matches(pattern: &str, segment: &str) -> bool {
    Glob::new(pattern)
        .map(|g| g.compile_matcher().is_match(segment))
        .unwrap_or(pattern == segment)
}

struct TopicEntry {
    record: i3x_model::Record,
    topic: String,
}

struct Inner {
    config: MqttConfig,
    exclusions: ExclusionFilter,
    cache: RwLock<AHashMap<String, TopicEntry>>,
    client: RwLock<Option<AsyncClient>>,
    running: AtomicBool,
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn name_from_topic(topic: &str) -> String {
        topic.rsplit('/').next().unwrap_or(topic).to_string()
    }

    fn synthesize_instance(&self, element_id: &str, entry: &TopicEntry) -> ObjectInstance {
        let cache = self.cache.read();
        let mut parent_id = ROOT_PARENT_ID.to_string();
        let mut children = Vec::new();
        for (other_id, other) in cache.iter() {
            if other_id == element_id {
                continue;
            }
            if is_direct_child(&other.topic, &entry.topic) {
                parent_id = other_id.clone();
            }
            if is_direct_child(&entry.topic, &other.topic) {
                children.push(other_id.clone());
            }
        }
        let mut instance = ObjectInstance::new(
            element_id,
            Self::name_from_topic(&entry.topic),
            MQTT_NS,
            format!("{element_id}-type"),
            parent_id,
            false,
        );
        if !children.is_empty() {
            children.sort();
            instance
                .relationships
                .insert(REL_HAS_CHILDREN.to_string(), RelationshipValue::Many(children));
        }
        if instance.parent_id != ROOT_PARENT_ID {
            instance
                .relationships
                .insert(REL_HAS_PARENT.to_string(), RelationshipValue::Single(instance.parent_id.clone()));
        }
        instance
    }

    fn handle_message(&self, topic: &str, payload: &[u8], on_update: &OnUpdate) {
        if self.exclusions.excludes(topic) {
            return;
        }
        let value: Value = serde_json::from_slice(payload)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(payload).to_string()));
        let element_id = topic_to_element_id(topic);
        let record = i3x_model::Record::now(value);
        let entry = TopicEntry {
            record: record.clone(),
            topic: topic.to_string(),
        };
        self.cache.write().insert(element_id.clone(), entry);
        let instance = {
            let cache = self.cache.read();
            let entry = cache.get(&element_id).expect("just inserted");
            self.synthesize_instance(&element_id, entry)
        };
        on_update(instance, record);
    }
}

/// The MQTT data-source adapter (spec.md §4.3). Supports reads and
/// subscriptions; history is `Unsupported`.
#[derive(Clone)]
pub struct MqttSource(std::sync::Arc<Inner>);

impl MqttSource {
    pub fn new(config: MqttConfig) -> Self {
        let exclusions = ExclusionFilter::new(&config.excluded_topics);
        Self(std::sync::Arc::new(Inner {
            config,
            exclusions,
            cache: RwLock::new(AHashMap::new()),
            client: RwLock::new(None),
            running: AtomicBool::new(false),
            task: parking_lot::Mutex::new(None),
        }))
    }

    fn instance_for(&self, element_id: &str) -> Option<ObjectInstance> {
        let cache = self.0.cache.read();
        let entry = cache.get(element_id)?;
        Some(self.0.synthesize_instance(element_id, entry))
    }
}

#[async_trait]
impl DataSource for MqttSource {
    async fn start(&self, on_update: OnUpdate) -> Result<(), DataSourceError> {
        if self.0.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut opts = MqttOptions::new(&self.0.config.client_id, &self.0.config.host, self.0.config.port);
        opts.set_keep_alive(std::time::Duration::from_secs(60));
        let (client, mut event_loop) = AsyncClient::new(opts, 256);

        for topic in &self.0.config.topics {
            client
                .subscribe(topic, QoS::AtMostOnce)
                .await
                .map_err(|e| DataSourceError::ConnectError(e.to_string()))?;
            info!(%topic, "subscribed to MQTT topic");
        }
        *self.0.client.write() = Some(client);

        let inner = self.0.clone();
        let handle = tokio::spawn(async move {
            loop {
                if !inner.running.load(Ordering::SeqCst) {
                    break;
                }
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        inner.handle_message(&publish.topic, &publish.payload, &on_update);
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(error = %err, "MQTT event loop error, retrying");
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    }
                }
            }
        });
        *self.0.task.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self) -> Result<(), DataSourceError> {
        if !self.0.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(client) = self.0.client.write().take() {
            let _ = client.disconnect().await;
        }
        if let Some(handle) = self.0.task.lock().take() {
            handle.abort();
        }
        self.0.cache.write().clear();
        Ok(())
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, DataSourceError> {
        Ok(vec![Namespace::new(MQTT_NS, "MQTT")])
    }

    async fn list_object_types(&self, namespace_uri: Option<&str>) -> Result<Vec<ObjectType>, DataSourceError> {
        if namespace_uri.is_some_and(|ns| ns != MQTT_NS) {
            return Ok(Vec::new());
        }
        let cache = self.0.cache.read();
        Ok(cache
            .iter()
            .map(|(element_id, entry)| {
                ObjectType::new(
                    format!("{element_id}-type"),
                    format!("{}Type", Inner::name_from_topic(&entry.topic)),
                    MQTT_NS,
                    i3x_model::schema::infer_schema(&entry.record.value),
                )
            })
            .collect())
    }

    async fn get_object_type(&self, element_id: &str) -> Result<ObjectType, DataSourceError> {
        let type_id = element_id.strip_suffix("-type").unwrap_or(element_id);
        let cache = self.0.cache.read();
        let entry = cache.get(type_id).ok_or_else(|| DataSourceError::not_found(element_id))?;
        Ok(ObjectType::new(
            format!("{type_id}-type"),
            format!("{}Type", Inner::name_from_topic(&entry.topic)),
            MQTT_NS,
            i3x_model::schema::infer_schema(&entry.record.value),
        ))
    }

    async fn list_relationship_types(
        &self,
        namespace_uri: Option<&str>,
    ) -> Result<Vec<RelationshipType>, DataSourceError> {
        if namespace_uri.is_some_and(|ns| ns != MQTT_NS) {
            return Ok(Vec::new());
        }
        Ok(vec![
            RelationshipType::new(REL_HAS_PARENT, "HasParent", MQTT_NS, REL_HAS_CHILDREN),
            RelationshipType::new(REL_HAS_CHILDREN, "HasChildren", MQTT_NS, REL_HAS_PARENT),
        ])
    }

    async fn get_relationship_type(&self, element_id: &str) -> Result<RelationshipType, DataSourceError> {
        match element_id {
            REL_HAS_PARENT => Ok(RelationshipType::new(REL_HAS_PARENT, "HasParent", MQTT_NS, REL_HAS_CHILDREN)),
            REL_HAS_CHILDREN => Ok(RelationshipType::new(REL_HAS_CHILDREN, "HasChildren", MQTT_NS, REL_HAS_PARENT)),
            other => Err(DataSourceError::not_found(other)),
        }
    }

    async fn list_instances(&self, type_id: Option<&str>) -> Result<Vec<ObjectInstance>, DataSourceError> {
        let cache = self.0.cache.read();
        Ok(cache
            .keys()
            .filter_map(|id| self.instance_for(id))
            .filter(|i| type_id.map(|t| i.type_id == t).unwrap_or(true))
            .collect())
    }

    async fn get_instance(&self, element_id: &str, with_records: bool) -> Result<ObjectInstance, DataSourceError> {
        let mut instance = self
            .instance_for(element_id)
            .ok_or_else(|| DataSourceError::not_found(element_id))?;
        if with_records {
            let cache = self.0.cache.read();
            if let Some(entry) = cache.get(element_id) {
                instance.records = Some(vec![entry.record.clone()]);
            }
        }
        Ok(instance)
    }

    async fn get_related_instances(
        &self,
        element_id: &str,
        relationship_type: Option<&str>,
    ) -> Result<Vec<ObjectInstance>, DataSourceError> {
        let instance = self
            .instance_for(element_id)
            .ok_or_else(|| DataSourceError::not_found(element_id))?;
        let ids = instance.related_ids(relationship_type);
        Ok(ids.iter().filter_map(|id| self.instance_for(id)).collect())
    }

    async fn get_values(
        &self,
        element_id: &str,
        start: Option<&str>,
        end: Option<&str>,
        _max_depth: u32,
        return_history: bool,
    ) -> Result<Value, DataSourceError> {
        if start.is_some() || end.is_some() || return_history {
            return Err(DataSourceError::Unsupported("MQTT adapter does not retain history".into()));
        }
        let cache = self.0.cache.read();
        let entry = cache.get(element_id).ok_or_else(|| DataSourceError::not_found(element_id))?;
        Ok(serde_json::json!({
            "value": entry.record.value,
            "quality": entry.record.quality.as_str(),
            "timestamp": entry.record.timestamp,
        }))
    }

    async fn update_value(&self, element_id: &str, new_value: Value) -> Result<UpdateOutcome, DataSourceError> {
        let topic = {
            let cache = self.0.cache.read();
            cache
                .get(element_id)
                .map(|e| e.topic.clone())
                .unwrap_or_else(|| element_id_to_topic(element_id))
        };
        let client = self.0.client.read();
        let Some(client) = client.as_ref() else {
            return Err(DataSourceError::TransientError("MQTT client not started".into()));
        };
        let payload = serde_json::to_vec(&new_value)
            .map_err(|e| DataSourceError::ValidationError(format!("failed to encode payload: {e}")))?;
        client
            .publish(&topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| DataSourceError::TransientError(e.to_string()))?;
        Ok(UpdateOutcome::ok(element_id))
    }

    async fn list_all_instances(&self) -> Result<Vec<ObjectInstance>, DataSourceError> {
        let cache = self.0.cache.read();
        Ok(cache.keys().filter_map(|id| self.instance_for(id)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_to_element_id_replaces_slashes() {
        assert_eq!(topic_to_element_id("plant/line1/sensor"), "plant_line1_sensor");
    }

    #[test]
    fn direct_child_requires_exactly_one_extra_segment() {
        assert!(is_direct_child("a/b", "a/b/c"));
        assert!(!is_direct_child("a/b", "a/b/c/d"));
        assert!(!is_direct_child("a/b", "a/x"));
    }

    #[test]
    fn exclusion_filter_matches_prefix_hierarchy() {
        let filter = ExclusionFilter::new(&["a/b".to_string()]);
        assert!(filter.excludes("a/b"));
        assert!(filter.excludes("a/b/c"));
        assert!(!filter.excludes("a/c"));
    }

    #[tokio::test]
    async fn handle_message_falls_back_to_raw_string() {
        let source = MqttSource::new(MqttConfig {
            host: "localhost".into(),
            port: 1883,
            topics: vec!["plant/sensor".into()],
            excluded_topics: vec![],
            client_id: "test".into(),
        });
        let on_update: OnUpdate = std::sync::Arc::new(|_, _| {});
        source.0.handle_message("plant/sensor", b"not-json", &on_update);
        let value = source.get_values("plant_sensor", None, None, 1, false).await.unwrap();
        assert_eq!(value["value"], serde_json::json!("not-json"));
    }

    #[tokio::test]
    async fn excluded_topic_never_enters_cache() {
        let source = MqttSource::new(MqttConfig {
            host: "localhost".into(),
            port: 1883,
            topics: vec!["plant/#".into()],
            excluded_topics: vec!["plant/secret".into()],
            client_id: "test".into(),
        });
        let on_update: OnUpdate = std::sync::Arc::new(|_, _| {});
        source.0.handle_message("plant/secret", b"1", &on_update);
        assert!(source.get_values("plant_secret", None, None, 1, false).await.is_err());
    }
}
