use std::sync::Arc;

use i3x_graph::QueryEngine;
use i3x_model::{ObjectInstance, Quality, Record, Value};
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::error::SubscriptionError;
use crate::subscription::{Qos, Subscription};

/// Lifecycle-tracked count returned from register/unregister, mirroring the
/// reference prototype's "registered N items" acknowledgement.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MonitoredItemsOutcome {
    #[serde(rename = "registeredCount")]
    pub registered_count: usize,
    #[serde(rename = "monitoredItemCount")]
    pub monitored_item_count: usize,
}

/// The subscription engine (C6): lifecycle, monitored-item expansion, and
/// QoS0/QoS2 update fan-out (spec.md §4.6). Holds the small, process-wide
/// subscription registry; guarded by a single coarse lock since the set of
/// live subscriptions is expected to be small (spec.md §5).
pub struct SubscriptionEngine {
    graph: QueryEngine,
    subscriptions: RwLock<Vec<Arc<Subscription>>>,
}

impl SubscriptionEngine {
    pub fn new(graph: QueryEngine) -> Self {
        Self {
            graph,
            subscriptions: RwLock::new(Vec::new()),
        }
    }

    fn find(&self, id: &str) -> Result<Arc<Subscription>, SubscriptionError> {
        self.subscriptions
            .read()
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| SubscriptionError::NotFound(id.to_string()))
    }

    /// Create a subscription with the given QoS string; the server assigns
    /// an opaque id (spec.md §4.6 operation 1).
    pub fn create(&self, qos: &str) -> Result<String, SubscriptionError> {
        let qos = Qos::parse(qos)?;
        let id = uuid::Uuid::new_v4().to_string();
        let subscription = Arc::new(Subscription::new(id.clone(), qos));
        self.subscriptions.write().push(subscription);
        Ok(id)
    }

    /// Register monitored items (spec.md §4.6 operation 2). Every root id
    /// must resolve or nothing is mutated (atomic, no partial
    /// registration).
    pub async fn register(
        &self,
        subscription_id: &str,
        root_ids: &[String],
        max_depth: u32,
    ) -> Result<MonitoredItemsOutcome, SubscriptionError> {
        let subscription = self.find(subscription_id)?;

        // Validate every root resolves before mutating anything.
        for root in root_ids {
            self.graph.source().get_instance(root, false).await?;
        }

        let mut union: std::collections::HashSet<String> = std::collections::HashSet::new();
        for root in root_ids {
            let tree = self.graph.expand_instance_tree(root, max_depth).await?;
            union.extend(tree);
        }

        subscription.set_max_depth(max_depth);
        let registered_count = union.len();
        subscription.add_monitored(union);
        Ok(MonitoredItemsOutcome {
            registered_count,
            monitored_item_count: subscription.monitored_items().len(),
        })
    }

    /// Unregister monitored items (spec.md §4.6 operation 3). Unknown root
    /// ids are silently ignored rather than failing the whole call.
    pub async fn unregister(
        &self,
        subscription_id: &str,
        root_ids: &[String],
        max_depth: u32,
    ) -> Result<MonitoredItemsOutcome, SubscriptionError> {
        let subscription = self.find(subscription_id)?;
        for root in root_ids {
            if let Ok(tree) = self.graph.expand_instance_tree(root, max_depth).await {
                subscription.remove_monitored(&tree);
            }
        }
        Ok(MonitoredItemsOutcome {
            registered_count: 0,
            monitored_item_count: subscription.monitored_items().len(),
        })
    }

    /// Open (or reuse) the QoS0 delivery channel (spec.md §4.6 operation 4).
    pub fn open_stream(&self, subscription_id: &str) -> Result<mpsc::Receiver<Value>, SubscriptionError> {
        self.find(subscription_id)?.open_stream()
    }

    /// Atomically snapshot and clear the QoS2 pending queue (spec.md §4.6
    /// operation 5).
    pub fn sync(&self, subscription_id: &str) -> Result<Vec<Value>, SubscriptionError> {
        self.find(subscription_id)?.sync()
    }

    /// Remove the subscription, closing its delivery channel if any
    /// (spec.md §4.6 operation 6).
    pub fn delete(&self, subscription_id: &str) -> Result<(), SubscriptionError> {
        let mut subscriptions = self.subscriptions.write();
        let index = subscriptions
            .iter()
            .position(|s| s.id == subscription_id)
            .ok_or_else(|| SubscriptionError::NotFound(subscription_id.to_string()))?;
        let subscription = subscriptions.remove(index);
        subscription.close_stream();
        Ok(())
    }

    /// Update dispatch (spec.md §4.6 "Update dispatch"): called from the
    /// data source's `onUpdate` callback (forwarded through the manager).
    /// Never panics — a failure projecting one subscription's payload is
    /// logged and the rest still receive their update (spec.md §7).
    pub async fn dispatch(&self, instance: ObjectInstance, record: Record) {
        let live: Vec<Arc<Subscription>> = self
            .subscriptions
            .read()
            .iter()
            .filter(|s| s.is_monitoring(&instance.element_id))
            .cloned()
            .collect();
        if live.is_empty() {
            return;
        }

        for subscription in live {
            let payload = match self
                .graph
                .get_values(&instance.element_id, None, None, subscription.max_depth(), false)
                .await
            {
                Ok(value) => build_payload(&instance.element_id, value, &record),
                Err(err) => {
                    tracing::warn!(
                        element_id = %instance.element_id,
                        subscription = %subscription.id,
                        error = %err,
                        "failed to project subscription delivery payload",
                    );
                    continue;
                }
            };
            subscription.deliver(payload);
        }
    }
}

fn build_payload(element_id: &str, value: Value, record: &Record) -> Value {
    serde_json::json!({
        "elementId": element_id,
        "value": value,
        "quality": quality_str(&record.quality),
        "timestamp": record.timestamp,
    })
}

fn quality_str(quality: &Quality) -> &str {
    quality.as_str()
}
