use std::collections::{HashSet, VecDeque};

use i3x_model::Value;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use crate::error::SubscriptionError;

/// Quality-of-service mode a subscription is created with (spec.md §4.6).
/// Only these two values are accepted at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Qos {
    #[serde(rename = "QoS0")]
    Qos0,
    #[serde(rename = "QoS2")]
    Qos2,
}

impl Qos {
    pub fn parse(s: &str) -> Result<Self, SubscriptionError> {
        match s {
            "QoS0" => Ok(Self::Qos0),
            "QoS2" => Ok(Self::Qos2),
            other => Err(SubscriptionError::ValidationError(format!(
                "unsupported QoS `{other}`: only QoS0 and QoS2 are accepted"
            ))),
        }
    }
}

/// Bound on the QoS0 delivery channel. A full channel drops the update
/// rather than blocking the dispatcher (spec.md §5, §9): the portable
/// design here is `try_send` with silent drop-on-full, documented as the
/// chosen policy for spec.md §9's "dropping policy ... is
/// implementation-defined" open point.
const QOS0_CHANNEL_CAPACITY: usize = 256;

/// One subscription's state (spec.md §4.6): `{id, qos, createdAt, maxDepth,
/// monitoredItems, pendingQueue, deliveryHandle?}`.
pub struct Subscription {
    pub id: String,
    pub qos: Qos,
    pub created_at: String,
    max_depth: RwLock<u32>,
    monitored_items: RwLock<HashSet<String>>,
    pending_queue: Mutex<VecDeque<Value>>,
    delivery: RwLock<Option<mpsc::Sender<Value>>>,
}

impl Subscription {
    pub fn new(id: String, qos: Qos) -> Self {
        Self {
            id,
            qos,
            created_at: i3x_model::time::now_rfc3339(),
            max_depth: RwLock::new(1),
            monitored_items: RwLock::new(HashSet::new()),
            pending_queue: Mutex::new(VecDeque::new()),
            delivery: RwLock::new(None),
        }
    }

    pub fn max_depth(&self) -> u32 {
        *self.max_depth.read()
    }

    pub fn set_max_depth(&self, depth: u32) {
        *self.max_depth.write() = depth;
    }

    pub fn is_monitoring(&self, element_id: &str) -> bool {
        let items = self.monitored_items.read();
        !items.is_empty() && items.contains(element_id)
    }

    pub fn add_monitored(&self, ids: impl IntoIterator<Item = String>) {
        self.monitored_items.write().extend(ids);
    }

    pub fn remove_monitored(&self, ids: &[String]) {
        let mut items = self.monitored_items.write();
        for id in ids {
            items.remove(id);
        }
    }

    pub fn monitored_items(&self) -> HashSet<String> {
        self.monitored_items.read().clone()
    }

    /// Open (or reuse) the QoS0 delivery channel, returning the receiving
    /// half for the caller to stream to the wire. `mpsc::Receiver` has a
    /// single consumer, so "reuse" can't mean handing back the same
    /// receiver object while one is already live (spec.md §4.6 operation 4):
    /// instead, opening again transparently replaces the subscription's
    /// delivery handle with a fresh channel. The previous stream observes
    /// its sender drop (recv resolves to `None`, as on delete) while the
    /// subscription itself, its monitored items, and its QoS stay live —
    /// the caller never has to delete and recreate the subscription just to
    /// get a new stream.
    pub fn open_stream(&self) -> Result<mpsc::Receiver<Value>, SubscriptionError> {
        if self.qos != Qos::Qos0 {
            return Err(SubscriptionError::UnsupportedOperation(
                "stream delivery is only supported for QoS0 subscriptions".into(),
            ));
        }
        let (tx, rx) = mpsc::channel(QOS0_CHANNEL_CAPACITY);
        *self.delivery.write() = Some(tx);
        Ok(rx)
    }

    pub fn close_stream(&self) {
        *self.delivery.write() = None;
    }

    /// Dispatch one update payload: push immediately (QoS0, dropped if no
    /// live handle) or append to the pending queue (QoS2) (spec.md §4.6).
    pub fn deliver(&self, payload: Value) {
        match self.qos {
            Qos::Qos0 => {
                let delivery = self.delivery.read();
                if let Some(tx) = delivery.as_ref() {
                    if tx.try_send(payload).is_err() {
                        tracing::debug!(subscription = %self.id, "QoS0 channel full or closed, dropping update");
                    }
                }
            }
            Qos::Qos2 => {
                self.pending_queue.lock().push_back(payload);
            }
        }
    }

    /// Atomically snapshot and clear the pending queue (QoS2 only).
    pub fn sync(&self) -> Result<Vec<Value>, SubscriptionError> {
        if self.qos != Qos::Qos2 {
            return Err(SubscriptionError::UnsupportedOperation(
                "sync is only supported for QoS2 subscriptions".into(),
            ));
        }
        let mut queue = self.pending_queue.lock();
        Ok(queue.drain(..).collect())
    }
}
