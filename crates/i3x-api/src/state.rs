use std::sync::Arc;

use i3x_graph::QueryEngine;
use i3x_subscriptions::SubscriptionEngine;

/// Shared handles every handler reaches through — the query engine for
/// reads/writes, the subscription engine for C6 operations. Cheap to
/// clone: both inner types are themselves `Arc`-backed or hold only an
/// `Arc<dyn DataSource>`.
#[derive(Clone)]
pub struct AppState {
    pub graph: QueryEngine,
    pub subscriptions: Arc<SubscriptionEngine>,
}

impl AppState {
    pub fn new(graph: QueryEngine, subscriptions: Arc<SubscriptionEngine>) -> Self {
        Self { graph, subscriptions }
    }
}
