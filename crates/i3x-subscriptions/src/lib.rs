//! The subscription engine (C6): subscription lifecycle, monitored-item
//! set expansion, update fan-out, and the two delivery modes — QoS0
//! (at-most-once push) and QoS2 (at-least-once pull-with-acknowledge)
//! (spec.md §4.6), grounded in the reference prototype's
//! `routers/subscriptions.py` (`Subscription` model, `create_subscription`,
//! `register_monitored_items`, `sync_qos2`, `handle_data_source_update`).

mod engine;
mod error;
mod subscription;

pub use engine::{MonitoredItemsOutcome, SubscriptionEngine};
pub use error::SubscriptionError;
pub use subscription::Qos;
