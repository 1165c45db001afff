pub mod metadata;
pub mod objects;
pub mod subscriptions;
