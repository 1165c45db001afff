//! The I3X object graph: namespaces, object types, relationship types,
//! instances, and their value records.
//!
//! This crate only defines data — no I/O, no async, no trait objects. The
//! pluggable data-source abstraction lives in `i3x-datasource`; the query
//! and subscription engines built on top of this model live in
//! `i3x-graph` and `i3x-subscriptions`.

mod instance;
mod namespace;
mod object_type;
mod quality;
mod record;
mod relationship_type;
pub mod schema;
pub mod time;

pub use instance::{ObjectInstance, RelationshipValue};
pub use namespace::Namespace;
pub use object_type::ObjectType;
pub use quality::Quality;
pub use record::Record;
pub use relationship_type::RelationshipType;

/// A structurally-typed record value. I3X payloads are arbitrary JSON trees
/// constrained only by an [`ObjectType`]'s schema.
pub type Value = serde_json::Value;

/// The sentinel `parentId` meaning "this instance has no parent" (root).
pub const ROOT_PARENT_ID: &str = "/";

/// Canonical composition edge names (spec.md §9, edge-name dialect decision).
pub const REL_HAS_COMPONENT: &str = "HasComponent";
pub const REL_COMPONENT_OF: &str = "ComponentOf";

/// Canonical plain-hierarchy edge names.
pub const REL_HAS_CHILDREN: &str = "HasChildren";
pub const REL_HAS_PARENT: &str = "HasParent";

/// The reserved key under which an instance's own projection is nested when
/// recursive value retrieval produces a composite mapping (spec.md §4.5).
pub const OWN_VALUE_KEY: &str = "_value";
