//! The external HTTP/JSON boundary (C7, spec.md §6): a thin axum routing
//! layer over the graph and subscription engines. No business logic lives
//! here — every handler parses its request, calls through to `i3x-graph`
//! or `i3x-subscriptions`, and maps the typed result back to JSON or an
//! HTTP status code.

mod error;
mod router;
mod routes;
mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
