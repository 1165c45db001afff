use thiserror::Error;

/// Failures surfaced by the record store itself — not to be confused with
/// the richer [`i3x_datasource`] error kinds, which wrap these for callers
/// at the data-source boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("no record history for `{0}`")]
    NotFound(String),
    #[error("`{0}` has no records to replace")]
    EmptyHistory(String),
}
