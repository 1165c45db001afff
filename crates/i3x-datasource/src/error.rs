use thiserror::Error;

/// The typed failure set every [`crate::DataSource`] operation signals
/// (spec.md §4.2, §4.8).
#[derive(Debug, Error, Clone)]
pub enum DataSourceError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("transient error: {0}")]
    TransientError(String),
    #[error("connect error: {0}")]
    ConnectError(String),
}

impl DataSourceError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    /// `true` for errors that must not be retried against a fallback
    /// source — absence from the configured source is authoritative
    /// (spec.md §4.4).
    pub fn is_authoritative_absence(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<i3x_model::schema::SchemaMismatch> for DataSourceError {
    fn from(e: i3x_model::schema::SchemaMismatch) -> Self {
        Self::ValidationError(e.to_string())
    }
}

impl From<i3x_store::StoreError> for DataSourceError {
    fn from(e: i3x_store::StoreError) -> Self {
        match e {
            i3x_store::StoreError::NotFound(id) => Self::NotFound(id),
            i3x_store::StoreError::EmptyHistory(id) => Self::NotFound(id),
        }
    }
}
