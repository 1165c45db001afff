use thiserror::Error;

/// The typed failure set the subscription engine signals (spec.md §4.8).
#[derive(Debug, Error, Clone)]
pub enum SubscriptionError {
    #[error("subscription not found: {0}")]
    NotFound(String),
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl From<i3x_datasource::DataSourceError> for SubscriptionError {
    fn from(e: i3x_datasource::DataSourceError) -> Self {
        match e {
            i3x_datasource::DataSourceError::NotFound(id) => Self::NotFound(id),
            other => Self::ValidationError(other.to_string()),
        }
    }
}
