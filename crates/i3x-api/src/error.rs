use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// The HTTP boundary's error type: every typed failure from the graph or
/// subscription engines collapses into one of these before it reaches a
/// handler's `Result`, per spec.md §6/§7's kind-to-status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("transient error: {0}")]
    TransientError(String),
    #[error("connect error: {0}")]
    ConnectError(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            Self::TransientError(_) => StatusCode::BAD_GATEWAY,
            Self::ConnectError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<i3x_datasource::DataSourceError> for ApiError {
    fn from(e: i3x_datasource::DataSourceError) -> Self {
        use i3x_datasource::DataSourceError as E;
        match e {
            E::NotFound(id) => Self::NotFound(id),
            E::ValidationError(msg) => Self::ValidationError(msg),
            E::Unsupported(msg) => Self::Unsupported(msg),
            E::TransientError(msg) => Self::TransientError(msg),
            E::ConnectError(msg) => Self::ConnectError(msg),
        }
    }
}

impl From<i3x_subscriptions::SubscriptionError> for ApiError {
    fn from(e: i3x_subscriptions::SubscriptionError) -> Self {
        use i3x_subscriptions::SubscriptionError as E;
        match e {
            E::NotFound(id) => Self::NotFound(id),
            E::ValidationError(msg) => Self::ValidationError(msg),
            E::UnsupportedOperation(msg) => Self::Unsupported(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
