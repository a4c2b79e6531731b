use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use custvault_core::Error as CoreError;
use custvault_storage::StorageError;
use thiserror::Error;
use tracing::{error, warn};

/// Error returned by every handler.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct ApiError(#[from] StorageError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(StorageError::Core(err))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            StorageError::NotFound(_) => StatusCode::NOT_FOUND,
            StorageError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            StorageError::Core(CoreError::GatewayUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            StorageError::Core(CoreError::GatewayRejected(_)) => StatusCode::BAD_GATEWAY,
            // the customer endpoints have always answered bad input with 500
            StorageError::Core(CoreError::Validation(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            StorageError::Core(CoreError::Internal(_))
            | StorageError::Database(_)
            | StorageError::UnsupportedUrl(_)
            | StorageError::InvalidDatabaseName(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self.0 {
            StorageError::NotFound(_) | StorageError::Core(CoreError::Validation(_)) => {
                warn!(status = status.as_u16(), error = %self.0, "Request failed")
            }
            _ => error!(status = status.as_u16(), error = %self.0, "Request failed"),
        }

        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}
