//! API error mapping

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use subspend_core::SubscriptionError;
use thiserror::Error;

use crate::models::ErrorResponse;

/// Errors returned by handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Error from the subscription core
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    /// Request could not be extracted (body, path or query)
    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Subscription(SubscriptionError::Validation(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Subscription(SubscriptionError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Subscription(SubscriptionError::Storage(_) | SubscriptionError::Timeout(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self.status_code() {
            StatusCode::BAD_REQUEST => "validation_error",
            StatusCode::NOT_FOUND => "not_found",
            _ => "storage_error",
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Subscription(SubscriptionError::Storage(_) | SubscriptionError::Timeout(_)) => {
                "internal storage error".to_string()
            }
            Self::Subscription(SubscriptionError::Validation(message)) => message.clone(),
            Self::Subscription(SubscriptionError::NotFound(_)) => "Subscription not found".to_string(),
            Self::BadRequest(message) => message.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Result type for handlers
pub type ApiResult<T> = Result<T, ApiError>;
