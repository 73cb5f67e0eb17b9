//! Admin error handling.
//!
//! Same shape as the storefront's `AppError`: commerce rejections keep
//! their reason codes, server faults are captured to Sentry and reduced to
//! generic messages.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use clementine_commerce::CommerceError;

/// Application-level error type for the admin binary.
#[derive(Debug, Error)]
pub enum AppError {
    /// Commerce service rejection or failure.
    #[error(transparent)]
    Commerce(#[from] CommerceError),

    /// Missing or wrong bearer token.
    #[error("Unauthorized")]
    Unauthorized,

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Commerce(err) => match err {
                CommerceError::InvalidTransition(_) => StatusCode::CONFLICT,
                CommerceError::OrderNotFound(_) => StatusCode::NOT_FOUND,
                CommerceError::Forbidden => StatusCode::FORBIDDEN,
                CommerceError::Store(_) | CommerceError::Catalog(_) | CommerceError::Payment(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            },
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn reason_code(&self) -> &'static str {
        match self {
            Self::Commerce(err) => err.code(),
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest(_) => "BAD_REQUEST",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(
            self,
            Self::Commerce(
                CommerceError::Store(_) | CommerceError::Catalog(_) | CommerceError::Payment(_)
            )
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(error = %self, sentry_event_id = %event_id, "Request error");
        }

        let message = match &self {
            Self::Commerce(
                CommerceError::Store(_) | CommerceError::Catalog(_) | CommerceError::Payment(_),
            ) => "Service temporarily unavailable, please try again".to_string(),
            other => other.to_string(),
        };

        let body = serde_json::json!({
            "error": self.reason_code(),
            "message": message,
        });
        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
