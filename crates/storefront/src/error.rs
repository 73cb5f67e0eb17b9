//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server faults to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`; commerce rejections keep their specific reason
//! codes, while internal failures are reduced to safe generic messages.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use clementine_commerce::CommerceError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Commerce service rejection or failure.
    #[error(transparent)]
    Commerce(#[from] CommerceError),

    /// Session read/write failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// User is not authenticated.
    #[error("Unauthorized")]
    Unauthorized,

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Commerce(err) => match err {
                CommerceError::QuantityCeiling { .. }
                | CommerceError::InsufficientStock { .. }
                | CommerceError::InvalidQuantity
                | CommerceError::InvalidShipping(_)
                | CommerceError::EmptyCart => StatusCode::UNPROCESSABLE_ENTITY,
                CommerceError::InvalidTransition(_) => StatusCode::CONFLICT,
                CommerceError::UnknownProduct(_) | CommerceError::OrderNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                CommerceError::Forbidden => StatusCode::FORBIDDEN,
                CommerceError::AttemptExpired(_) => StatusCode::GONE,
                CommerceError::PaymentNotConfirmed(_) => StatusCode::PAYMENT_REQUIRED,
                CommerceError::Store(_) | CommerceError::Catalog(_) | CommerceError::Payment(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                CommerceError::Reconciliation(_) | CommerceError::Pricing => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn reason_code(&self) -> &'static str {
        match self {
            Self::Commerce(err) => err.code(),
            Self::Session(_) | Self::Internal(_) => "INTERNAL",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest(_) => "BAD_REQUEST",
        }
    }

    /// Client-facing message. Validation and transition rejections keep
    /// their specific reason; server faults and reconciliation failures get
    /// a generic message that deliberately looks nothing like validation.
    fn client_message(&self) -> String {
        match self {
            Self::Commerce(err) => match err {
                CommerceError::Reconciliation(_) | CommerceError::Pricing => {
                    "Something went wrong, please contact support".to_string()
                }
                CommerceError::Store(_) | CommerceError::Catalog(_) | CommerceError::Payment(_) => {
                    "Service temporarily unavailable, please try again".to_string()
                }
                other => other.to_string(),
            },
            Self::Session(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Unauthorized => "Sign in to continue".to_string(),
            Self::BadRequest(msg) => msg.clone(),
        }
    }

    fn is_server_fault(&self) -> bool {
        matches!(
            self,
            Self::Internal(_)
                | Self::Session(_)
                | Self::Commerce(
                    CommerceError::Store(_)
                        | CommerceError::Catalog(_)
                        | CommerceError::Payment(_)
                        | CommerceError::Reconciliation(_)
                        | CommerceError::Pricing
                )
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server faults to Sentry; client rejections are expected
        // traffic and only logged at debug level.
        if self.is_server_fault() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = serde_json::json!({
            "error": self.reason_code(),
            "message": self.client_message(),
        });

        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use clementine_core::{AuthorizationHandle, OrderAction, OrderStatus};

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_rejection_status_codes() {
        assert_eq!(
            status_of(CommerceError::QuantityCeiling { limit: 10 }.into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(CommerceError::InsufficientStock { available: 0 }.into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(
                CommerceError::InvalidTransition(clementine_core::InvalidTransition {
                    from: OrderStatus::Shipped,
                    action: OrderAction::Approve,
                })
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(AppError::Unauthorized), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_reconciliation_is_generic_to_clients() {
        let err: AppError =
            CommerceError::Reconciliation(AuthorizationHandle::new("auth_1")).into();
        assert!(err.client_message().contains("contact support"));
        assert!(!err.client_message().contains("auth_1"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_validation_keeps_specific_message() {
        let err: AppError = CommerceError::InsufficientStock { available: 3 }.into();
        assert!(err.client_message().contains('3'));
        assert_eq!(err.reason_code(), "INSUFFICIENT_STOCK");
    }
}
