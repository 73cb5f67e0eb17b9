//! Sentry-backed alert sink.
//!
//! Reconciliation failures mean money moved without a matching order. They
//! are captured as standalone Sentry events at error level, tagged so the
//! on-call alert rule can page on them, and never mixed in with ordinary
//! validation noise.

use async_trait::async_trait;

use clementine_commerce::notify::AlertSink;
use clementine_commerce::store::StoreError;
use clementine_core::{AuthorizationHandle, CartIdentity};

/// Alert sink that reports to Sentry and the error log.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentryAlertSink;

#[async_trait]
impl AlertSink for SentryAlertSink {
    async fn reconciliation_failure(
        &self,
        handle: &AuthorizationHandle,
        identity: &CartIdentity,
        error: &StoreError,
    ) {
        sentry::with_scope(
            |scope| {
                scope.set_tag("alert", "reconciliation_failure");
                scope.set_tag("authorization", handle.to_string());
                scope.set_tag("cart_identity", identity.to_string());
            },
            || {
                sentry::capture_message(
                    &format!(
                        "reconciliation failure: payment {handle} captured but order creation failed: {error}"
                    ),
                    sentry::Level::Error,
                );
            },
        );

        tracing::error!(
            authorization = %handle,
            identity = %identity,
            error = %error,
            "reconciliation failure: payment captured but order creation failed"
        );
    }
}
