//! Payment provider collaborator.
//!
//! The provider mints an authorization handle scoped to the cart total; the
//! client confirms the payment out-of-band; this side asks the provider for
//! the handle's status and treats provider-reported success as the sole
//! trigger for order commit.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use clementine_core::{AuthorizationHandle, Price};

/// Provider-reported state of an authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Authorization issued, payment not yet confirmed.
    Pending,
    /// Payment captured.
    Succeeded,
    /// Payment failed or was voided.
    Failed,
}

/// Payment provider failure.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("unknown authorization: {0}")]
    UnknownAuthorization(AuthorizationHandle),

    #[error("payment request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("payment provider returned status {0}")]
    Status(u16),

    #[error("payment response invalid: {0}")]
    Decode(String),
}

/// External payment provider interface.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Request an authorization scoped to `amount`.
    async fn create_authorization(&self, amount: Price)
    -> Result<AuthorizationHandle, PaymentError>;

    /// Provider-reported status for an authorization.
    async fn status(&self, handle: &AuthorizationHandle) -> Result<PaymentStatus, PaymentError>;
}

// =============================================================================
// HTTP client
// =============================================================================

#[derive(Debug, Deserialize)]
struct AuthorizationResponse {
    handle: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: PaymentStatus,
}

/// JSON client for the payment provider.
pub struct HttpPaymentProvider {
    client: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
}

impl HttpPaymentProvider {
    #[must_use]
    pub const fn new(client: reqwest::Client, base_url: Url, api_key: SecretString) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, PaymentError> {
        self.base_url
            .join(path)
            .map_err(|e| PaymentError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PaymentProvider for HttpPaymentProvider {
    async fn create_authorization(
        &self,
        amount: Price,
    ) -> Result<AuthorizationHandle, PaymentError> {
        let response = self
            .client
            .post(self.endpoint("authorizations")?)
            .bearer_auth(self.api_key.expose_secret())
            .json(&serde_json::json!({
                "amount": amount.amount,
                "currency": amount.currency_code.code(),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PaymentError::Status(response.status().as_u16()));
        }

        let body: AuthorizationResponse = response.json().await?;
        Ok(AuthorizationHandle::new(body.handle))
    }

    async fn status(&self, handle: &AuthorizationHandle) -> Result<PaymentStatus, PaymentError> {
        let response = self
            .client
            .get(self.endpoint(&format!("authorizations/{handle}"))?)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PaymentError::UnknownAuthorization(handle.clone()));
        }
        if !response.status().is_success() {
            return Err(PaymentError::Status(response.status().as_u16()));
        }

        let body: StatusResponse = response.json().await?;
        Ok(body.status)
    }
}

// =============================================================================
// Fake provider (tests, local dev)
// =============================================================================

/// In-memory provider that mints sequential handles. Authorizations start
/// `Pending`; tests flip them with [`FakePaymentProvider::report`].
#[derive(Debug, Default)]
pub struct FakePaymentProvider {
    counter: AtomicU64,
    statuses: RwLock<HashMap<String, PaymentStatus>>,
}

impl FakePaymentProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the out-of-band confirmation for a handle.
    pub fn report(&self, handle: &AuthorizationHandle, status: PaymentStatus) {
        let mut statuses = self
            .statuses
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        statuses.insert(handle.as_str().to_owned(), status);
    }
}

#[async_trait]
impl PaymentProvider for FakePaymentProvider {
    async fn create_authorization(
        &self,
        _amount: Price,
    ) -> Result<AuthorizationHandle, PaymentError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = AuthorizationHandle::new(format!("auth_{n:06}"));
        let mut statuses = self
            .statuses
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        statuses.insert(handle.as_str().to_owned(), PaymentStatus::Pending);
        Ok(handle)
    }

    async fn status(&self, handle: &AuthorizationHandle) -> Result<PaymentStatus, PaymentError> {
        let statuses = self
            .statuses
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        statuses
            .get(handle.as_str())
            .copied()
            .ok_or_else(|| PaymentError::UnknownAuthorization(handle.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clementine_core::CurrencyCode;
    use rust_decimal::dec;

    #[tokio::test]
    async fn test_fake_provider_lifecycle() {
        let provider = FakePaymentProvider::new();
        let amount = Price::new(dec!(42.00), CurrencyCode::USD);

        let handle = provider.create_authorization(amount).await.expect("handle");
        assert_eq!(
            provider.status(&handle).await.expect("status"),
            PaymentStatus::Pending
        );

        provider.report(&handle, PaymentStatus::Succeeded);
        assert_eq!(
            provider.status(&handle).await.expect("status"),
            PaymentStatus::Succeeded
        );
    }

    #[tokio::test]
    async fn test_fake_provider_unknown_handle() {
        let provider = FakePaymentProvider::new();
        let err = provider
            .status(&AuthorizationHandle::new("auth_nope"))
            .await
            .expect_err("unknown");
        assert!(matches!(err, PaymentError::UnknownAuthorization(_)));
    }
}
