//! Session-related types.
//!
//! Types stored in the session: the authenticated user identity supplied by
//! the external identity provider, and the opaque guest cart token.

use serde::{Deserialize, Serialize};

use clementine_core::UserId;

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user. The
/// identity provider has already verified it; this side only carries it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's id as issued by the identity provider.
    pub id: UserId,
}

/// Session keys for cart and authentication data.
pub mod session_keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the opaque guest cart token. Removed when the guest cart is
    /// merged into the user cart on login.
    pub const GUEST_CART_TOKEN: &str = "guest_cart_token";
}
