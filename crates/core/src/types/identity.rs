//! Cart identity: who a cart belongs to.
//!
//! Every cart request resolves to exactly one `CartIdentity` at the boundary;
//! nothing downstream re-derives it from cookies or session state.

use serde::{Deserialize, Serialize};

use super::id::{GuestToken, UserId};

/// The owner of a cart: an anonymous guest or an authenticated user.
///
/// Exactly one cart exists per identity at any time. A guest identity is
/// created lazily on the first cart mutation; a user identity follows the
/// authenticated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CartIdentity {
    /// Anonymous cart, keyed by an opaque client-held token.
    Guest(GuestToken),
    /// Authenticated user's cart.
    User(UserId),
}

impl CartIdentity {
    /// Stable storage key for this identity, used by store backends.
    #[must_use]
    pub fn storage_key(&self) -> String {
        match self {
            Self::Guest(token) => format!("guest:{token}"),
            Self::User(id) => format!("user:{id}"),
        }
    }

    /// Whether this is a guest identity.
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        matches!(self, Self::Guest(_))
    }

    /// The user id, if this is a user identity.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::Guest(_) => None,
        }
    }
}

impl std::fmt::Display for CartIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

impl std::str::FromStr for CartIdentity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("guest", token)) => token
                .parse()
                .map(Self::Guest)
                .map_err(|e| format!("invalid guest token: {e}")),
            Some(("user", id)) => id
                .parse::<i32>()
                .map(|id| Self::User(UserId::new(id)))
                .map_err(|e| format!("invalid user id: {e}")),
            _ => Err(format!("invalid cart identity key: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_keys_do_not_collide() {
        let guest = CartIdentity::Guest(GuestToken::generate());
        let user = CartIdentity::User(UserId::new(42));
        assert_ne!(guest.storage_key(), user.storage_key());
        assert!(user.storage_key().starts_with("user:"));
        assert!(guest.storage_key().starts_with("guest:"));
    }

    #[test]
    fn test_storage_key_roundtrip() {
        let guest = CartIdentity::Guest(GuestToken::generate());
        let user = CartIdentity::User(UserId::new(42));
        for identity in [guest, user] {
            let parsed: CartIdentity = identity.storage_key().parse().expect("roundtrip");
            assert_eq!(parsed, identity);
        }
        assert!("admin:1".parse::<CartIdentity>().is_err());
    }

    #[test]
    fn test_user_id_accessor() {
        let user = CartIdentity::User(UserId::new(5));
        assert_eq!(user.user_id(), Some(UserId::new(5)));
        assert!(!user.is_guest());

        let guest = CartIdentity::Guest(GuestToken::generate());
        assert_eq!(guest.user_id(), None);
        assert!(guest.is_guest());
    }
}
