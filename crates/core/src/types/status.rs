//! Order status state machine.
//!
//! The transition table lives here, once, and every caller (storefront,
//! admin, services) goes through [`OrderStatus::apply`]. Client-reported
//! status values are never trusted; a transition is valid only if the stored
//! status matches the table's source state at commit time.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// Closed set; `cancelled` (admin-initiated) and `user_cancelled`
/// (customer-initiated) are kept distinct for audit trails even though their
/// downstream handling is identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    UserCancelled,
    ReturnRequested,
    Returned,
}

/// An action that drives an order through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    /// Admin approves a pending order for fulfillment.
    Approve,
    /// Admin cancels a pending order.
    Cancel,
    /// Customer cancels their own order.
    CustomerCancel,
    /// Fulfillment marks the order shipped.
    Ship,
    /// Fulfillment marks the order delivered.
    Deliver,
    /// Customer requests a return of a delivered order.
    RequestReturn,
    /// Admin approves a requested return; sets the refund date.
    ApproveReturn,
}

/// Who is allowed to trigger an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Customer,
    Admin,
}

impl OrderAction {
    /// The actor permitted to trigger this action. Enforced server-side.
    #[must_use]
    pub const fn actor(&self) -> Actor {
        match self {
            Self::Approve | Self::Cancel | Self::Ship | Self::Deliver | Self::ApproveReturn => {
                Actor::Admin
            }
            Self::CustomerCancel | Self::RequestReturn => Actor::Customer,
        }
    }
}

/// Rejected transition: the order's stored status does not permit the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition: cannot {action:?} an order in status {from:?}")]
pub struct InvalidTransition {
    /// Status the order was in when the action was attempted.
    pub from: OrderStatus,
    /// The rejected action.
    pub action: OrderAction,
}

impl OrderStatus {
    /// Apply an action, yielding the next status or `InvalidTransition`.
    ///
    /// This is the whole transition table:
    ///
    /// | From              | Action           | To                |
    /// |-------------------|------------------|-------------------|
    /// | pending           | approve          | processing        |
    /// | pending           | cancel           | cancelled         |
    /// | pending, processing | customer cancel | `user_cancelled`  |
    /// | processing        | ship             | shipped           |
    /// | shipped           | deliver          | delivered         |
    /// | delivered         | request return   | `return_requested`|
    /// | `return_requested`| approve return   | returned          |
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] for any (status, action) pair not listed.
    pub const fn apply(self, action: OrderAction) -> Result<Self, InvalidTransition> {
        match (self, action) {
            (Self::Pending, OrderAction::Approve) => Ok(Self::Processing),
            (Self::Pending, OrderAction::Cancel) => Ok(Self::Cancelled),
            (Self::Pending | Self::Processing, OrderAction::CustomerCancel) => {
                Ok(Self::UserCancelled)
            }
            (Self::Processing, OrderAction::Ship) => Ok(Self::Shipped),
            (Self::Shipped, OrderAction::Deliver) => Ok(Self::Delivered),
            (Self::Delivered, OrderAction::RequestReturn) => Ok(Self::ReturnRequested),
            (Self::ReturnRequested, OrderAction::ApproveReturn) => Ok(Self::Returned),
            (from, action) => Err(InvalidTransition { from, action }),
        }
    }

    /// Whether no further action can move the order out of this status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::UserCancelled | Self::Returned)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::UserCancelled => "user_cancelled",
            Self::ReturnRequested => "return_requested",
            Self::Returned => "returned",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            "user_cancelled" => Ok(Self::UserCancelled),
            "return_requested" => Ok(Self::ReturnRequested),
            "returned" => Ok(Self::Returned),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}
