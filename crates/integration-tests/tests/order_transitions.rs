//! The full status transition grid, enforced server-side.
//!
//! For every `(status, action)` pair not in the table the service rejects
//! with `INVALID_TRANSITION` and the stored status is unchanged, regardless
//! of what a stale client believed.

use clementine_commerce::payment::PaymentStatus;
use clementine_core::{CartIdentity, OrderAction, OrderId, OrderStatus, ProductId, UserId};

use clementine_integration_tests::TestContext;

const ALL_ACTIONS: [OrderAction; 7] = [
    OrderAction::Approve,
    OrderAction::Cancel,
    OrderAction::CustomerCancel,
    OrderAction::Ship,
    OrderAction::Deliver,
    OrderAction::RequestReturn,
    OrderAction::ApproveReturn,
];

/// Drive a fresh order to `target` through valid transitions.
async fn order_in_status(ctx: &TestContext, user: i32, target: OrderStatus) -> OrderId {
    let identity = CartIdentity::User(UserId::new(user));
    ctx.carts
        .add_item(&identity, ProductId::new(1), 1)
        .await
        .expect("seed cart");

    let started = ctx
        .checkout
        .begin(identity, "Ada Lovelace", "5550102030", "12 Analytical Way")
        .await
        .expect("begin");
    ctx.payments.report(&started.handle, PaymentStatus::Succeeded);
    let order = ctx
        .checkout
        .commit(identity, started.handle)
        .await
        .expect("commit");

    let path: &[OrderAction] = match target {
        OrderStatus::Pending => &[],
        OrderStatus::Processing => &[OrderAction::Approve],
        OrderStatus::Shipped => &[OrderAction::Approve, OrderAction::Ship],
        OrderStatus::Delivered => &[OrderAction::Approve, OrderAction::Ship, OrderAction::Deliver],
        OrderStatus::Cancelled => &[OrderAction::Cancel],
        OrderStatus::UserCancelled => &[OrderAction::CustomerCancel],
        OrderStatus::ReturnRequested => &[
            OrderAction::Approve,
            OrderAction::Ship,
            OrderAction::Deliver,
            OrderAction::RequestReturn,
        ],
        OrderStatus::Returned => &[
            OrderAction::Approve,
            OrderAction::Ship,
            OrderAction::Deliver,
            OrderAction::RequestReturn,
            OrderAction::ApproveReturn,
        ],
    };

    for action in path {
        apply(ctx, order.id, *action, &identity).await.expect("valid path");
    }
    order.id
}

async fn apply(
    ctx: &TestContext,
    id: OrderId,
    action: OrderAction,
    identity: &CartIdentity,
) -> Result<clementine_commerce::Order, clementine_commerce::CommerceError> {
    match action {
        OrderAction::CustomerCancel | OrderAction::RequestReturn => {
            ctx.orders
                .apply_as_customer(id, action, identity, Some("test reason".to_owned()))
                .await
        }
        _ => ctx.orders.apply_as_admin(id, action).await,
    }
}

fn expected(from: OrderStatus, action: OrderAction) -> Option<OrderStatus> {
    match (from, action) {
        (OrderStatus::Pending, OrderAction::Approve) => Some(OrderStatus::Processing),
        (OrderStatus::Pending, OrderAction::Cancel) => Some(OrderStatus::Cancelled),
        (OrderStatus::Pending | OrderStatus::Processing, OrderAction::CustomerCancel) => {
            Some(OrderStatus::UserCancelled)
        }
        (OrderStatus::Processing, OrderAction::Ship) => Some(OrderStatus::Shipped),
        (OrderStatus::Shipped, OrderAction::Deliver) => Some(OrderStatus::Delivered),
        (OrderStatus::Delivered, OrderAction::RequestReturn) => Some(OrderStatus::ReturnRequested),
        (OrderStatus::ReturnRequested, OrderAction::ApproveReturn) => Some(OrderStatus::Returned),
        _ => None,
    }
}

#[tokio::test]
async fn every_pair_matches_the_table() {
    let ctx = TestContext::new();
    ctx.add_product(1, "Widget", 10, 1000);

    let statuses = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::UserCancelled,
        OrderStatus::ReturnRequested,
        OrderStatus::Returned,
    ];

    let mut user = 0;
    for from in statuses {
        for action in ALL_ACTIONS {
            user += 1;
            let identity = CartIdentity::User(UserId::new(user));
            let id = order_in_status(&ctx, user, from).await;

            match expected(from, action) {
                Some(to) => {
                    let updated = apply(&ctx, id, action, &identity)
                        .await
                        .unwrap_or_else(|e| panic!("{from:?} + {action:?} must succeed: {e}"));
                    assert_eq!(updated.status, to, "{from:?} + {action:?}");
                }
                None => {
                    let err = apply(&ctx, id, action, &identity)
                        .await
                        .expect_err("not in table");
                    assert_eq!(err.code(), "INVALID_TRANSITION", "{from:?} + {action:?}");
                    let current = ctx.orders.get(id).await.expect("get");
                    assert_eq!(current.status, from, "status unchanged after rejection");
                }
            }
        }
    }
}

#[tokio::test]
async fn refund_date_set_only_by_return_approval() {
    let ctx = TestContext::new();
    ctx.add_product(1, "Widget", 10, 1000);
    let identity = CartIdentity::User(UserId::new(500));

    let id = order_in_status(&ctx, 500, OrderStatus::ReturnRequested).await;
    let before = ctx.orders.get(id).await.expect("get");
    assert!(before.refund_date.is_none());
    assert_eq!(before.return_reason.as_deref(), Some("test reason"));

    let returned = apply(&ctx, id, OrderAction::ApproveReturn, &identity)
        .await
        .expect("approve return");
    assert!(returned.refund_date.is_some());
}
