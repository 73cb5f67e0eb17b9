//! The whole purchase lifecycle in one scenario.
//!
//! Guest fills a cart, logs in (merge), checks out, the payment succeeds,
//! the order is created and worked by the admin, and the customer cancels
//! while that is still allowed.

use clementine_commerce::payment::PaymentStatus;
use clementine_core::{CartIdentity, GuestToken, OrderAction, OrderStatus, ProductId, UserId};
use rust_decimal::dec;

use clementine_integration_tests::TestContext;

#[tokio::test]
async fn guest_to_user_purchase_and_cancellation() {
    let ctx = TestContext::new();
    ctx.add_product(1, "Pour-Over Kettle", 45, 5);

    // A guest adds 3 units (stock 5).
    let token = GuestToken::generate();
    let guest = CartIdentity::Guest(token);
    ctx.carts
        .add_item(&guest, ProductId::new(1), 3)
        .await
        .expect("guest add");

    // Login with an empty user cart: the merge moves the line over.
    let user = CartIdentity::User(UserId::new(9));
    let resolution = ctx
        .resolver
        .resolve(Some(token), Some(UserId::new(9)))
        .await
        .expect("resolve")
        .expect("identity");
    assert_eq!(resolution.identity, user);
    assert_eq!(resolution.merged, Some(token));
    assert_eq!(ctx.carts.item_count(&user).await.expect("count"), 3);
    assert!(ctx.carts.lines(&guest).await.expect("lines").is_empty());

    // Checkout with valid shipping; the provider confirms the payment.
    let started = ctx
        .checkout
        .begin(user, "Grace Hopper", "+1 (555) 867-5309", "1 Compiler Court")
        .await
        .expect("shipping step");
    // 3 x $45 = $135: over the free-shipping threshold, 8% tax.
    assert_eq!(started.totals.subtotal.amount, dec!(135.00));
    assert_eq!(started.totals.shipping.amount, dec!(0));
    assert_eq!(started.totals.total.amount, dec!(145.80));

    ctx.payments.report(&started.handle, PaymentStatus::Succeeded);
    let order = ctx
        .checkout
        .commit(user, started.handle)
        .await
        .expect("commit");

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.lines.len(), 1);
    assert_eq!(
        order.lines.first().map(|l| (l.quantity, l.title.as_str())),
        Some((3, "Pour-Over Kettle"))
    );
    assert_eq!(
        ctx.carts.item_count(&user).await.expect("count"),
        0,
        "cart cleared after order creation"
    );

    // Admin approves: pending -> processing.
    let approved = ctx
        .orders
        .apply_as_admin(order.id, OrderAction::Approve)
        .await
        .expect("approve");
    assert_eq!(approved.status, OrderStatus::Processing);

    // Customer cancellation is still allowed while processing.
    let cancelled = ctx
        .orders
        .apply_as_customer(order.id, OrderAction::CustomerCancel, &user, None)
        .await
        .expect("customer cancel from processing");
    assert_eq!(cancelled.status, OrderStatus::UserCancelled);

    // Terminal: nothing else applies.
    let err = ctx
        .orders
        .apply_as_admin(order.id, OrderAction::Ship)
        .await
        .expect_err("terminal status");
    assert_eq!(err.code(), "INVALID_TRANSITION");
}

#[tokio::test]
async fn order_history_is_scoped_to_the_identity() {
    let ctx = TestContext::new();
    ctx.add_product(1, "Pour-Over Kettle", 45, 50);

    for user_id in [1, 2] {
        let identity = CartIdentity::User(UserId::new(user_id));
        ctx.carts
            .add_item(&identity, ProductId::new(1), 1)
            .await
            .expect("add");
        let started = ctx
            .checkout
            .begin(identity, "Grace Hopper", "5558675309", "1 Compiler Court")
            .await
            .expect("begin");
        ctx.payments.report(&started.handle, PaymentStatus::Succeeded);
        ctx.checkout
            .commit(identity, started.handle)
            .await
            .expect("commit");
    }

    let first = CartIdentity::User(UserId::new(1));
    let orders = ctx.orders.list_for(&first).await.expect("list");
    assert_eq!(orders.len(), 1);
    assert!(orders.iter().all(|o| o.placed_by == first));
}
