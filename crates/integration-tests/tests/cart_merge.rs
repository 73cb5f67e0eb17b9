//! Guest -> user merge semantics.
//!
//! Completeness (every guest line lands), clamping (never dropped, never
//! over the ceiling), idempotence (safe to trigger on every authenticated
//! request), and failure behavior (guest cart untouched, retried later).

use clementine_core::{CartIdentity, GuestToken, ProductId, UserId};

use clementine_integration_tests::TestContext;

async fn quantities(ctx: &TestContext, identity: &CartIdentity) -> Vec<(i32, u32)> {
    let mut pairs: Vec<(i32, u32)> = ctx
        .carts
        .lines(identity)
        .await
        .expect("lines")
        .iter()
        .map(|l| (l.product_id.as_i32(), l.quantity))
        .collect();
    pairs.sort_unstable();
    pairs
}

#[tokio::test]
async fn merge_combines_overlapping_and_moves_new_lines() {
    let ctx = TestContext::new();
    ctx.add_product(1, "Widget", 10, 50);
    ctx.add_product(2, "Gadget", 5, 50);

    let token = GuestToken::generate();
    let guest = CartIdentity::Guest(token);
    let user = CartIdentity::User(UserId::new(1));

    ctx.carts.add_item(&guest, ProductId::new(1), 2).await.expect("guest A");
    ctx.carts.add_item(&guest, ProductId::new(2), 3).await.expect("guest B");
    ctx.carts.add_item(&user, ProductId::new(1), 1).await.expect("user A");

    let resolution = ctx
        .resolver
        .resolve(Some(token), Some(UserId::new(1)))
        .await
        .expect("resolve")
        .expect("identity");

    assert_eq!(resolution.identity, user);
    assert_eq!(resolution.merged, Some(token), "token ready for revocation");
    assert_eq!(quantities(&ctx, &user).await, vec![(1, 3), (2, 3)]);
    assert!(
        ctx.carts.lines(&guest).await.expect("lines").is_empty(),
        "guest cart no longer exists"
    );
}

#[tokio::test]
async fn merge_clamps_sum_to_ceiling_instead_of_rejecting() {
    let ctx = TestContext::new();
    ctx.add_product(1, "Widget", 10, 50);

    let token = GuestToken::generate();
    let guest = CartIdentity::Guest(token);
    let user = CartIdentity::User(UserId::new(1));

    ctx.carts.add_item(&guest, ProductId::new(1), 8).await.expect("guest");
    ctx.carts.add_item(&user, ProductId::new(1), 5).await.expect("user");

    ctx.resolver
        .resolve(Some(token), Some(UserId::new(1)))
        .await
        .expect("resolve");

    // 8 + 5 = 13 exceeds the ceiling of 10: clamped, not rejected, not 13.
    assert_eq!(quantities(&ctx, &user).await, vec![(1, 10)]);
}

#[tokio::test]
async fn merge_twice_with_no_guest_activity_is_a_noop() {
    let ctx = TestContext::new();
    ctx.add_product(1, "Widget", 10, 50);

    let token = GuestToken::generate();
    let guest = CartIdentity::Guest(token);
    let user = CartIdentity::User(UserId::new(1));

    ctx.carts.add_item(&guest, ProductId::new(1), 4).await.expect("guest");

    ctx.resolver
        .resolve(Some(token), Some(UserId::new(1)))
        .await
        .expect("first");
    let after_first = quantities(&ctx, &user).await;

    // A client that never dropped the cookie re-triggers the merge.
    ctx.resolver
        .resolve(Some(token), Some(UserId::new(1)))
        .await
        .expect("second");
    let after_second = quantities(&ctx, &user).await;

    assert_eq!(after_first, after_second);
    assert_eq!(after_second, vec![(1, 4)]);
}

#[tokio::test]
async fn merge_failure_is_absorbed_and_retryable() {
    let ctx = TestContext::new();
    ctx.add_product(1, "Widget", 10, 50);

    let token = GuestToken::generate();
    let guest = CartIdentity::Guest(token);
    let user = CartIdentity::User(UserId::new(1));

    ctx.carts.add_item(&guest, ProductId::new(1), 4).await.expect("guest");
    ctx.cart_store.set_fail_writes(true);

    let resolution = ctx
        .resolver
        .resolve(Some(token), Some(UserId::new(1)))
        .await
        .expect("resolution degrades, not errors")
        .expect("identity");
    assert_eq!(resolution.merged, None, "token must be kept");

    // Store recovers; the next qualifying request completes the merge.
    ctx.cart_store.set_fail_writes(false);
    let resolution = ctx
        .resolver
        .resolve(Some(token), Some(UserId::new(1)))
        .await
        .expect("resolve")
        .expect("identity");
    assert_eq!(resolution.merged, Some(token));
    assert_eq!(quantities(&ctx, &user).await, vec![(1, 4)]);
    assert!(ctx.carts.lines(&guest).await.expect("lines").is_empty());
}

#[tokio::test]
async fn merged_cart_still_obeys_policy_on_later_mutations() {
    let ctx = TestContext::new();
    ctx.add_product(1, "Widget", 10, 50);

    let token = GuestToken::generate();
    let guest = CartIdentity::Guest(token);
    let user = CartIdentity::User(UserId::new(1));

    ctx.carts.add_item(&guest, ProductId::new(1), 8).await.expect("guest");
    ctx.carts.add_item(&user, ProductId::new(1), 5).await.expect("user");
    ctx.resolver
        .resolve(Some(token), Some(UserId::new(1)))
        .await
        .expect("merge");

    // Clamped to 10; one more unit must now be rejected.
    let err = ctx
        .carts
        .add_item(&user, ProductId::new(1), 1)
        .await
        .expect_err("already at ceiling");
    assert_eq!(err.code(), "QUANTITY_CEILING");
}
