//! `PostgreSQL` store backend.
//!
//! Queries are runtime-bound (`sqlx::query_as`) rather than compile-checked
//! macros so the crate builds without a live database. Uniqueness and the
//! status compare-and-swap are enforced by the database itself: a UNIQUE
//! constraint on `payment_handle` and a conditional UPDATE on `status`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use clementine_core::{
    AuthorizationHandle, CartIdentity, CurrencyCode, OrderId, OrderStatus, Price, ProductId,
};

use super::{CartStore, OrderFilter, OrderStore, StoreError, TransitionMeta};
use crate::model::{CartLine, NewOrder, Order, OrderLine, ShippingDetails, Totals};

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Cart store backed by the `cart_line` table.
#[derive(Debug, Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CartLineRow {
    product_id: ProductId,
    quantity: i32,
    unit_price: Option<Decimal>,
    unit_price_currency: Option<String>,
    added_at: DateTime<Utc>,
}

impl CartLineRow {
    fn into_line(self) -> Result<CartLine, StoreError> {
        let quantity = u32::try_from(self.quantity).map_err(|_| {
            StoreError::DataCorruption(format!("negative quantity in cart_line: {}", self.quantity))
        })?;
        let unit_price = match (self.unit_price, self.unit_price_currency) {
            (Some(amount), Some(code)) => {
                let currency = code.parse::<CurrencyCode>().map_err(|e| {
                    StoreError::DataCorruption(format!("invalid currency in cart_line: {e}"))
                })?;
                Some(Price::new(amount, currency))
            }
            _ => None,
        };
        Ok(CartLine {
            product_id: self.product_id,
            quantity,
            unit_price,
            added_at: self.added_at,
        })
    }
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn lines(&self, identity: &CartIdentity) -> Result<Vec<CartLine>, StoreError> {
        let rows: Vec<CartLineRow> = sqlx::query_as(
            r"
            SELECT product_id, quantity, unit_price, unit_price_currency, added_at
            FROM cart_line
            WHERE identity_key = $1
            ORDER BY added_at ASC, product_id ASC
            ",
        )
        .bind(identity.storage_key())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CartLineRow::into_line).collect()
    }

    async fn find_line(
        &self,
        identity: &CartIdentity,
        product_id: ProductId,
    ) -> Result<Option<CartLine>, StoreError> {
        let row: Option<CartLineRow> = sqlx::query_as(
            r"
            SELECT product_id, quantity, unit_price, unit_price_currency, added_at
            FROM cart_line
            WHERE identity_key = $1 AND product_id = $2
            ",
        )
        .bind(identity.storage_key())
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CartLineRow::into_line).transpose()
    }

    async fn upsert_line(
        &self,
        identity: &CartIdentity,
        line: CartLine,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO cart_line (identity_key, product_id, quantity, unit_price, unit_price_currency, added_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (identity_key, product_id)
            DO UPDATE SET quantity = EXCLUDED.quantity,
                          unit_price = EXCLUDED.unit_price,
                          unit_price_currency = EXCLUDED.unit_price_currency
            ",
        )
        .bind(identity.storage_key())
        .bind(line.product_id)
        .bind(i64::from(line.quantity))
        .bind(line.unit_price.map(|p| p.amount))
        .bind(line.unit_price.map(|p| p.currency_code.code()))
        .bind(line.added_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_line(
        &self,
        identity: &CartIdentity,
        product_id: ProductId,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM cart_line WHERE identity_key = $1 AND product_id = $2")
            .bind(identity.storage_key())
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn move_line(
        &self,
        from: &CartIdentity,
        to: &CartIdentity,
        line: CartLine,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO cart_line (identity_key, product_id, quantity, unit_price, unit_price_currency, added_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (identity_key, product_id)
            DO UPDATE SET quantity = EXCLUDED.quantity,
                          unit_price = EXCLUDED.unit_price,
                          unit_price_currency = EXCLUDED.unit_price_currency
            ",
        )
        .bind(to.storage_key())
        .bind(line.product_id)
        .bind(i64::from(line.quantity))
        .bind(line.unit_price.map(|p| p.amount))
        .bind(line.unit_price.map(|p| p.currency_code.code()))
        .bind(line.added_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM cart_line WHERE identity_key = $1 AND product_id = $2")
            .bind(from.storage_key())
            .bind(line.product_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn clear(&self, identity: &CartIdentity) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM cart_line WHERE identity_key = $1")
            .bind(identity.storage_key())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Order store backed by the `orders` and `order_line` tables.
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lines_for(
        &self,
        order_id: OrderId,
        currency: CurrencyCode,
    ) -> Result<Vec<OrderLine>, StoreError> {
        let rows: Vec<OrderLineRow> = sqlx::query_as(
            r"
            SELECT product_id, title, unit_price, quantity
            FROM order_line
            WHERE order_id = $1
            ORDER BY position ASC
            ",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| row.into_line(currency))
            .collect()
    }

    async fn hydrate(&self, row: OrderRow) -> Result<Order, StoreError> {
        let currency = row.currency.parse::<CurrencyCode>().map_err(|e| {
            StoreError::DataCorruption(format!("invalid currency in orders: {e}"))
        })?;
        let lines = self.lines_for(row.id, currency).await?;
        row.into_order(lines)
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    placed_by: String,
    ship_name: String,
    ship_phone: String,
    ship_address: String,
    subtotal: Decimal,
    shipping: Decimal,
    tax: Decimal,
    total: Decimal,
    currency: String,
    status: OrderStatus,
    payment_handle: String,
    return_reason: Option<String>,
    refund_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const ORDER_COLUMNS: &str = r"
    id, placed_by, ship_name, ship_phone, ship_address,
    subtotal, shipping, tax, total, currency,
    status, payment_handle, return_reason, refund_date,
    created_at, updated_at
";

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLine>) -> Result<Order, StoreError> {
        let placed_by = self.placed_by.parse::<CartIdentity>().map_err(|e| {
            StoreError::DataCorruption(format!("invalid placed_by in orders: {e}"))
        })?;
        let currency = self.currency.parse::<CurrencyCode>().map_err(|e| {
            StoreError::DataCorruption(format!("invalid currency in orders: {e}"))
        })?;

        Ok(Order {
            id: self.id,
            placed_by,
            lines,
            shipping: ShippingDetails::from_stored(
                self.ship_name,
                self.ship_phone,
                self.ship_address,
            ),
            totals: Totals {
                subtotal: Price::new(self.subtotal, currency),
                shipping: Price::new(self.shipping, currency),
                tax: Price::new(self.tax, currency),
                total: Price::new(self.total, currency),
            },
            status: self.status,
            payment_handle: AuthorizationHandle::new(self.payment_handle),
            return_reason: self.return_reason,
            refund_date: self.refund_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderLineRow {
    product_id: ProductId,
    title: String,
    unit_price: Decimal,
    quantity: i32,
}

impl OrderLineRow {
    // order_line rows carry amounts in the parent order's currency
    fn into_line(self, currency: CurrencyCode) -> Result<OrderLine, StoreError> {
        let quantity = u32::try_from(self.quantity).map_err(|_| {
            StoreError::DataCorruption(format!(
                "negative quantity in order_line: {}",
                self.quantity
            ))
        })?;
        Ok(OrderLine {
            product_id: self.product_id,
            title: self.title,
            unit_price: Price::new(self.unit_price, currency),
            quantity,
        })
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: OrderRow = sqlx::query_as(&format!(
            r"
            INSERT INTO orders (
                placed_by, ship_name, ship_phone, ship_address,
                subtotal, shipping, tax, total, currency, payment_handle
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order.placed_by.storage_key())
        .bind(order.shipping.name())
        .bind(order.shipping.phone())
        .bind(order.shipping.address())
        .bind(order.totals.subtotal.amount)
        .bind(order.totals.shipping.amount)
        .bind(order.totals.tax.amount)
        .bind(order.totals.total.amount)
        .bind(order.totals.subtotal.currency_code.code())
        .bind(order.payment_handle.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::Conflict(format!(
                    "order already exists for authorization {}",
                    order.payment_handle
                ));
            }
            StoreError::Database(e)
        })?;

        for (position, line) in order.lines.iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO order_line (order_id, position, product_id, title, unit_price, quantity)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(row.id)
            .bind(i64::try_from(position).map_err(|_| {
                StoreError::DataCorruption("order line position overflow".to_owned())
            })?)
            .bind(line.product_id)
            .bind(&line.title)
            .bind(line.unit_price.amount)
            .bind(i64::from(line.quantity))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        row.into_order(order.lines)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_handle(
        &self,
        handle: &AuthorizationHandle,
    ) -> Result<Option<Order>, StoreError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE payment_handle = $1"
        ))
        .bind(handle.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE ($1::TEXT IS NULL OR placed_by = $1)
              AND ($2::order_status IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(filter.placed_by.map(|identity| identity.storage_key()))
        .bind(filter.status)
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.hydrate(row).await?);
        }
        Ok(orders)
    }

    async fn transition(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        meta: TransitionMeta,
    ) -> Result<Option<Order>, StoreError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r"
            UPDATE orders
            SET status = $2,
                return_reason = COALESCE($3, return_reason),
                refund_date = COALESCE($4, refund_date),
                updated_at = now()
            WHERE id = $1 AND status = $5
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(to)
        .bind(meta.return_reason)
        .bind(meta.refund_date)
        .bind(from)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => {
                // Distinguish a lost CAS race from a missing order.
                let exists: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM orders WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?;
                if exists.is_none() {
                    return Err(StoreError::NotFound);
                }
                Ok(None)
            }
        }
    }
}
