//! Order fulfillment service for dine-in and online orders
//!
//! `servings_deducted` on the order row is the only record of whether the
//! order currently holds servings. It is read under a row lock and flipped
//! in the same transaction as the servings change.

use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    Order, OrderChannel, OrderItemRow, OrderRow, OrderStatus, ServingsEffect, ServingsReason,
    ORDER_COLUMNS,
};
use crate::services::menu::{apply_servings, lock_menu_items};
use shared::{
    check_servings, order_total, placement_effect, removal_effect, status_change_effect,
    sum_by_item, validate_order_quantity, Actor,
};

/// Order service
#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
}

/// One line of a new order
#[derive(Debug, Deserialize)]
pub struct OrderLineInput {
    pub menu_item_id: Uuid,
    pub quantity: i32,
}

/// Input for placing an order
#[derive(Debug, Deserialize)]
pub struct PlaceOrderInput {
    pub channel: OrderChannel,
    pub customer_name: Option<String>,
    pub table_number: Option<String>,
    pub delivery_address: Option<String>,
    pub items: Vec<OrderLineInput>,
}

/// Input for a status change
#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusInput {
    pub status: OrderStatus,
}

async fn fetch_order(conn: &mut PgConnection, id: Uuid, lock: bool) -> AppResult<Order> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {} FROM orders WHERE id = $1{}",
        ORDER_COLUMNS,
        if lock { " FOR UPDATE" } else { "" }
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

    let items = sqlx::query_as::<_, OrderItemRow>(
        r#"
        SELECT id, order_id, menu_item_id, quantity, unit_price, subtotal
        FROM order_items
        WHERE order_id = $1
        ORDER BY menu_item_id
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    row.into_order(items)
}

/// Check and take servings for `quantities`, all or nothing
async fn take_servings(
    conn: &mut PgConnection,
    quantities: &[(Uuid, i32)],
    order_id: Uuid,
    actor_id: Uuid,
) -> AppResult<()> {
    let ids: Vec<Uuid> = quantities.iter().map(|(id, _)| *id).collect();
    let items = lock_menu_items(conn, &ids).await?;
    let totals = check_servings(&items, quantities)?;
    let deltas: Vec<(Uuid, i32)> = totals.into_iter().map(|(id, qty)| (id, -qty)).collect();
    apply_servings(
        conn,
        &deltas,
        ServingsReason::OrderFulfilled,
        Some(order_id),
        None,
        actor_id,
    )
    .await
}

/// Give back the servings an order holds
async fn restore_servings(
    conn: &mut PgConnection,
    quantities: &[(Uuid, i32)],
    reason: ServingsReason,
    order_id: Uuid,
    actor_id: Uuid,
) -> AppResult<()> {
    let totals = sum_by_item(quantities)?;
    let ids: Vec<Uuid> = totals.iter().map(|(id, _)| *id).collect();
    lock_menu_items(conn, &ids).await?;
    apply_servings(conn, &totals, reason, Some(order_id), None, actor_id).await
}

async fn set_order_state(
    conn: &mut PgConnection,
    id: Uuid,
    status: OrderStatus,
    servings_deducted: bool,
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE orders
        SET status = $2, servings_deducted = $3, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(servings_deducted)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

impl OrderService {
    /// Create a new OrderService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get an order with its items
    pub async fn get_order(&self, id: Uuid) -> AppResult<Order> {
        let mut conn = self.db.acquire().await?;
        fetch_order(&mut conn, id, false).await
    }

    /// Place an order.
    ///
    /// Dine-in orders take their servings now; online orders take them on
    /// completion.
    pub async fn place_order(&self, actor: &Actor, input: PlaceOrderInput) -> AppResult<Order> {
        if input.items.is_empty() {
            return Err(AppError::Validation {
                field: "items".to_string(),
                message: "An order needs at least one item".to_string(),
            });
        }
        for line in &input.items {
            validate_order_quantity(line.quantity)?;
        }

        let quantities: Vec<(Uuid, i32)> = input
            .items
            .iter()
            .map(|l| (l.menu_item_id, l.quantity))
            .collect();
        let ids: Vec<Uuid> = quantities.iter().map(|(id, _)| *id).collect();

        let mut tx = self.db.begin().await?;
        let menu_items = lock_menu_items(&mut tx, &ids).await?;

        let prices: Vec<(i32, rust_decimal::Decimal)> = input
            .items
            .iter()
            .map(|l| {
                menu_items
                    .iter()
                    .find(|m| m.id == l.menu_item_id)
                    .map(|m| (l.quantity, m.price))
                    .ok_or_else(|| AppError::NotFound("Menu item".to_string()))
            })
            .collect::<AppResult<_>>()?;
        let total = order_total(&prices);

        let order_id = Uuid::new_v4();
        let deducted = match placement_effect(input.channel) {
            ServingsEffect::Deduct => {
                take_servings(&mut tx, &quantities, order_id, actor.user_id).await?;
                true
            }
            _ => false,
        };

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, channel, status, servings_deducted, customer_name, table_number,
                delivery_address, total_amount, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order_id)
        .bind(input.channel.as_str())
        .bind(OrderStatus::Pending.as_str())
        .bind(deducted)
        .bind(&input.customer_name)
        .bind(&input.table_number)
        .bind(&input.delivery_address)
        .bind(total)
        .bind(actor.user_id)
        .execute(&mut *tx)
        .await?;

        let item_ids: Vec<Uuid> = input.items.iter().map(|l| l.menu_item_id).collect();
        let item_quantities: Vec<i32> = prices.iter().map(|(q, _)| *q).collect();
        let unit_prices: Vec<rust_decimal::Decimal> = prices.iter().map(|(_, p)| *p).collect();

        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, menu_item_id, quantity, unit_price, subtotal)
            SELECT $1, d.menu_item_id, d.quantity, d.unit_price, d.quantity * d.unit_price
            FROM UNNEST($2::uuid[], $3::int4[], $4::numeric[]) AS d(menu_item_id, quantity, unit_price)
            "#,
        )
        .bind(order_id)
        .bind(&item_ids)
        .bind(&item_quantities)
        .bind(&unit_prices)
        .execute(&mut *tx)
        .await?;

        let order = fetch_order(&mut tx, order_id, false).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            channel = order.channel.as_str(),
            total = %order.total_amount,
            servings_deducted = order.servings_deducted,
            "Order placed"
        );

        Ok(order)
    }

    /// Move an order to a new status, taking or restoring servings as needed
    pub async fn update_status(
        &self,
        actor: &Actor,
        id: Uuid,
        next: OrderStatus,
    ) -> AppResult<Order> {
        let mut tx = self.db.begin().await?;
        let order = fetch_order(&mut tx, id, true).await?;

        let effect =
            status_change_effect(order.channel, order.status, next, order.servings_deducted)?;
        let deducted = match effect {
            ServingsEffect::Deduct => {
                take_servings(&mut tx, &order.quantities(), id, actor.user_id).await?;
                true
            }
            ServingsEffect::Restore => {
                restore_servings(
                    &mut tx,
                    &order.quantities(),
                    ServingsReason::OrderCancelled,
                    id,
                    actor.user_id,
                )
                .await?;
                false
            }
            ServingsEffect::None => order.servings_deducted,
        };

        set_order_state(&mut tx, id, next, deducted).await?;
        let order = fetch_order(&mut tx, id, false).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %id,
            status = %order.status,
            servings_deducted = order.servings_deducted,
            "Order status updated"
        );

        Ok(order)
    }

    /// Cancel an order, restoring any servings it holds
    pub async fn cancel_order(&self, actor: &Actor, id: Uuid) -> AppResult<Order> {
        self.update_status(actor, id, OrderStatus::Cancelled).await
    }

    /// Delete an order, restoring any servings it holds
    pub async fn delete_order(&self, actor: &Actor, id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let order = fetch_order(&mut tx, id, true).await?;

        if removal_effect(order.status, order.servings_deducted) == ServingsEffect::Restore {
            restore_servings(
                &mut tx,
                &order.quantities(),
                ServingsReason::OrderDeleted,
                id,
                actor.user_id,
            )
            .await?;
        }

        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(order_id = %id, "Order deleted");
        Ok(())
    }
}
