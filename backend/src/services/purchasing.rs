//! Purchasing service: purchase orders and receiving into stock

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    LineReceipt, PurchaseOrder, PurchaseOrderItem, PurchaseOrderItemRow, PurchaseOrderRow,
    PurchaseOrderStatus, ReceivedStock, StockRecord, StockRecordRow, MOVEMENT_PURCHASE_RECEIPT,
    PURCHASE_ORDER_COLUMNS, PURCHASE_ORDER_ITEM_COLUMNS,
};
use crate::services::conversion::{load_conversion, load_material};
use crate::services::stock::replayed_operation;
use shared::{ensure_receivable, receive_line, received_total, validate_positive_amount, Actor};

/// Purchasing service
#[derive(Clone)]
pub struct PurchasingService {
    db: PgPool,
}

/// One line of a new purchase order
#[derive(Debug, Deserialize)]
pub struct PurchaseOrderLineInput {
    pub raw_material_id: Uuid,
    /// Ordered in this conversion's unit; base unit when absent
    pub unit_conversion_id: Option<Uuid>,
    pub quantity: Decimal,
    /// Price per ordered unit; defaults to the catalog price
    pub unit_price: Option<Decimal>,
}

/// Input for creating a purchase order
#[derive(Debug, Deserialize)]
pub struct CreatePurchaseOrderInput {
    pub supplier_name: String,
    pub order_date: Option<NaiveDate>,
    pub items: Vec<PurchaseOrderLineInput>,
}

/// Input for receiving a delivery
#[derive(Debug, Deserialize)]
pub struct ReceiveInput {
    #[serde(default)]
    pub lines: Vec<LineReceipt>,
    pub date_received: Option<NaiveDate>,
}

/// The delivered order and the stock records it changed
#[derive(Debug, Serialize)]
pub struct ReceivingResult {
    pub purchase_order: PurchaseOrder,
    pub stock: Vec<StockRecord>,
}

async fn fetch_purchase_order(
    conn: &mut PgConnection,
    id: Uuid,
    lock: bool,
) -> AppResult<PurchaseOrder> {
    let row = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
        "SELECT {} FROM purchase_orders WHERE id = $1{}",
        PURCHASE_ORDER_COLUMNS,
        if lock { " FOR UPDATE" } else { "" }
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?;

    let items = sqlx::query_as::<_, PurchaseOrderItemRow>(&format!(
        "SELECT {} FROM purchase_order_items WHERE purchase_order_id = $1 ORDER BY raw_material_id, id",
        PURCHASE_ORDER_ITEM_COLUMNS
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    row.into_purchase_order(items)
}

/// Sum received stock per (material, base unit), in key order.
///
/// The unit cost of a merged entry is the quantity-weighted average.
fn merge_received(received: &[ReceivedStock]) -> Vec<(Uuid, String, Decimal, Decimal)> {
    let mut merged: BTreeMap<(Uuid, String), (Decimal, Decimal)> = BTreeMap::new();
    for r in received.iter().filter(|r| r.base_quantity > Decimal::ZERO) {
        let entry = merged
            .entry((r.raw_material_id, r.base_unit.clone()))
            .or_insert((Decimal::ZERO, Decimal::ZERO));
        entry.0 += r.base_quantity;
        entry.1 += r.base_quantity * r.base_unit_price;
    }

    merged
        .into_iter()
        .map(|((material, unit), (quantity, value))| (material, unit, quantity, value / quantity))
        .collect()
}

impl PurchasingService {
    /// Create a new PurchasingService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get a purchase order with its items
    pub async fn get_purchase_order(&self, id: Uuid) -> AppResult<PurchaseOrder> {
        let mut conn = self.db.acquire().await?;
        fetch_purchase_order(&mut conn, id, false).await
    }

    /// Create a pending purchase order
    pub async fn create_purchase_order(
        &self,
        actor: &Actor,
        input: CreatePurchaseOrderInput,
    ) -> AppResult<PurchaseOrder> {
        if input.supplier_name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "supplier_name".to_string(),
                message: "Supplier name is required".to_string(),
            });
        }
        if input.items.is_empty() {
            return Err(AppError::Validation {
                field: "items".to_string(),
                message: "A purchase order needs at least one item".to_string(),
            });
        }

        let mut tx = self.db.begin().await?;

        let mut lines = Vec::with_capacity(input.items.len());
        for line in &input.items {
            validate_positive_amount("quantity", line.quantity)?;
            let material = load_material(&mut tx, line.raw_material_id).await?;

            let (unit, catalog_price) = match line.unit_conversion_id {
                Some(conversion_id) => {
                    let conversion = load_conversion(&mut tx, conversion_id).await?;
                    if conversion.raw_material_id != material.id {
                        return Err(AppError::Validation {
                            field: "unit_conversion_id".to_string(),
                            message: format!("Conversion does not belong to {}", material.name),
                        });
                    }
                    (conversion.equivalent_unit, conversion.unit_price)
                }
                None => (material.unit.clone(), material.unit_price),
            };

            let unit_price = line.unit_price.unwrap_or(catalog_price);
            if unit_price < Decimal::ZERO {
                return Err(AppError::Validation {
                    field: "unit_price".to_string(),
                    message: "Unit price cannot be negative".to_string(),
                });
            }
            lines.push((line, unit, unit_price));
        }

        let total: Decimal = lines.iter().map(|(l, _, price)| l.quantity * price).sum();
        let order_date = input.order_date.unwrap_or_else(|| Utc::now().date_naive());

        let purchase_order_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO purchase_orders (supplier_name, status, order_date, total_amount, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(input.supplier_name.trim())
        .bind(PurchaseOrderStatus::Pending.as_str())
        .bind(order_date)
        .bind(total)
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await?;

        for (line, unit, unit_price) in &lines {
            sqlx::query(
                r#"
                INSERT INTO purchase_order_items (
                    purchase_order_id, raw_material_id, unit_conversion_id, unit, quantity,
                    unit_price, subtotal
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(purchase_order_id)
            .bind(line.raw_material_id)
            .bind(line.unit_conversion_id)
            .bind(unit)
            .bind(line.quantity)
            .bind(*unit_price)
            .bind(line.quantity * unit_price)
            .execute(&mut *tx)
            .await?;
        }

        let purchase_order = fetch_purchase_order(&mut tx, purchase_order_id, false).await?;
        tx.commit().await?;

        tracing::info!(
            purchase_order_id = %purchase_order.id,
            supplier = %purchase_order.supplier_name,
            total = %purchase_order.total_amount,
            "Purchase order created"
        );

        Ok(purchase_order)
    }

    /// Receive a delivery into stock.
    ///
    /// Items without a receipt line are recorded as received 0. The order
    /// ends Delivered with its total recomputed from what arrived.
    pub async fn receive(
        &self,
        actor: &Actor,
        id: Uuid,
        input: ReceiveInput,
    ) -> AppResult<ReceivingResult> {
        let mut tx = self.db.begin().await?;
        let purchase_order = fetch_purchase_order(&mut tx, id, true).await?;
        ensure_receivable(purchase_order.status)?;

        for receipt in &input.lines {
            if !purchase_order
                .items
                .iter()
                .any(|i| i.id == receipt.purchase_order_item_id)
            {
                return Err(AppError::Validation {
                    field: "purchase_order_item_id".to_string(),
                    message: format!(
                        "Item {} is not on this purchase order",
                        receipt.purchase_order_item_id
                    ),
                });
            }
        }

        let mut received = Vec::with_capacity(purchase_order.items.len());
        for item in &purchase_order.items {
            let quantity = input
                .lines
                .iter()
                .filter(|r| r.purchase_order_item_id == item.id)
                .map(|r| r.received_quantity)
                .sum::<Decimal>();
            received.push(self.receive_item(&mut tx, item, quantity).await?);
        }

        let item_ids: Vec<Uuid> = received.iter().map(|r| r.purchase_order_item_id).collect();
        let quantities: Vec<Decimal> = received.iter().map(|r| r.received_quantity).collect();
        let subtotals: Vec<Decimal> = received.iter().map(|r| r.subtotal).collect();

        sqlx::query(
            r#"
            UPDATE purchase_order_items i
            SET received_quantity = d.received_quantity, subtotal = d.subtotal
            FROM UNNEST($1::uuid[], $2::numeric[], $3::numeric[]) AS d(id, received_quantity, subtotal)
            WHERE i.id = d.id
            "#,
        )
        .bind(&item_ids)
        .bind(&quantities)
        .bind(&subtotals)
        .execute(&mut *tx)
        .await?;

        let mut stock = Vec::new();
        for (raw_material_id, unit, quantity, unit_cost) in merge_received(&received) {
            let row = sqlx::query_as::<_, StockRecordRow>(
                r#"
                INSERT INTO stock_records (raw_material_id, unit, quantity, available)
                VALUES ($1, $2, $3, $3)
                ON CONFLICT (raw_material_id, unit)
                DO UPDATE SET quantity = stock_records.quantity + EXCLUDED.quantity,
                              available = stock_records.available + EXCLUDED.available,
                              updated_at = NOW()
                RETURNING id, raw_material_id, unit, quantity, available, created_at, updated_at
                "#,
            )
            .bind(raw_material_id)
            .bind(&unit)
            .bind(quantity)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO stock_movements (operation_id, stock_record_id, delta, kind, unit_cost, created_by)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(id)
            .bind(row.id)
            .bind(quantity)
            .bind(MOVEMENT_PURCHASE_RECEIPT)
            .bind(unit_cost)
            .bind(actor.user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| replayed_operation(e, id))?;

            stock.push(StockRecord::from(row));
        }

        let date_received = input
            .date_received
            .unwrap_or_else(|| Utc::now().date_naive());

        sqlx::query(
            r#"
            UPDATE purchase_orders
            SET status = $2, date_received = $3, total_amount = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(PurchaseOrderStatus::Delivered.as_str())
        .bind(date_received)
        .bind(received_total(&received))
        .execute(&mut *tx)
        .await?;

        let purchase_order = fetch_purchase_order(&mut tx, id, false).await?;
        tx.commit().await?;

        tracing::info!(
            purchase_order_id = %id,
            stock_records = stock.len(),
            total = %purchase_order.total_amount,
            "Purchase order received"
        );

        Ok(ReceivingResult {
            purchase_order,
            stock,
        })
    }

    async fn receive_item(
        &self,
        conn: &mut PgConnection,
        item: &PurchaseOrderItem,
        quantity: Decimal,
    ) -> AppResult<ReceivedStock> {
        let material = load_material(conn, item.raw_material_id).await?;
        let conversion = match item.unit_conversion_id {
            Some(conversion_id) => Some(load_conversion(conn, conversion_id).await?),
            None => None,
        };

        Ok(receive_line(item, conversion.as_ref(), &material.unit, quantity)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn received(material: Uuid, base_quantity: &str, price: &str) -> ReceivedStock {
        ReceivedStock {
            purchase_order_item_id: Uuid::new_v4(),
            raw_material_id: material,
            base_quantity: Decimal::from_str(base_quantity).unwrap(),
            base_unit: "kg".to_string(),
            base_unit_price: Decimal::from_str(price).unwrap(),
            received_quantity: Decimal::from_str(base_quantity).unwrap(),
            subtotal: Decimal::ZERO,
        }
    }

    #[test]
    fn test_merge_received_weights_unit_cost() {
        let flour = Uuid::new_v4();
        let merged = merge_received(&[received(flour, "50", "40"), received(flour, "50", "44")]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].2, Decimal::from(100));
        assert_eq!(merged[0].3, Decimal::from(42));
    }

    #[test]
    fn test_merge_received_skips_empty_lines() {
        let merged = merge_received(&[received(Uuid::new_v4(), "0", "40")]);
        assert!(merged.is_empty());
    }
}
