//! Database models for the restaurant operations backend
//!
//! Re-exports models from the shared crate and adds the row types the
//! services read with `query_as`. Enum columns are stored as text and
//! parsed back through the shared `from_str` helpers.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

pub use shared::models::*;

use crate::error::{AppError, AppResult};

fn parse_column<T>(column: &str, value: &str, parse: fn(&str) -> Option<T>) -> AppResult<T> {
    parse(value).ok_or_else(|| {
        AppError::Internal(format!("Unexpected value '{}' in column {}", value, column))
    })
}

// ============================================================================
// Materials
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct RawMaterialRow {
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub unit: String,
    pub unit_price: Decimal,
    pub critical_level: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RawMaterialRow> for RawMaterial {
    fn from(row: RawMaterialRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            category: row.category,
            unit: row.unit,
            unit_price: row.unit_price,
            critical_level: row.critical_level,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct UnitConversionRow {
    pub id: Uuid,
    pub raw_material_id: Uuid,
    pub base_unit: String,
    pub equivalent_unit: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub srp: Option<Decimal>,
    pub is_default_retail: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UnitConversionRow> for UnitConversion {
    fn from(row: UnitConversionRow) -> Self {
        Self {
            id: row.id,
            raw_material_id: row.raw_material_id,
            base_unit: row.base_unit,
            equivalent_unit: row.equivalent_unit,
            quantity: row.quantity,
            unit_price: row.unit_price,
            srp: row.srp,
            is_default_retail: row.is_default_retail,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub const UNIT_CONVERSION_COLUMNS: &str = "id, raw_material_id, base_unit, equivalent_unit, \
     quantity, unit_price, srp, is_default_retail, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
pub struct StockRecordRow {
    pub id: Uuid,
    pub raw_material_id: Uuid,
    pub unit: String,
    pub quantity: Decimal,
    pub available: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StockRecordRow> for StockRecord {
    fn from(row: StockRecordRow) -> Self {
        Self {
            id: row.id,
            raw_material_id: row.raw_material_id,
            unit: row.unit,
            quantity: row.quantity,
            available: row.available,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Stock level joined with its material, for listings
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockLevel {
    pub stock_record_id: Uuid,
    pub raw_material_id: Uuid,
    pub material_name: String,
    pub category: Option<String>,
    pub unit: String,
    pub quantity: Decimal,
    pub available: Decimal,
    pub critical_level: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Append-only stock ledger entry
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockMovement {
    pub id: Uuid,
    pub operation_id: Uuid,
    pub stock_record_id: Uuid,
    pub delta: Decimal,
    pub kind: String,
    pub unit_cost: Decimal,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

pub const MOVEMENT_PRODUCTION_DEDUCTION: &str = "production_deduction";
pub const MOVEMENT_PURCHASE_RECEIPT: &str = "purchase_receipt";

// ============================================================================
// Recipes and menus
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct RecipeLineRow {
    pub id: Uuid,
    pub menu_maintenance_id: Uuid,
    pub raw_material_id: Uuid,
    pub quantity: Decimal,
    pub unit: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RecipeLineRow> for RecipeLine {
    fn from(row: RecipeLineRow) -> Self {
        Self {
            id: row.id,
            menu_maintenance_id: row.menu_maintenance_id,
            raw_material_id: row.raw_material_id,
            quantity: row.quantity,
            unit: row.unit,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct MenuItemRow {
    pub id: Uuid,
    pub menu_maintenance_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub servings: i32,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MenuItemRow> for MenuItem {
    fn from(row: MenuItemRow) -> Self {
        Self {
            id: row.id,
            menu_maintenance_id: row.menu_maintenance_id,
            name: row.name,
            price: row.price,
            servings: row.servings,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub const MENU_ITEM_COLUMNS: &str =
    "id, menu_maintenance_id, name, price, servings, created_by, created_at, updated_at";

// ============================================================================
// Production
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct ProductionRunRow {
    pub id: Uuid,
    pub menu_maintenance_id: Uuid,
    pub quantity: i32,
    pub status: String,
    pub approval_status: String,
    pub approval_action: Option<String>,
    pub inventory_deducted: bool,
    pub expected_cost: Decimal,
    pub actual_cost: Option<Decimal>,
    pub srp: Option<Decimal>,
    pub notes: Option<String>,
    pub approval_notes: Option<String>,
    pub pending_changes: Option<Json<ProductionChanges>>,
    pub requested_by: Option<Uuid>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProductionRunRow> for ProductionRun {
    type Error = AppError;

    fn try_from(row: ProductionRunRow) -> AppResult<Self> {
        let approval_action = match row.approval_action.as_deref() {
            Some(action) => Some(parse_column(
                "approval_action",
                action,
                ApprovalAction::from_str,
            )?),
            None => None,
        };

        Ok(Self {
            id: row.id,
            menu_maintenance_id: row.menu_maintenance_id,
            quantity: row.quantity,
            status: parse_column("status", &row.status, ProductionStatus::from_str)?,
            approval_status: parse_column(
                "approval_status",
                &row.approval_status,
                ApprovalStatus::from_str,
            )?,
            approval_action,
            inventory_deducted: row.inventory_deducted,
            expected_cost: row.expected_cost,
            actual_cost: row.actual_cost,
            srp: row.srp,
            notes: row.notes,
            approval_notes: row.approval_notes,
            pending_changes: row.pending_changes.map(|Json(changes)| changes),
            requested_by: row.requested_by,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub const PRODUCTION_COLUMNS: &str = "id, menu_maintenance_id, quantity, status, approval_status, \
     approval_action, inventory_deducted, expected_cost, actual_cost, srp, notes, approval_notes, \
     pending_changes, requested_by, approved_by, approved_at, created_at, updated_at";

// ============================================================================
// Orders
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub channel: String,
    pub status: String,
    pub servings_deducted: bool,
    pub customer_name: Option<String>,
    pub table_number: Option<String>,
    pub delivery_address: Option<String>,
    pub total_amount: Decimal,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct OrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub menu_item_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            menu_item_id: row.menu_item_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            subtotal: row.subtotal,
        }
    }
}

impl OrderRow {
    pub fn into_order(self, items: Vec<OrderItemRow>) -> AppResult<Order> {
        Ok(Order {
            id: self.id,
            channel: parse_column("channel", &self.channel, OrderChannel::from_str)?,
            status: parse_column("status", &self.status, OrderStatus::from_str)?,
            servings_deducted: self.servings_deducted,
            customer_name: self.customer_name,
            table_number: self.table_number,
            delivery_address: self.delivery_address,
            total_amount: self.total_amount,
            items: items.into_iter().map(OrderItem::from).collect(),
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub const ORDER_COLUMNS: &str = "id, channel, status, servings_deducted, customer_name, \
     table_number, delivery_address, total_amount, created_by, created_at, updated_at";

// ============================================================================
// Purchasing
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct PurchaseOrderRow {
    pub id: Uuid,
    pub supplier_name: String,
    pub status: String,
    pub order_date: NaiveDate,
    pub date_received: Option<NaiveDate>,
    pub total_amount: Decimal,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PurchaseOrderItemRow {
    pub id: Uuid,
    pub purchase_order_id: Uuid,
    pub raw_material_id: Uuid,
    pub unit_conversion_id: Option<Uuid>,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub received_quantity: Option<Decimal>,
    pub subtotal: Decimal,
}

impl From<PurchaseOrderItemRow> for PurchaseOrderItem {
    fn from(row: PurchaseOrderItemRow) -> Self {
        Self {
            id: row.id,
            purchase_order_id: row.purchase_order_id,
            raw_material_id: row.raw_material_id,
            unit_conversion_id: row.unit_conversion_id,
            unit: row.unit,
            quantity: row.quantity,
            unit_price: row.unit_price,
            received_quantity: row.received_quantity,
            subtotal: row.subtotal,
        }
    }
}

impl PurchaseOrderRow {
    pub fn into_purchase_order(self, items: Vec<PurchaseOrderItemRow>) -> AppResult<PurchaseOrder> {
        Ok(PurchaseOrder {
            id: self.id,
            supplier_name: self.supplier_name,
            status: parse_column("status", &self.status, PurchaseOrderStatus::from_str)?,
            order_date: self.order_date,
            date_received: self.date_received,
            total_amount: self.total_amount,
            items: items.into_iter().map(PurchaseOrderItem::from).collect(),
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub const PURCHASE_ORDER_COLUMNS: &str = "id, supplier_name, status, order_date, date_received, \
     total_amount, created_by, created_at, updated_at";

pub const PURCHASE_ORDER_ITEM_COLUMNS: &str = "id, purchase_order_id, raw_material_id, \
     unit_conversion_id, unit, quantity, unit_price, received_quantity, subtotal";
