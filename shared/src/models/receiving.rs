//! Purchase orders and delivery intake

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnitConversion;
use crate::error::{LedgerError, LedgerResult};

/// Purchase order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Pending,
    Delivered,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Pending => "pending",
            PurchaseOrderStatus::Delivered => "delivered",
            PurchaseOrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PurchaseOrderStatus::Pending),
            "delivered" => Some(PurchaseOrderStatus::Delivered),
            "cancelled" => Some(PurchaseOrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A purchase order to a supplier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub supplier_name: String,
    pub status: PurchaseOrderStatus,
    pub order_date: NaiveDate,
    pub date_received: Option<NaiveDate>,
    pub total_amount: Decimal,
    pub items: Vec<PurchaseOrderItem>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line of a purchase order, in the unit it was ordered in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrderItem {
    pub id: Uuid,
    pub purchase_order_id: Uuid,
    pub raw_material_id: Uuid,
    /// Set when the line was ordered in an equivalent unit
    pub unit_conversion_id: Option<Uuid>,
    pub unit: String,
    pub quantity: Decimal,
    /// Price per ordered unit
    pub unit_price: Decimal,
    pub received_quantity: Option<Decimal>,
    pub subtotal: Decimal,
}

/// Quantity actually delivered for one purchase order line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineReceipt {
    pub purchase_order_item_id: Uuid,
    pub received_quantity: Decimal,
}

/// A delivered quantity converted into the material's base unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedStock {
    pub purchase_order_item_id: Uuid,
    pub raw_material_id: Uuid,
    pub base_quantity: Decimal,
    pub base_unit: String,
    pub base_unit_price: Decimal,
    pub received_quantity: Decimal,
    pub subtotal: Decimal,
}

/// Convert one delivered line into base units.
///
/// `base_unit` is the material's base unit; `conversion` is the conversion
/// the line was ordered with, if any.
pub fn receive_line(
    item: &PurchaseOrderItem,
    conversion: Option<&UnitConversion>,
    base_unit: &str,
    received_quantity: Decimal,
) -> LedgerResult<ReceivedStock> {
    if received_quantity < Decimal::ZERO {
        return Err(LedgerError::validation(
            "received_quantity",
            "Received quantity cannot be negative",
        ));
    }

    let (base_quantity, base_unit, base_unit_price) = match (item.unit_conversion_id, conversion) {
        (None, _) => (received_quantity, base_unit.to_string(), item.unit_price),
        (Some(id), Some(conversion)) if conversion.id == id => (
            conversion.to_base(received_quantity)?,
            conversion.base_unit.clone(),
            item.unit_price * conversion.quantity,
        ),
        (Some(_), _) => {
            return Err(LedgerError::UnresolvedUnit {
                raw_material_id: item.raw_material_id,
                unit: item.unit.clone(),
            })
        }
    };

    Ok(ReceivedStock {
        purchase_order_item_id: item.id,
        raw_material_id: item.raw_material_id,
        base_quantity,
        base_unit,
        base_unit_price,
        received_quantity,
        subtotal: received_quantity * item.unit_price,
    })
}

/// Purchase order total from what was actually received
pub fn received_total(received: &[ReceivedStock]) -> Decimal {
    received.iter().map(|r| r.subtotal).sum()
}

/// Ensure a purchase order can still take a delivery
pub fn ensure_receivable(status: PurchaseOrderStatus) -> LedgerResult<()> {
    if status == PurchaseOrderStatus::Pending {
        Ok(())
    } else {
        Err(LedgerError::transition(status, PurchaseOrderStatus::Delivered))
    }
}
