//! Dine-in and online orders and their effect on servings

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};

/// Where an order came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderChannel {
    /// Servings are taken when the order is placed
    DineIn,
    /// Servings are taken when the order is completed
    Online,
}

impl OrderChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderChannel::DineIn => "dine_in",
            OrderChannel::Online => "online",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "dine_in" => Some(OrderChannel::DineIn),
            "online" => Some(OrderChannel::Online),
            _ => None,
        }
    }

    pub fn deducts_at_placement(&self) -> bool {
        matches!(self, OrderChannel::DineIn)
    }
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "preparing" => Some(OrderStatus::Preparing),
            "ready" => Some(OrderStatus::Ready),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// The order has been handed to the customer
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, OrderStatus::Completed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    fn rank(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Preparing => 1,
            OrderStatus::Ready => 2,
            OrderStatus::Completed => 3,
            OrderStatus::Cancelled => 4,
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == OrderStatus::Cancelled || next.rank() > self.rank()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An order with its line items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub channel: OrderChannel,
    pub status: OrderStatus,
    pub servings_deducted: bool,
    pub customer_name: Option<String>,
    pub table_number: Option<String>,
    pub delivery_address: Option<String>,
    pub total_amount: Decimal,
    pub items: Vec<OrderItem>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// `(menu_item_id, quantity)` pairs of the order lines
    pub fn quantities(&self) -> Vec<(Uuid, i32)> {
        self.items.iter().map(|i| (i.menu_item_id, i.quantity)).collect()
    }
}

/// A line of an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub menu_item_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// What a change to an order does to servings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServingsEffect {
    None,
    /// Check and decrement servings, then set `servings_deducted`
    Deduct,
    /// Give servings back, then clear `servings_deducted`
    Restore,
}

/// Servings effect of placing an order on `channel`
pub fn placement_effect(channel: OrderChannel) -> ServingsEffect {
    if channel.deducts_at_placement() {
        ServingsEffect::Deduct
    } else {
        ServingsEffect::None
    }
}

/// Validate a status change and decide its servings effect.
///
/// Cancelling an already cancelled order is a no-op.
pub fn status_change_effect(
    channel: OrderChannel,
    current: OrderStatus,
    next: OrderStatus,
    servings_deducted: bool,
) -> LedgerResult<ServingsEffect> {
    if current == OrderStatus::Cancelled && next == OrderStatus::Cancelled {
        return Ok(ServingsEffect::None);
    }
    if !current.can_transition_to(next) {
        return Err(LedgerError::transition(current, next));
    }

    let effect = match next {
        OrderStatus::Cancelled if servings_deducted => ServingsEffect::Restore,
        OrderStatus::Completed
            if channel == OrderChannel::Online && !servings_deducted =>
        {
            ServingsEffect::Deduct
        }
        _ => ServingsEffect::None,
    };
    Ok(effect)
}

/// Servings effect of deleting an order
pub fn removal_effect(status: OrderStatus, servings_deducted: bool) -> ServingsEffect {
    if servings_deducted && !status.is_fulfilled() {
        ServingsEffect::Restore
    } else {
        ServingsEffect::None
    }
}

/// Line subtotal and order total
pub fn order_total(lines: &[(i32, Decimal)]) -> Decimal {
    lines
        .iter()
        .map(|(quantity, unit_price)| Decimal::from(*quantity) * unit_price)
        .sum()
}
