//! Sellable menu items and their servings counter

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult, ServingsShortfall};

/// A sellable menu item created by the first completed production
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: Uuid,
    pub menu_maintenance_id: Uuid,
    pub name: String,
    pub price: Decimal,
    /// Ready-to-sell portions, never negative
    pub servings: i32,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MenuItem {
    pub fn has_sufficient_servings(&self, quantity: i32) -> bool {
        has_sufficient_servings(self.servings, quantity)
    }
}

/// Why servings changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServingsReason {
    ProductionCompleted,
    OrderFulfilled,
    OrderCancelled,
    OrderDeleted,
    ManualAdjustment,
}

impl ServingsReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServingsReason::ProductionCompleted => "production_completed",
            ServingsReason::OrderFulfilled => "order_fulfilled",
            ServingsReason::OrderCancelled => "order_cancelled",
            ServingsReason::OrderDeleted => "order_deleted",
            ServingsReason::ManualAdjustment => "manual_adjustment",
        }
    }
}

/// Answer to a servings availability check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServingsCheck {
    pub menu_item_id: Uuid,
    pub requested: i32,
    pub servings: i32,
    pub available: bool,
}

pub fn has_sufficient_servings(servings: i32, quantity: i32) -> bool {
    servings >= quantity
}

/// Servings after applying `delta`, refusing to go below zero
pub fn apply_servings_delta(item: &MenuItem, delta: i32) -> LedgerResult<i32> {
    match item.servings.checked_add(delta) {
        Some(next) if next >= 0 => Ok(next),
        Some(_) => Err(LedgerError::InsufficientServings {
            shortfalls: vec![ServingsShortfall {
                menu_item_id: item.id,
                name: item.name.clone(),
                requested: delta.saturating_neg(),
                servings: item.servings,
            }],
        }),
        None => Err(LedgerError::validation("delta", "Servings delta overflows")),
    }
}

/// Check every requested `(menu_item_id, quantity)` against `items`.
///
/// Quantities for the same menu item are summed first. Fails with one
/// aggregated error naming every item that cannot cover its total.
pub fn check_servings(
    items: &[MenuItem],
    requested: &[(Uuid, i32)],
) -> LedgerResult<Vec<(Uuid, i32)>> {
    let totals = sum_by_item(requested)?;
    let mut shortfalls = Vec::new();

    for (menu_item_id, quantity) in &totals {
        let item = items
            .iter()
            .find(|i| i.id == *menu_item_id)
            .ok_or_else(|| LedgerError::validation("menu_item_id", format!("Unknown menu item {}", menu_item_id)))?;
        if !item.has_sufficient_servings(*quantity) {
            shortfalls.push(ServingsShortfall {
                menu_item_id: item.id,
                name: item.name.clone(),
                requested: *quantity,
                servings: item.servings,
            });
        }
    }

    if shortfalls.is_empty() {
        Ok(totals)
    } else {
        Err(LedgerError::InsufficientServings { shortfalls })
    }
}

/// Sum quantities per menu item, in ascending id order.
///
/// Fails when a per-item total does not fit in `i32`.
pub fn sum_by_item(requested: &[(Uuid, i32)]) -> LedgerResult<Vec<(Uuid, i32)>> {
    let mut totals: Vec<(Uuid, i32)> = Vec::new();
    for (id, quantity) in requested {
        match totals.iter_mut().find(|(t, _)| t == id) {
            Some((_, total)) => {
                *total = total.checked_add(*quantity).ok_or_else(|| {
                    LedgerError::validation(
                        "quantity",
                        format!("Total quantity for menu item {} is too large", id),
                    )
                })?;
            }
            None => totals.push((*id, *quantity)),
        }
    }
    totals.sort_by_key(|(id, _)| *id);
    Ok(totals)
}
