//! Domain errors raised by the inventory and production ledger

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::Role;

/// Why a single recipe line could not be deducted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallReason {
    /// No stock record exists for the material in its base unit
    NotFound,
    /// A stock record exists but holds less than needed
    Insufficient,
}

/// One failing ingredient in an aggregated stock error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockShortfall {
    pub raw_material_id: Uuid,
    pub material_name: String,
    pub needed: Decimal,
    pub available: Decimal,
    pub unit: String,
    pub reason: ShortfallReason,
}

impl StockShortfall {
    /// Amount missing to satisfy the line
    pub fn missing(&self) -> Decimal {
        (self.needed - self.available).max(Decimal::ZERO)
    }
}

/// One menu item that cannot cover an order line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServingsShortfall {
    pub menu_item_id: Uuid,
    pub name: String,
    pub requested: i32,
    pub servings: i32,
}

/// Ledger error taxonomy
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("No conversion from '{unit}' to the base unit of raw material {raw_material_id}")]
    UnresolvedUnit { raw_material_id: Uuid, unit: String },

    #[error("Menu {menu_maintenance_id} has no recipe defined")]
    NoRecipeDefined { menu_maintenance_id: Uuid },

    #[error("Insufficient stock for {} ingredient(s)", shortfalls.len())]
    InsufficientStock { shortfalls: Vec<StockShortfall> },

    #[error("Raw material {raw_material_id} has no stock in '{unit}'")]
    NotFoundInInventory { raw_material_id: Uuid, unit: String },

    #[error("Invalid approval state: {0}")]
    InvalidApprovalState(String),

    #[error("Role {role} is not authorized to {action}")]
    RoleNotAuthorized { role: Role, action: String },

    #[error("Insufficient servings for {} menu item(s)", shortfalls.len())]
    InsufficientServings { shortfalls: Vec<ServingsShortfall> },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },
}

impl LedgerError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        LedgerError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        LedgerError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
