//! Raw materials, unit conversions and stock records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};

/// A raw material tracked in its base unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMaterial {
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
    /// Base unit stock is tracked in (e.g. "kg")
    pub unit: String,
    /// Price per base unit
    pub unit_price: Decimal,
    /// Reorder threshold in base units
    pub critical_level: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Conversion between a material's base unit and an equivalent unit.
///
/// `quantity` is the number of equivalent units in one base unit, so a
/// quantity expressed in the equivalent unit divides by it to reach the
/// base unit. A kg-based material bought in 25 kg sacks stores `0.04`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitConversion {
    pub id: Uuid,
    pub raw_material_id: Uuid,
    pub base_unit: String,
    pub equivalent_unit: String,
    pub quantity: Decimal,
    /// Price per equivalent unit
    pub unit_price: Decimal,
    /// Suggested retail price per equivalent unit
    pub srp: Option<Decimal>,
    pub is_default_retail: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UnitConversion {
    /// Convert an amount in the equivalent unit into base units
    pub fn to_base(&self, equivalent_quantity: Decimal) -> LedgerResult<Decimal> {
        if self.quantity <= Decimal::ZERO {
            return Err(LedgerError::UnresolvedUnit {
                raw_material_id: self.raw_material_id,
                unit: self.equivalent_unit.clone(),
            });
        }
        Ok(equivalent_quantity / self.quantity)
    }

    /// Convert an amount in base units into the equivalent unit
    pub fn from_base(&self, base_quantity: Decimal) -> Decimal {
        base_quantity * self.quantity
    }

    /// Price of one base unit
    pub fn base_unit_price(&self) -> Decimal {
        self.unit_price * self.quantity
    }
}

/// Quantity resolved into a material's base unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedQuantity {
    pub raw_material_id: Uuid,
    pub base_quantity: Decimal,
    pub base_unit: String,
    pub base_price_per_unit: Decimal,
}

impl ResolvedQuantity {
    pub fn cost(&self) -> Decimal {
        self.base_quantity * self.base_price_per_unit
    }
}

/// Resolve `quantity` expressed in `unit` into the material's base unit.
///
/// `conversion` must be the row for `(material, equivalent_unit = unit)`, if
/// one exists. It is ignored when `unit` already is the base unit.
pub fn resolve_to_base(
    material: &RawMaterial,
    conversion: Option<&UnitConversion>,
    quantity: Decimal,
    unit: &str,
) -> LedgerResult<ResolvedQuantity> {
    if unit == material.unit {
        return Ok(ResolvedQuantity {
            raw_material_id: material.id,
            base_quantity: quantity,
            base_unit: material.unit.clone(),
            base_price_per_unit: material.unit_price,
        });
    }

    let conversion = conversion
        .filter(|c| c.raw_material_id == material.id && c.equivalent_unit == unit)
        .ok_or_else(|| LedgerError::UnresolvedUnit {
            raw_material_id: material.id,
            unit: unit.to_string(),
        })?;

    Ok(ResolvedQuantity {
        raw_material_id: material.id,
        base_quantity: conversion.to_base(quantity)?,
        base_unit: conversion.base_unit.clone(),
        base_price_per_unit: conversion.base_unit_price(),
    })
}

/// Stock held for one raw material in one base unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockRecord {
    pub id: Uuid,
    pub raw_material_id: Uuid,
    pub unit: String,
    /// Total on hand
    pub quantity: Decimal,
    /// On hand and not reserved by production
    pub available: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockRecord {
    pub fn is_consistent(&self) -> bool {
        self.available >= Decimal::ZERO && self.available <= self.quantity
    }
}

/// Find the stock record holding `raw_material_id` in `unit`
pub fn locate_stock<'a>(
    stock: &'a [StockRecord],
    raw_material_id: Uuid,
    unit: &str,
) -> LedgerResult<&'a StockRecord> {
    stock
        .iter()
        .find(|s| s.raw_material_id == raw_material_id && s.unit == unit)
        .ok_or_else(|| LedgerError::NotFoundInInventory {
            raw_material_id,
            unit: unit.to_string(),
        })
}

/// Whether stock has dropped to the reorder threshold
pub fn is_below_critical(available: Decimal, critical_level: Decimal) -> bool {
    available <= critical_level
}
