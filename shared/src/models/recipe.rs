//! Recipe catalog models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{resolve_to_base, RawMaterial, ResolvedQuantity, UnitConversion};
use crate::error::{LedgerError, LedgerResult};

/// One ingredient of a menu's recipe, per produced piece
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeLine {
    pub id: Uuid,
    pub menu_maintenance_id: Uuid,
    pub raw_material_id: Uuid,
    pub quantity: Decimal,
    /// May differ from the material's base unit
    pub unit: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A recipe line joined with what is needed to resolve it
#[derive(Debug, Clone)]
pub struct RecipeRequirement {
    pub line: RecipeLine,
    pub material: RawMaterial,
    /// Conversion for `line.unit`, when it is not the base unit
    pub conversion: Option<UnitConversion>,
}

impl RecipeRequirement {
    /// Resolve this line for `produced_quantity` pieces
    pub fn resolve(&self, produced_quantity: Decimal) -> LedgerResult<ResolvedQuantity> {
        let needed = self.line.quantity * produced_quantity;
        resolve_to_base(
            &self.material,
            self.conversion.as_ref(),
            needed,
            &self.line.unit,
        )
    }
}

/// Expected material cost of producing `produced_quantity` pieces
pub fn estimate_recipe_cost(
    menu_maintenance_id: Uuid,
    requirements: &[RecipeRequirement],
    produced_quantity: Decimal,
) -> LedgerResult<Decimal> {
    if requirements.is_empty() {
        return Err(LedgerError::NoRecipeDefined { menu_maintenance_id });
    }

    requirements.iter().try_fold(Decimal::ZERO, |total, req| {
        Ok(total + req.resolve(produced_quantity)?.cost())
    })
}
