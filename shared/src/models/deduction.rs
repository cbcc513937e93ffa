//! Deduction planning for production runs
//!
//! A plan is computed against a snapshot of locked stock records. Either every
//! recipe line fits and the plan lists the exact decrements, or the whole
//! request fails with one aggregated shortfall list. Nothing is applied here.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{locate_stock, RecipeRequirement, StockRecord};
use crate::error::{LedgerError, LedgerResult, ShortfallReason, StockShortfall};

/// Decrement to apply to one stock record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeductionReceipt {
    pub stock_record_id: Uuid,
    pub raw_material_id: Uuid,
    pub material_name: String,
    pub amount: Decimal,
    pub unit: String,
    pub remaining_available: Decimal,
    pub unit_cost: Decimal,
    /// Reorder threshold of the material, for low-stock alerts
    pub critical_level: Decimal,
}

impl DeductionReceipt {
    pub fn cost(&self) -> Decimal {
        self.amount * self.unit_cost
    }

    pub fn is_below_critical(&self) -> bool {
        super::is_below_critical(self.remaining_available, self.critical_level)
    }
}

/// All decrements for one production request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeductionPlan {
    pub menu_maintenance_id: Uuid,
    pub produced_quantity: Decimal,
    pub receipts: Vec<DeductionReceipt>,
}

impl DeductionPlan {
    pub fn total_cost(&self) -> Decimal {
        self.receipts.iter().map(DeductionReceipt::cost).sum()
    }

    pub fn total_amount(&self) -> Decimal {
        self.receipts.iter().map(|r| r.amount).sum()
    }
}

/// Outcome of a committed deduction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeductionResult {
    pub operation_id: Uuid,
    pub menu_maintenance_id: Uuid,
    pub produced_quantity: Decimal,
    pub receipts: Vec<DeductionReceipt>,
    pub total_cost: Decimal,
}

impl DeductionResult {
    pub fn from_plan(operation_id: Uuid, plan: DeductionPlan) -> Self {
        let total_cost = plan.total_cost();
        Self {
            operation_id,
            menu_maintenance_id: plan.menu_maintenance_id,
            produced_quantity: plan.produced_quantity,
            receipts: plan.receipts,
            total_cost,
        }
    }
}

/// Plan the stock decrements for producing `produced_quantity` pieces.
///
/// `stock` holds the current records of the recipe's materials. Lines that
/// land on the same record are checked against the running remainder.
pub fn plan_deduction(
    menu_maintenance_id: Uuid,
    requirements: &[RecipeRequirement],
    stock: &[StockRecord],
    produced_quantity: Decimal,
) -> LedgerResult<DeductionPlan> {
    if requirements.is_empty() {
        return Err(LedgerError::NoRecipeDefined { menu_maintenance_id });
    }
    if produced_quantity <= Decimal::ZERO {
        return Err(LedgerError::validation(
            "quantity",
            "Produced quantity must be positive",
        ));
    }

    // Running remainder per stock record id
    let mut remaining: HashMap<Uuid, Decimal> = HashMap::new();

    let mut receipts = Vec::with_capacity(requirements.len());
    let mut shortfalls = Vec::new();

    for req in requirements {
        let resolved = req.resolve(produced_quantity)?;

        let record = match locate_stock(stock, resolved.raw_material_id, &resolved.base_unit) {
            Ok(record) => record,
            Err(LedgerError::NotFoundInInventory { .. }) => {
                shortfalls.push(StockShortfall {
                    raw_material_id: req.material.id,
                    material_name: req.material.name.clone(),
                    needed: resolved.base_quantity,
                    available: Decimal::ZERO,
                    unit: resolved.base_unit.clone(),
                    reason: ShortfallReason::NotFound,
                });
                continue;
            }
            Err(e) => return Err(e),
        };
        let available = remaining.entry(record.id).or_insert(record.available);

        if *available < resolved.base_quantity {
            shortfalls.push(StockShortfall {
                raw_material_id: req.material.id,
                material_name: req.material.name.clone(),
                needed: resolved.base_quantity,
                available: *available,
                unit: resolved.base_unit.clone(),
                reason: ShortfallReason::Insufficient,
            });
        } else {
            *available -= resolved.base_quantity;
            receipts.push(DeductionReceipt {
                stock_record_id: record.id,
                raw_material_id: req.material.id,
                material_name: req.material.name.clone(),
                amount: resolved.base_quantity,
                unit: resolved.base_unit.clone(),
                remaining_available: *available,
                unit_cost: resolved.base_price_per_unit,
                critical_level: req.material.critical_level,
            });
        }
    }

    if !shortfalls.is_empty() {
        return Err(LedgerError::InsufficientStock { shortfalls });
    }

    // Later lines on the same record leave the final remainder on every receipt
    for receipt in receipts.iter_mut() {
        if let Some(available) = remaining.get(&receipt.stock_record_id) {
            receipt.remaining_available = *available;
        }
    }

    Ok(DeductionPlan {
        menu_maintenance_id,
        produced_quantity,
        receipts,
    })
}

/// Sum of decrements per stock record, in ascending record id order
pub fn aggregate_by_record(receipts: &[DeductionReceipt]) -> Vec<(Uuid, Decimal)> {
    let mut totals: Vec<(Uuid, Decimal)> = Vec::new();
    for receipt in receipts {
        match totals.iter_mut().find(|(id, _)| *id == receipt.stock_record_id) {
            Some((_, amount)) => *amount += receipt.amount,
            None => totals.push((receipt.stock_record_id, receipt.amount)),
        }
    }
    totals.sort_by_key(|(id, _)| *id);
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawMaterial, RecipeLine, UnitConversion};
    use chrono::Utc;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn material(name: &str, unit: &str, price: &str) -> RawMaterial {
        RawMaterial {
            id: Uuid::new_v4(),
            name: name.to_string(),
            category: None,
            unit: unit.to_string(),
            unit_price: dec(price),
            critical_level: dec("1"),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn requirement(
        menu_id: Uuid,
        material: &RawMaterial,
        quantity: &str,
        unit: &str,
        conversion: Option<UnitConversion>,
    ) -> RecipeRequirement {
        RecipeRequirement {
            line: RecipeLine {
                id: Uuid::new_v4(),
                menu_maintenance_id: menu_id,
                raw_material_id: material.id,
                quantity: dec(quantity),
                unit: unit.to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            material: material.clone(),
            conversion,
        }
    }

    fn stock(material: &RawMaterial, available: &str) -> StockRecord {
        StockRecord {
            id: Uuid::new_v4(),
            raw_material_id: material.id,
            unit: material.unit.clone(),
            quantity: dec(available),
            available: dec(available),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_recipe_fails() {
        let menu_id = Uuid::new_v4();
        let err = plan_deduction(menu_id, &[], &[], dec("1")).unwrap_err();
        assert_eq!(
            err,
            LedgerError::NoRecipeDefined {
                menu_maintenance_id: menu_id
            }
        );
    }

    #[test]
    fn test_flour_shortage_reports_needed_and_available() {
        let menu_id = Uuid::new_v4();
        let flour = material("Flour", "kg", "40");
        let reqs = vec![requirement(menu_id, &flour, "0.5", "kg", None)];
        let records = vec![stock(&flour, "3")];

        let err = plan_deduction(menu_id, &reqs, &records, dec("10")).unwrap_err();
        match err {
            LedgerError::InsufficientStock { shortfalls } => {
                assert_eq!(shortfalls.len(), 1);
                assert_eq!(shortfalls[0].material_name, "Flour");
                assert_eq!(shortfalls[0].needed, dec("5"));
                assert_eq!(shortfalls[0].available, dec("3"));
                assert_eq!(shortfalls[0].unit, "kg");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_stock_record_is_not_found() {
        let menu_id = Uuid::new_v4();
        let flour = material("Flour", "kg", "40");
        let sugar = material("Sugar", "kg", "60");
        let reqs = vec![
            requirement(menu_id, &flour, "0.5", "kg", None),
            requirement(menu_id, &sugar, "0.1", "kg", None),
        ];
        let records = vec![stock(&flour, "100")];

        let err = plan_deduction(menu_id, &reqs, &records, dec("2")).unwrap_err();
        let LedgerError::InsufficientStock { shortfalls } = err else {
            panic!("expected stock error");
        };
        assert_eq!(shortfalls.len(), 1);
        assert_eq!(shortfalls[0].reason, ShortfallReason::NotFound);
        assert_eq!(shortfalls[0].material_name, "Sugar");
    }

    #[test]
    fn test_successful_plan_lists_receipts() {
        let menu_id = Uuid::new_v4();
        let flour = material("Flour", "kg", "40");
        let reqs = vec![requirement(menu_id, &flour, "0.5", "kg", None)];
        let records = vec![stock(&flour, "10")];

        let plan = plan_deduction(menu_id, &reqs, &records, dec("10")).unwrap();
        assert_eq!(plan.receipts.len(), 1);
        assert_eq!(plan.receipts[0].amount, dec("5"));
        assert_eq!(plan.receipts[0].remaining_available, dec("5"));
        assert_eq!(plan.total_cost(), dec("200"));
    }

    #[test]
    fn test_aggregate_sums_same_record() {
        let id = Uuid::new_v4();
        let receipt = DeductionReceipt {
            stock_record_id: id,
            raw_material_id: Uuid::new_v4(),
            material_name: "Salt".to_string(),
            amount: dec("1.5"),
            unit: "kg".to_string(),
            remaining_available: Decimal::ZERO,
            unit_cost: Decimal::ONE,
            critical_level: Decimal::ZERO,
        };
        let totals = aggregate_by_record(&[receipt.clone(), receipt]);
        assert_eq!(totals, vec![(id, dec("3"))]);
    }
}
