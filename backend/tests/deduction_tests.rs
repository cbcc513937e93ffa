//! Deduction engine tests
//!
//! Tests for recipe deduction planning including:
//! - All-or-nothing: a failing line leaves every stock record untouched
//! - Conservation: stock removed equals the sum of the receipts
//! - Aggregated shortfall reporting

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    aggregate_by_record, estimate_recipe_cost, plan_deduction, DeductionResult, LedgerError,
    RawMaterial, RecipeLine, RecipeRequirement, ShortfallReason, StockRecord, UnitConversion,
};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn material(name: &str, unit: &str, unit_price: Decimal) -> RawMaterial {
    RawMaterial {
        id: Uuid::new_v4(),
        name: name.to_string(),
        category: None,
        unit: unit.to_string(),
        unit_price,
        critical_level: dec("5"),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn requirement(
    menu_id: Uuid,
    material: &RawMaterial,
    quantity: Decimal,
    unit: &str,
    conversion: Option<UnitConversion>,
) -> RecipeRequirement {
    RecipeRequirement {
        line: RecipeLine {
            id: Uuid::new_v4(),
            menu_maintenance_id: menu_id,
            raw_material_id: material.id,
            quantity,
            unit: unit.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        },
        material: material.clone(),
        conversion,
    }
}

fn stock(material: &RawMaterial, available: Decimal) -> StockRecord {
    StockRecord {
        id: Uuid::new_v4(),
        raw_material_id: material.id,
        unit: material.unit.clone(),
        quantity: available,
        available,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn sack(material: &RawMaterial) -> UnitConversion {
    UnitConversion {
        id: Uuid::new_v4(),
        raw_material_id: material.id,
        base_unit: material.unit.clone(),
        equivalent_unit: "sack".to_string(),
        quantity: dec("0.04"),
        unit_price: dec("1000"),
        srp: Some(dec("1100")),
        is_default_retail: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// 10 pieces at 0.5 kg each need 5 kg; 3 kg on hand is short by 2
    #[test]
    fn test_flour_shortage_is_reported() {
        let menu_id = Uuid::new_v4();
        let flour = material("Flour", "kg", dec("40"));
        let reqs = vec![requirement(menu_id, &flour, dec("0.5"), "kg", None)];
        let stock = vec![stock(&flour, dec("3"))];

        let err = plan_deduction(menu_id, &reqs, &stock, dec("10")).unwrap_err();
        match err {
            LedgerError::InsufficientStock { shortfalls } => {
                assert_eq!(shortfalls.len(), 1);
                assert_eq!(shortfalls[0].material_name, "Flour");
                assert_eq!(shortfalls[0].needed, dec("5"));
                assert_eq!(shortfalls[0].available, dec("3"));
                assert_eq!(shortfalls[0].unit, "kg");
                assert_eq!(shortfalls[0].reason, ShortfallReason::Insufficient);
                assert_eq!(shortfalls[0].missing(), dec("2"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    /// With 10 kg on hand the same run succeeds and leaves 5 kg
    #[test]
    fn test_flour_deduction_succeeds() {
        let menu_id = Uuid::new_v4();
        let flour = material("Flour", "kg", dec("40"));
        let reqs = vec![requirement(menu_id, &flour, dec("0.5"), "kg", None)];
        let stock = vec![stock(&flour, dec("10"))];

        let plan = plan_deduction(menu_id, &reqs, &stock, dec("10")).unwrap();
        assert_eq!(plan.receipts.len(), 1);
        assert_eq!(plan.receipts[0].amount, dec("5"));
        assert_eq!(plan.receipts[0].remaining_available, dec("5"));
        assert_eq!(plan.total_cost(), dec("200"));
        assert!(plan.receipts[0].is_below_critical());
    }

    /// Recipe quantities in sacks are converted before checking stock
    #[test]
    fn test_recipe_in_equivalent_unit() {
        let menu_id = Uuid::new_v4();
        let flour = material("Flour", "kg", dec("40"));
        let reqs = vec![requirement(menu_id, &flour, dec("0.02"), "sack", Some(sack(&flour)))];
        let stock = vec![stock(&flour, dec("60"))];

        // 0.02 sack per piece * 100 pieces = 2 sacks = 50 kg
        let plan = plan_deduction(menu_id, &reqs, &stock, dec("100")).unwrap();
        assert_eq!(plan.receipts[0].amount, dec("50"));
        assert_eq!(plan.receipts[0].unit, "kg");
        assert_eq!(plan.receipts[0].unit_cost, dec("40"));
        assert_eq!(plan.receipts[0].remaining_available, dec("10"));
    }

    /// Every failing line is listed, not just the first
    #[test]
    fn test_all_shortfalls_reported() {
        let menu_id = Uuid::new_v4();
        let flour = material("Flour", "kg", dec("40"));
        let sugar = material("Sugar", "kg", dec("60"));
        let eggs = material("Eggs", "pc", dec("8"));
        let reqs = vec![
            requirement(menu_id, &flour, dec("0.5"), "kg", None),
            requirement(menu_id, &sugar, dec("0.1"), "kg", None),
            requirement(menu_id, &eggs, dec("2"), "pc", None),
        ];
        // Sugar has no stock record at all; flour is short; eggs are fine
        let stock = vec![stock(&flour, dec("1")), stock(&eggs, dec("100"))];

        let err = plan_deduction(menu_id, &reqs, &stock, dec("10")).unwrap_err();
        let LedgerError::InsufficientStock { shortfalls } = err else {
            panic!("expected InsufficientStock");
        };
        assert_eq!(shortfalls.len(), 2);
        assert!(shortfalls
            .iter()
            .any(|s| s.material_name == "Sugar" && s.reason == ShortfallReason::NotFound));
        assert!(shortfalls
            .iter()
            .any(|s| s.material_name == "Flour" && s.reason == ShortfallReason::Insufficient));
    }

    #[test]
    fn test_empty_recipe_is_rejected() {
        let menu_id = Uuid::new_v4();
        let err = plan_deduction(menu_id, &[], &[], dec("1")).unwrap_err();
        assert_eq!(err, LedgerError::NoRecipeDefined { menu_maintenance_id: menu_id });
    }

    #[test]
    fn test_unresolvable_unit_is_rejected() {
        let menu_id = Uuid::new_v4();
        let flour = material("Flour", "kg", dec("40"));
        let reqs = vec![requirement(menu_id, &flour, dec("1"), "cup", None)];
        let stock = vec![stock(&flour, dec("10"))];

        let err = plan_deduction(menu_id, &reqs, &stock, dec("1")).unwrap_err();
        assert!(matches!(err, LedgerError::UnresolvedUnit { .. }));
    }

    #[test]
    fn test_expected_cost_matches_plan_cost() {
        let menu_id = Uuid::new_v4();
        let flour = material("Flour", "kg", dec("40"));
        let eggs = material("Eggs", "pc", dec("8"));
        let reqs = vec![
            requirement(menu_id, &flour, dec("0.5"), "kg", None),
            requirement(menu_id, &eggs, dec("2"), "pc", None),
        ];
        let stock = vec![stock(&flour, dec("100")), stock(&eggs, dec("100"))];

        let expected = estimate_recipe_cost(menu_id, &reqs, dec("10")).unwrap();
        let plan = plan_deduction(menu_id, &reqs, &stock, dec("10")).unwrap();
        // 5 kg * 40 + 20 pc * 8
        assert_eq!(expected, dec("360"));
        assert_eq!(plan.total_cost(), expected);
    }

    #[test]
    fn test_result_carries_operation_id() {
        let menu_id = Uuid::new_v4();
        let flour = material("Flour", "kg", dec("40"));
        let reqs = vec![requirement(menu_id, &flour, dec("0.5"), "kg", None)];
        let stock = vec![stock(&flour, dec("10"))];
        let plan = plan_deduction(menu_id, &reqs, &stock, dec("2")).unwrap();

        let operation_id = Uuid::new_v4();
        let result = DeductionResult::from_plan(operation_id, plan);
        assert_eq!(result.operation_id, operation_id);
        assert_eq!(result.total_cost, dec("40"));
    }

    #[test]
    fn test_aggregate_by_record_sums_and_sorts() {
        let menu_id = Uuid::new_v4();
        let flour = material("Flour", "kg", dec("40"));
        let eggs = material("Eggs", "pc", dec("8"));
        let reqs = vec![
            requirement(menu_id, &flour, dec("0.5"), "kg", None),
            requirement(menu_id, &eggs, dec("2"), "pc", None),
        ];
        let stock = vec![stock(&flour, dec("100")), stock(&eggs, dec("100"))];
        let plan = plan_deduction(menu_id, &reqs, &stock, dec("4")).unwrap();

        let totals = aggregate_by_record(&plan.receipts);
        assert_eq!(totals.len(), 2);
        assert!(totals[0].0 < totals[1].0);
        let sum: Decimal = totals.iter().map(|(_, amount)| *amount).sum();
        assert_eq!(sum, plan.total_amount());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for per-piece recipe quantities (0.1 to 10.0)
    fn per_piece_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=100i64).prop_map(|n| Decimal::new(n, 1))
    }

    /// Strategy for stock on hand (0.0 to 500.0)
    fn available_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=5000i64).prop_map(|n| Decimal::new(n, 1))
    }

    fn scenario(
        lines: &[(Decimal, Decimal)],
    ) -> (Uuid, Vec<RecipeRequirement>, Vec<StockRecord>) {
        let menu_id = Uuid::new_v4();
        let mut reqs = Vec::new();
        let mut records = Vec::new();
        for (i, (per_piece, available)) in lines.iter().enumerate() {
            let m = material(&format!("Material {}", i), "kg", dec("10"));
            reqs.push(requirement(menu_id, &m, *per_piece, "kg", None));
            records.push(stock(&m, *available));
        }
        (menu_id, reqs, records)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A plan either covers every line or reports every short line
        #[test]
        fn prop_deduction_is_all_or_nothing(
            lines in prop::collection::vec((per_piece_strategy(), available_strategy()), 1..8),
            produced in 1i64..50i64
        ) {
            let (menu_id, reqs, records) = scenario(&lines);
            let produced = Decimal::from(produced);
            let short = lines
                .iter()
                .filter(|(per_piece, available)| per_piece * produced > *available)
                .count();

            match plan_deduction(menu_id, &reqs, &records, produced) {
                Ok(plan) => {
                    prop_assert_eq!(short, 0);
                    prop_assert_eq!(plan.receipts.len(), lines.len());
                }
                Err(LedgerError::InsufficientStock { shortfalls }) => {
                    prop_assert_eq!(shortfalls.len(), short);
                    for s in &shortfalls {
                        prop_assert!(s.needed > s.available);
                    }
                }
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
        }

        /// Stock after a successful plan equals stock before minus what was deducted
        #[test]
        fn prop_deduction_conserves_stock(
            lines in prop::collection::vec((per_piece_strategy(), available_strategy()), 1..8),
            produced in 1i64..50i64
        ) {
            let (menu_id, reqs, records) = scenario(&lines);
            let produced = Decimal::from(produced);

            if let Ok(plan) = plan_deduction(menu_id, &reqs, &records, produced) {
                let before: Decimal = records.iter().map(|r| r.available).sum();
                let after: Decimal = plan.receipts.iter().map(|r| r.remaining_available).sum();
                prop_assert_eq!(before - after, plan.total_amount());
                for receipt in &plan.receipts {
                    prop_assert!(receipt.remaining_available >= Decimal::ZERO);
                }

                let mut applied = records.clone();
                for receipt in &plan.receipts {
                    let record = applied
                        .iter_mut()
                        .find(|r| r.id == receipt.stock_record_id)
                        .unwrap();
                    record.quantity -= receipt.amount;
                    record.available -= receipt.amount;
                }
                for record in &applied {
                    prop_assert!(record.is_consistent());
                }
            }
        }

        /// The expected cost of a recipe equals the cost of actually deducting it
        #[test]
        fn prop_plan_cost_matches_estimate(
            per_piece in prop::collection::vec(per_piece_strategy(), 1..6),
            produced in 1i64..20i64
        ) {
            let lines: Vec<(Decimal, Decimal)> =
                per_piece.iter().map(|p| (*p, dec("100000"))).collect();
            let (menu_id, reqs, records) = scenario(&lines);
            let produced = Decimal::from(produced);

            let estimate = estimate_recipe_cost(menu_id, &reqs, produced).unwrap();
            let plan = plan_deduction(menu_id, &reqs, &records, produced).unwrap();
            prop_assert_eq!(estimate, plan.total_cost());
        }
    }
}
