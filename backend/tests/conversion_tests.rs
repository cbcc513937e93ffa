//! Unit conversion tests
//!
//! Tests for resolving recipe and purchase units including:
//! - Base unit pass-through
//! - Equivalent unit to base unit conversion and pricing
//! - Round trips between base and equivalent units

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{resolve_to_base, validate_conversion, LedgerError, RawMaterial, UnitConversion};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn flour() -> RawMaterial {
    RawMaterial {
        id: Uuid::new_v4(),
        name: "Flour".to_string(),
        category: Some("Dry goods".to_string()),
        unit: "kg".to_string(),
        unit_price: dec("40"),
        critical_level: dec("10"),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn conversion(material: &RawMaterial, unit: &str, ratio: Decimal, unit_price: Decimal) -> UnitConversion {
    UnitConversion {
        id: Uuid::new_v4(),
        raw_material_id: material.id,
        base_unit: material.unit.clone(),
        equivalent_unit: unit.to_string(),
        quantity: ratio,
        unit_price,
        srp: None,
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

    #[test]
    fn test_base_unit_needs_no_conversion() {
        let material = flour();
        let resolved = resolve_to_base(&material, None, dec("3.5"), "kg").unwrap();
        assert_eq!(resolved.base_quantity, dec("3.5"));
        assert_eq!(resolved.base_unit, "kg");
        assert_eq!(resolved.base_price_per_unit, dec("40"));
        assert_eq!(resolved.cost(), dec("140"));
    }

    /// One sack holds 25 kg, so the stored ratio is 0.04 sack per kg
    #[test]
    fn test_sack_resolves_to_kilograms() {
        let material = flour();
        let sack = conversion(&material, "sack", dec("0.04"), dec("1000"));

        let resolved = resolve_to_base(&material, Some(&sack), dec("2"), "sack").unwrap();
        assert_eq!(resolved.base_quantity, dec("50"));
        assert_eq!(resolved.base_unit, "kg");
        assert_eq!(resolved.base_price_per_unit, dec("40"));
        assert_eq!(sack.from_base(dec("50")), dec("2"));
    }

    #[test]
    fn test_unknown_unit_is_unresolved() {
        let material = flour();
        let err = resolve_to_base(&material, None, dec("1"), "cup").unwrap_err();
        assert_eq!(
            err,
            LedgerError::UnresolvedUnit {
                raw_material_id: material.id,
                unit: "cup".to_string(),
            }
        );
    }

    #[test]
    fn test_conversion_for_other_unit_is_ignored() {
        let material = flour();
        let sack = conversion(&material, "sack", dec("0.04"), dec("1000"));
        let err = resolve_to_base(&material, Some(&sack), dec("1"), "cup").unwrap_err();
        assert!(matches!(err, LedgerError::UnresolvedUnit { .. }));
    }

    #[test]
    fn test_conversion_for_other_material_is_ignored() {
        let material = flour();
        let other = flour();
        let sack = conversion(&other, "sack", dec("0.04"), dec("1000"));
        let err = resolve_to_base(&material, Some(&sack), dec("1"), "sack").unwrap_err();
        assert!(matches!(err, LedgerError::UnresolvedUnit { .. }));
    }

    #[test]
    fn test_zero_ratio_is_unresolved() {
        let material = flour();
        let broken = conversion(&material, "sack", Decimal::ZERO, dec("1000"));
        assert!(broken.to_base(dec("1")).is_err());
    }

    #[test]
    fn test_validate_conversion_rules() {
        assert!(validate_conversion("kg", "sack", dec("0.04"), dec("1000"), Some(dec("1100"))).is_ok());
        assert!(validate_conversion("kg", "kg", dec("1"), dec("40"), None).is_err());
        assert!(validate_conversion("kg", "sack", Decimal::ZERO, dec("1000"), None).is_err());
        assert!(validate_conversion("kg", "sack", dec("0.04"), dec("-1"), None).is_err());
        assert!(validate_conversion("kg", "sack", dec("0.04"), dec("1000"), Some(dec("900"))).is_err());
        assert!(validate_conversion("", "sack", dec("0.04"), dec("1000"), None).is_err());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Ratios with a terminating reciprocal so round trips are exact
    fn ratio_strategy() -> impl Strategy<Value = Decimal> {
        prop::sample::select(vec![
            dec("0.001"),
            dec("0.04"),
            dec("0.25"),
            dec("0.5"),
            dec("2"),
            dec("8"),
            dec("1000"),
        ])
    }

    /// Strategy for quantities (0.1 to 1000.0)
    fn quantity_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=10000i64).prop_map(|n| Decimal::new(n, 1))
    }

    /// Strategy for prices (0.01 to 10000.00)
    fn price_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=1000000i64).prop_map(|n| Decimal::new(n, 2))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Converting to base and back returns the original amount
        #[test]
        fn prop_equivalent_round_trip(
            ratio in ratio_strategy(),
            quantity in quantity_strategy()
        ) {
            let material = flour();
            let conv = conversion(&material, "pack", ratio, dec("10"));
            let base = conv.to_base(quantity).unwrap();
            prop_assert_eq!(conv.from_base(base), quantity);
        }

        /// Converting from base and back returns the original amount
        #[test]
        fn prop_base_round_trip(
            ratio in ratio_strategy(),
            quantity in quantity_strategy()
        ) {
            let material = flour();
            let conv = conversion(&material, "pack", ratio, dec("10"));
            let equivalent = conv.from_base(quantity);
            prop_assert_eq!(conv.to_base(equivalent).unwrap(), quantity);
        }

        /// Buying in the equivalent unit costs the same as buying its base amount
        #[test]
        fn prop_conversion_preserves_value(
            ratio in ratio_strategy(),
            quantity in quantity_strategy(),
            unit_price in price_strategy()
        ) {
            let material = flour();
            let conv = conversion(&material, "pack", ratio, unit_price);
            let resolved = resolve_to_base(&material, Some(&conv), quantity, "pack").unwrap();
            prop_assert_eq!(resolved.cost(), quantity * unit_price);
        }
    }
}
