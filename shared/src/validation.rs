//! Validation utilities for ledger inputs

use rust_decimal::Decimal;

use crate::error::{LedgerError, LedgerResult};

// ============================================================================
// Quantity Validations
// ============================================================================

/// Validate a production run size in pieces
pub fn validate_production_quantity(quantity: i32) -> LedgerResult<()> {
    if quantity <= 0 {
        return Err(LedgerError::validation(
            "quantity",
            "Production quantity must be at least 1",
        ));
    }
    Ok(())
}

/// Validate an order line quantity
pub fn validate_order_quantity(quantity: i32) -> LedgerResult<()> {
    if quantity <= 0 {
        return Err(LedgerError::validation(
            "quantity",
            "Order quantity must be at least 1",
        ));
    }
    Ok(())
}

/// Validate a recipe or purchase quantity
pub fn validate_positive_amount(field: &str, amount: Decimal) -> LedgerResult<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::validation(field, "Must be greater than zero"));
    }
    Ok(())
}

/// Validate a unit label
pub fn validate_unit(unit: &str) -> LedgerResult<()> {
    let trimmed = unit.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::validation("unit", "Unit is required"));
    }
    if trimmed.len() > 32 {
        return Err(LedgerError::validation(
            "unit",
            "Unit must be at most 32 characters",
        ));
    }
    Ok(())
}

/// Validate the free-text reason given for a manual servings adjustment
pub fn validate_adjustment_reason(reason: &str) -> LedgerResult<()> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::validation("reason", "Reason must not be blank"));
    }
    if trimmed.chars().count() > 255 {
        return Err(LedgerError::validation(
            "reason",
            "Reason must be at most 255 characters",
        ));
    }
    Ok(())
}

// ============================================================================
// Conversion Validations
// ============================================================================

/// Validate a unit conversion before it is stored
pub fn validate_conversion(
    base_unit: &str,
    equivalent_unit: &str,
    quantity: Decimal,
    unit_price: Decimal,
    srp: Option<Decimal>,
) -> LedgerResult<()> {
    validate_unit(base_unit)?;
    validate_unit(equivalent_unit)?;
    if base_unit.trim() == equivalent_unit.trim() {
        return Err(LedgerError::validation(
            "equivalent_unit",
            "Equivalent unit must differ from the base unit",
        ));
    }
    validate_positive_amount("quantity", quantity)?;
    if unit_price < Decimal::ZERO {
        return Err(LedgerError::validation(
            "unit_price",
            "Unit price cannot be negative",
        ));
    }
    if let Some(srp) = srp {
        if srp < unit_price {
            return Err(LedgerError::validation(
                "srp",
                "SRP must not be lower than the unit price",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_validate_production_quantity() {
        assert!(validate_production_quantity(1).is_ok());
        assert!(validate_production_quantity(0).is_err());
        assert!(validate_production_quantity(-5).is_err());
    }

    #[test]
    fn test_validate_unit() {
        assert!(validate_unit("kg").is_ok());
        assert!(validate_unit("   ").is_err());
        assert!(validate_unit(&"x".repeat(33)).is_err());
    }

    #[test]
    fn test_validate_adjustment_reason() {
        assert!(validate_adjustment_reason("spoiled batch").is_ok());
        assert!(validate_adjustment_reason("  ").is_err());
        assert!(validate_adjustment_reason(&"x".repeat(255)).is_ok());
        assert!(validate_adjustment_reason(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_validate_conversion_valid() {
        assert!(validate_conversion("kg", "sack", dec("0.04"), dec("1000"), Some(dec("1100"))).is_ok());
        assert!(validate_conversion("kg", "sack", dec("0.04"), dec("1000"), None).is_ok());
    }

    #[test]
    fn test_validate_conversion_srp_below_price() {
        assert!(validate_conversion("kg", "sack", dec("0.04"), dec("1000"), Some(dec("999"))).is_err());
    }

    #[test]
    fn test_validate_conversion_same_units() {
        assert!(validate_conversion("kg", "kg", dec("1"), dec("40"), None).is_err());
    }

    #[test]
    fn test_validate_conversion_zero_ratio() {
        assert!(validate_conversion("kg", "sack", Decimal::ZERO, dec("1000"), None).is_err());
    }
}
