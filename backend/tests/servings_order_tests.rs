//! Servings and order fulfillment tests
//!
//! Tests for menu servings and order lifecycle including:
//! - Dine-in orders deduct at placement, online orders on completion
//! - Cancelling or deleting an unfulfilled order restores servings once
//! - Servings never go negative

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    apply_servings_delta, check_servings, order_total, placement_effect, removal_effect,
    status_change_effect, sum_by_item, LedgerError, MenuItem, OrderChannel, OrderStatus,
    ServingsEffect,
};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn menu_item(name: &str, servings: i32) -> MenuItem {
    MenuItem {
        id: Uuid::new_v4(),
        menu_maintenance_id: Uuid::new_v4(),
        name: name.to_string(),
        price: dec("85"),
        servings,
        created_by: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Order state tracked by the fulfillment rules
#[derive(Debug, Clone, Copy)]
struct Tracked {
    channel: OrderChannel,
    status: OrderStatus,
    servings_deducted: bool,
    servings: i32,
    quantity: i32,
}

impl Tracked {
    fn place(channel: OrderChannel, servings: i32, quantity: i32) -> Self {
        let mut order = Self {
            channel,
            status: OrderStatus::Pending,
            servings_deducted: false,
            servings,
            quantity,
        };
        order.apply(placement_effect(channel));
        order
    }

    fn apply(&mut self, effect: ServingsEffect) {
        match effect {
            ServingsEffect::Deduct => {
                self.servings -= self.quantity;
                self.servings_deducted = true;
            }
            ServingsEffect::Restore => {
                self.servings += self.quantity;
                self.servings_deducted = false;
            }
            ServingsEffect::None => {}
        }
    }

    fn change_status(&mut self, next: OrderStatus) -> Result<(), LedgerError> {
        let effect = status_change_effect(self.channel, self.status, next, self.servings_deducted)?;
        self.apply(effect);
        self.status = next;
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_dine_in_deducts_at_placement() {
        let order = Tracked::place(OrderChannel::DineIn, 10, 3);
        assert_eq!(order.servings, 7);
        assert!(order.servings_deducted);
    }

    #[test]
    fn test_online_deducts_on_completion() {
        let mut order = Tracked::place(OrderChannel::Online, 10, 3);
        assert_eq!(order.servings, 10);

        order.change_status(OrderStatus::Preparing).unwrap();
        order.change_status(OrderStatus::Ready).unwrap();
        assert_eq!(order.servings, 10);

        order.change_status(OrderStatus::Completed).unwrap();
        assert_eq!(order.servings, 7);
        assert!(order.servings_deducted);
    }

    #[test]
    fn test_cancelled_dine_in_restores_then_delete_does_not() {
        let mut order = Tracked::place(OrderChannel::DineIn, 10, 3);
        order.change_status(OrderStatus::Cancelled).unwrap();
        assert_eq!(order.servings, 10);
        assert!(!order.servings_deducted);

        let effect = removal_effect(order.status, order.servings_deducted);
        assert_eq!(effect, ServingsEffect::None);
    }

    #[test]
    fn test_second_cancel_is_a_noop() {
        let mut order = Tracked::place(OrderChannel::DineIn, 10, 3);
        order.change_status(OrderStatus::Cancelled).unwrap();
        assert_eq!(order.servings, 10);

        order.change_status(OrderStatus::Cancelled).unwrap();
        assert_eq!(order.servings, 10);
        assert!(!order.servings_deducted);
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    /// Two lines of i32::MAX for one item must not sum to a negative total
    #[test]
    fn test_repeated_large_lines_are_rejected() {
        let burger = menu_item("Burger", 0);
        let requested = vec![(burger.id, i32::MAX), (burger.id, i32::MAX)];

        let err = check_servings(&[burger.clone()], &requested).unwrap_err();
        assert!(matches!(err, LedgerError::Validation { .. }));
        assert!(sum_by_item(&requested).is_err());

        let single = check_servings(&[burger], &[(requested[0].0, i32::MAX)]).unwrap_err();
        assert!(matches!(single, LedgerError::InsufficientServings { .. }));
    }

    #[test]
    fn test_deleting_completed_order_keeps_servings() {
        assert_eq!(
            removal_effect(OrderStatus::Completed, true),
            ServingsEffect::None
        );
        assert_eq!(
            removal_effect(OrderStatus::Preparing, true),
            ServingsEffect::Restore
        );
        assert_eq!(
            removal_effect(OrderStatus::Pending, false),
            ServingsEffect::None
        );
    }

    #[test]
    fn test_terminal_orders_do_not_move() {
        let mut order = Tracked::place(OrderChannel::DineIn, 10, 1);
        order.change_status(OrderStatus::Completed).unwrap();
        assert!(matches!(
            order.change_status(OrderStatus::Cancelled),
            Err(LedgerError::InvalidTransition { .. })
        ));
        assert!(order.change_status(OrderStatus::Preparing).is_err());
    }

    #[test]
    fn test_check_servings_aggregates_lines() {
        let burger = menu_item("Burger", 5);
        let fries = menu_item("Fries", 1);
        let items = vec![burger.clone(), fries.clone()];

        // Two burger lines of 3 exceed the 5 available even though each fits
        let err = check_servings(&items, &[(burger.id, 3), (burger.id, 3), (fries.id, 2)])
            .unwrap_err();
        let LedgerError::InsufficientServings { shortfalls } = err else {
            panic!("expected InsufficientServings");
        };
        assert_eq!(shortfalls.len(), 2);
        assert!(shortfalls.iter().any(|s| s.name == "Burger" && s.requested == 6));
        assert!(shortfalls.iter().any(|s| s.name == "Fries" && s.servings == 1));

        let ok = check_servings(&items, &[(burger.id, 2), (burger.id, 3)]).unwrap();
        assert_eq!(ok, vec![(burger.id, 5)]);
    }

    #[test]
    fn test_unknown_menu_item_is_rejected() {
        let items = vec![menu_item("Burger", 5)];
        let err = check_servings(&items, &[(Uuid::new_v4(), 1)]).unwrap_err();
        assert!(matches!(err, LedgerError::Validation { .. }));
    }

    #[test]
    fn test_apply_servings_delta() {
        let item = menu_item("Burger", 4);
        assert_eq!(apply_servings_delta(&item, 6).unwrap(), 10);
        assert_eq!(apply_servings_delta(&item, -4).unwrap(), 0);
        assert!(matches!(
            apply_servings_delta(&item, -5),
            Err(LedgerError::InsufficientServings { .. })
        ));
    }

    #[test]
    fn test_order_total() {
        let total = order_total(&[(2, dec("85")), (3, dec("45.50"))]);
        assert_eq!(total, dec("306.50"));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn channel_strategy() -> impl Strategy<Value = OrderChannel> {
        prop::sample::select(vec![OrderChannel::DineIn, OrderChannel::Online])
    }

    fn status_strategy() -> impl Strategy<Value = OrderStatus> {
        prop::sample::select(vec![
            OrderStatus::Pending,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ])
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Applying any sequence of deltas never leaves negative servings
        #[test]
        fn prop_servings_never_negative(
            start in 0i32..100,
            deltas in prop::collection::vec(-50i32..50, 1..20)
        ) {
            let mut item = menu_item("Burger", start);
            for delta in deltas {
                match apply_servings_delta(&item, delta) {
                    Ok(next) => item.servings = next,
                    Err(_) => prop_assert!(item.servings + delta < 0),
                }
                prop_assert!(item.servings >= 0);
            }
        }

        /// Per-item totals are either exact or rejected, never wrapped
        #[test]
        fn prop_line_totals_never_wrap(
            quantities in prop::collection::vec(1i32..=i32::MAX, 1..6)
        ) {
            let id = Uuid::new_v4();
            let requested: Vec<(Uuid, i32)> = quantities.iter().map(|q| (id, *q)).collect();
            let exact: i64 = quantities.iter().map(|q| i64::from(*q)).sum();

            match sum_by_item(&requested) {
                Ok(totals) => {
                    prop_assert_eq!(totals.len(), 1);
                    prop_assert_eq!(i64::from(totals[0].1), exact);
                }
                Err(_) => prop_assert!(exact > i64::from(i32::MAX)),
            }
        }

        /// Servings removed by an order are either still out (fulfilled) or fully back
        #[test]
        fn prop_order_lifecycle_balances_servings(
            channel in channel_strategy(),
            quantity in 1i32..10,
            path in prop::collection::vec(status_strategy(), 0..6),
            delete in any::<bool>()
        ) {
            let start = 100;
            let mut order = Tracked::place(channel, start, quantity);
            for next in path {
                let _ = order.change_status(next);
            }
            if delete {
                let effect = removal_effect(order.status, order.servings_deducted);
                order.apply(effect);
            }

            let outstanding = if order.servings_deducted { quantity } else { 0 };
            prop_assert_eq!(order.servings, start - outstanding);
            if order.status.is_fulfilled() {
                prop_assert!(order.servings_deducted);
            }
            if order.status == OrderStatus::Cancelled || (delete && !order.status.is_fulfilled()) {
                prop_assert_eq!(order.servings, start);
            }
        }
    }
}
