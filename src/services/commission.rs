use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::CommissionType;

/// Commission owed to a staff member for one completed order.
///
/// Fixed commissions are a per-ticket cents amount; percentage commissions are
/// taken from the order subtotal and rounded once on the order total (never
/// per ticket, so multi-ticket orders accumulate no rounding drift).
pub fn commission_cents(
    commission_type: CommissionType,
    commission_value: Decimal,
    subtotal_cents: i64,
    ticket_count: i32,
) -> i64 {
    match commission_type {
        CommissionType::None => 0,
        CommissionType::Fixed => {
            let per_ticket = commission_value
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_i64()
                .unwrap_or(0);
            per_ticket * ticket_count as i64
        }
        CommissionType::Percentage => {
            let raw = Decimal::from(subtotal_cents) * commission_value / Decimal::from(100);
            raw.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_i64()
                .unwrap_or(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_earns_nothing() {
        assert_eq!(
            commission_cents(CommissionType::None, Decimal::from(10), 5000, 4),
            0
        );
    }

    #[test]
    fn fixed_is_per_ticket() {
        // $3.00 per ticket, 4 tickets -> $12.00
        assert_eq!(
            commission_cents(CommissionType::Fixed, Decimal::from(300), 5000, 4),
            1200
        );
    }

    #[test]
    fn percentage_is_taken_from_subtotal() {
        // 10% of $50.00 -> $5.00
        assert_eq!(
            commission_cents(CommissionType::Percentage, Decimal::from(10), 5000, 2),
            500
        );
    }

    #[test]
    fn percentage_rounds_once_on_the_order_total() {
        // 2.5% of $10.01 = 25.025 cents -> 25
        let rate: Decimal = "2.5".parse().unwrap();
        assert_eq!(
            commission_cents(CommissionType::Percentage, rate, 1001, 3),
            25
        );
        // 5% of $10.10 = 50.5 cents -> 51 (half away from zero)
        assert_eq!(
            commission_cents(CommissionType::Percentage, Decimal::from(5), 1010, 1),
            51
        );
    }

    #[test]
    fn zero_tickets_or_subtotal_earn_nothing() {
        assert_eq!(
            commission_cents(CommissionType::Fixed, Decimal::from(300), 0, 0),
            0
        );
        assert_eq!(
            commission_cents(CommissionType::Percentage, Decimal::from(10), 0, 0),
            0
        );
    }
}
