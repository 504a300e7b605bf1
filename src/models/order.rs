use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::error::AppError;

/// Cash order lifecycle. The two staff fulfillment paths leave
/// `PendingCashPayment` through distinct transitions so they can never
/// double-fire against the same order:
///
/// ```text
/// PendingCashPayment --approve--------------> Completed
/// PendingCashPayment --issue code-----------> CodeIssued
/// CodeIssued         --activate with code---> Completed
/// PendingCashPayment | CodeIssued --sweep---> Expired
/// ```
///
/// `Completed`, `Expired` and `Refunded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    PendingCashPayment,
    CodeIssued,
    Completed,
    Expired,
    Refunded,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Expired | OrderStatus::Refunded
        )
    }

    /// Statuses still inside the hold window and subject to expiry.
    pub fn holds_inventory(self) -> bool {
        matches!(
            self,
            OrderStatus::PendingCashPayment | OrderStatus::CodeIssued
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::PendingCashPayment => "PENDING_CASH_PAYMENT",
            OrderStatus::CodeIssued => "CODE_ISSUED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Expired => "EXPIRED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub event_id: Uuid,
    pub order_number: String,
    pub guest_contact_id: Uuid,
    pub status: OrderStatus,
    pub subtotal_cents: i64,
    pub platform_fee_cents: i64,
    pub processing_fee_cents: i64,
    pub total_cents: i64,
    pub payment_method: String,
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub approved_by_staff_id: Option<Uuid>,
    pub sold_by_staff_id: Option<Uuid>,
    pub staff_commission_cents: i64,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Expiry is checked against the wall clock, never against whether the
    /// sweep has already flipped the row: an overdue hold is unusable even
    /// while the row still reads `PendingCashPayment`.
    pub fn hold_expired(&self, now: DateTime<Utc>) -> bool {
        match self.hold_expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    /// Gate for the staff fulfillment paths (approve, issue activation code).
    pub fn ensure_awaiting_cash(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.status != OrderStatus::PendingCashPayment {
            return Err(AppError::InvalidStatus(format!(
                "expected PENDING_CASH_PAYMENT, order is {}",
                self.status.as_str()
            )));
        }
        if self.hold_expired(now) {
            return Err(AppError::OrderExpired);
        }
        Ok(())
    }

    /// Gate for buyer self-activation of a code-issued order.
    pub fn ensure_awaiting_activation(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.status != OrderStatus::CodeIssued {
            return Err(AppError::InvalidStatus(format!(
                "expected CODE_ISSUED, order is {}",
                self.status.as_str()
            )));
        }
        if self.hold_expired(now) {
            return Err(AppError::OrderExpired);
        }
        Ok(())
    }

    pub fn time_remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        match self.hold_expires_at {
            Some(expires_at) => (expires_at - now).num_seconds().max(0),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn order(status: OrderStatus, hold_expires_at: Option<DateTime<Utc>>) -> Order {
        Order {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            order_number: "CSH-20260826-0001".to_string(),
            guest_contact_id: Uuid::new_v4(),
            status,
            subtotal_cents: 5000,
            platform_fee_cents: 0,
            processing_fee_cents: 0,
            total_cents: 5000,
            payment_method: "cash_in_person".to_string(),
            hold_expires_at,
            approved_by_staff_id: None,
            sold_by_staff_id: None,
            staff_commission_cents: 0,
            paid_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn pending_order_inside_hold_is_approvable() {
        let now = Utc::now();
        let o = order(
            OrderStatus::PendingCashPayment,
            Some(now + Duration::minutes(30)),
        );
        assert!(o.ensure_awaiting_cash(now).is_ok());
    }

    #[test]
    fn expired_hold_blocks_approval_even_before_sweep() {
        let now = Utc::now();
        let o = order(
            OrderStatus::PendingCashPayment,
            Some(now - Duration::seconds(1)),
        );
        assert!(matches!(
            o.ensure_awaiting_cash(now),
            Err(AppError::OrderExpired)
        ));
    }

    #[test]
    fn completed_order_cannot_be_approved_again() {
        let now = Utc::now();
        let o = order(OrderStatus::Completed, None);
        assert!(matches!(
            o.ensure_awaiting_cash(now),
            Err(AppError::InvalidStatus(_))
        ));
    }

    #[test]
    fn code_issued_order_is_not_approvable_but_is_activatable() {
        let now = Utc::now();
        let o = order(OrderStatus::CodeIssued, Some(now + Duration::minutes(10)));
        assert!(matches!(
            o.ensure_awaiting_cash(now),
            Err(AppError::InvalidStatus(_))
        ));
        assert!(o.ensure_awaiting_activation(now).is_ok());
    }

    #[test]
    fn activation_gate_rejects_expired_and_pending() {
        let now = Utc::now();
        let expired = order(OrderStatus::CodeIssued, Some(now - Duration::minutes(1)));
        assert!(matches!(
            expired.ensure_awaiting_activation(now),
            Err(AppError::OrderExpired)
        ));

        let pending = order(
            OrderStatus::PendingCashPayment,
            Some(now + Duration::minutes(1)),
        );
        assert!(matches!(
            pending.ensure_awaiting_activation(now),
            Err(AppError::InvalidStatus(_))
        ));
    }

    #[test]
    fn time_remaining_clamps_at_zero() {
        let now = Utc::now();
        let live = order(
            OrderStatus::PendingCashPayment,
            Some(now + Duration::seconds(90)),
        );
        assert_eq!(live.time_remaining_secs(now), 90);

        let overdue = order(
            OrderStatus::PendingCashPayment,
            Some(now - Duration::seconds(90)),
        );
        assert_eq!(overdue.time_remaining_secs(now), 0);
    }

    #[test]
    fn terminal_statuses_do_not_hold_inventory() {
        for status in [
            OrderStatus::Completed,
            OrderStatus::Expired,
            OrderStatus::Refunded,
        ] {
            assert!(status.is_terminal());
            assert!(!status.holds_inventory());
        }
        assert!(OrderStatus::PendingCashPayment.holds_inventory());
        assert!(OrderStatus::CodeIssued.holds_inventory());
    }
}
