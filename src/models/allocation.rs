use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::error::AppError;

/// Ledger row: how many units of one tier a staff identity may sell.
/// One row per (staff_id, tier_id) pair; repeat allocations increment in
/// place. Invariant after every operation:
/// `remaining_quantity == allocated_quantity - sold_quantity`, never negative.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StaffAllocation {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub event_id: Uuid,
    pub tier_id: Uuid,
    pub allocated_quantity: i32,
    pub sold_quantity: i32,
    pub remaining_quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StaffAllocation {
    /// Grow the allocation (organizer grant or incoming transfer leg).
    pub fn grant(&mut self, quantity: i32) {
        self.allocated_quantity += quantity;
        self.remaining_quantity += quantity;
    }

    /// Consume remaining units for a sale. Fails without touching the row
    /// when the ledger would underflow.
    pub fn consume(&mut self, quantity: i32) -> Result<(), AppError> {
        if quantity > self.remaining_quantity {
            return Err(AppError::InsufficientAllocation {
                requested: quantity,
                remaining: self.remaining_quantity,
            });
        }
        self.remaining_quantity -= quantity;
        self.sold_quantity += quantity;
        Ok(())
    }

    /// Outgoing transfer leg: reduces what this staff member holds without
    /// counting the units as sold.
    pub fn release(&mut self, quantity: i32) -> Result<(), AppError> {
        if quantity > self.remaining_quantity {
            return Err(AppError::InsufficientAllocation {
                requested: quantity,
                remaining: self.remaining_quantity,
            });
        }
        self.allocated_quantity -= quantity;
        self.remaining_quantity -= quantity;
        Ok(())
    }

    pub fn invariant_holds(&self) -> bool {
        self.remaining_quantity == self.allocated_quantity - self.sold_quantity
            && self.remaining_quantity >= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocation(allocated: i32, sold: i32) -> StaffAllocation {
        StaffAllocation {
            id: Uuid::new_v4(),
            staff_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            tier_id: Uuid::new_v4(),
            allocated_quantity: allocated,
            sold_quantity: sold,
            remaining_quantity: allocated - sold,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn grant_preserves_ledger_invariant() {
        let mut a = allocation(10, 4);
        a.grant(5);
        assert_eq!(a.allocated_quantity, 15);
        assert_eq!(a.remaining_quantity, 11);
        assert!(a.invariant_holds());
    }

    #[test]
    fn consume_moves_units_from_remaining_to_sold() {
        let mut a = allocation(10, 0);
        a.consume(3).unwrap();
        assert_eq!(a.sold_quantity, 3);
        assert_eq!(a.remaining_quantity, 7);
        assert!(a.invariant_holds());
    }

    #[test]
    fn consume_past_remaining_fails_and_leaves_row_unchanged() {
        let mut a = allocation(10, 8);
        let before = a.clone();
        let err = a.consume(3).unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientAllocation {
                requested: 3,
                remaining: 2
            }
        ));
        assert_eq!(a.allocated_quantity, before.allocated_quantity);
        assert_eq!(a.sold_quantity, before.sold_quantity);
        assert_eq!(a.remaining_quantity, before.remaining_quantity);
    }

    #[test]
    fn transfer_legs_are_zero_sum() {
        let mut source = allocation(100, 0);
        let mut destination = allocation(0, 0);

        source.release(30).unwrap();
        destination.grant(30);

        assert_eq!(source.remaining_quantity, 70);
        assert_eq!(destination.remaining_quantity, 30);
        assert_eq!(
            source.allocated_quantity + destination.allocated_quantity,
            100
        );
        assert!(source.invariant_holds());
        assert!(destination.invariant_holds());
    }

    #[test]
    fn release_cannot_underflow() {
        let mut a = allocation(5, 3);
        assert!(a.release(2).is_ok());
        assert!(a.release(1).is_err());
        assert!(a.invariant_holds());
    }
}
