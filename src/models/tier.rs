use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::error::AppError;

/// Event-scoped sale unit. `sold_count` never exceeds `total_quantity`;
/// `version` increments on every `sold_count` mutation and backs the
/// optimistic-concurrency retry loop in the services layer.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketTier {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub unit_price_cents: i64,
    pub total_quantity: i32,
    pub sold_count: i32,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TicketTier {
    pub fn available(&self) -> i32 {
        self.total_quantity - self.sold_count
    }

    /// Checks that `quantity` more units can be sold without breaking the
    /// `sold_count <= total_quantity` invariant.
    pub fn ensure_capacity(&self, quantity: i32) -> Result<(), AppError> {
        if quantity > self.available() {
            return Err(AppError::InsufficientAllocation {
                requested: quantity,
                remaining: self.available(),
            });
        }
        Ok(())
    }

    pub fn line_price_cents(&self, quantity: i32) -> i64 {
        self.unit_price_cents * quantity as i64
    }
}
