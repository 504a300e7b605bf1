use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "staff_role", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StaffRole {
    Staff,
    TeamMember,
    Associate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "commission_type", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionType {
    None,
    Fixed,
    Percentage,
}

/// A door-staff, team-member or associate role attached to one event.
/// `staff_user_id` is nullable: a staff identity can exist before a user
/// account is linked to it. Associates carry `assigned_by_staff_id` pointing
/// at the team member who created them; the chain forms a tree, never a cycle,
/// because associates cannot assign further associates.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StaffIdentity {
    pub id: Uuid,
    pub event_id: Uuid,
    pub organizer_id: Uuid,
    pub staff_user_id: Option<Uuid>,
    pub role: StaffRole,
    pub assigned_by_staff_id: Option<Uuid>,
    pub accept_cash_in_person: bool,
    pub commission_type: CommissionType,
    pub commission_value: Decimal,
    pub tickets_sold: i32,
    pub cash_collected_cents: i64,
    pub commission_earned_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StaffIdentity {
    /// Gate for the cash fulfillment paths.
    pub fn ensure_accepts_cash(&self) -> Result<(), AppError> {
        if !self.accept_cash_in_person {
            return Err(AppError::StaffNotAuthorized);
        }
        Ok(())
    }

    /// A transfer may only go to an associate this staff member assigned.
    pub fn ensure_assigned(&self, associate: &StaffIdentity) -> Result<(), AppError> {
        if associate.assigned_by_staff_id != Some(self.id) {
            return Err(AppError::NotYourAssociate);
        }
        Ok(())
    }

    /// Ledger rows stay event-scoped: both ends of a transfer must belong to
    /// the same event, otherwise a tier allocation would leak across events.
    pub fn ensure_same_event(&self, other: &StaffIdentity) -> Result<(), AppError> {
        if self.event_id != other.event_id {
            return Err(AppError::TierMismatch);
        }
        Ok(())
    }

    /// Caller must act as this staff member or as the organizer.
    pub fn ensure_acting_caller(&self, caller: Uuid) -> Result<(), AppError> {
        if self.staff_user_id == Some(caller) || self.organizer_id == caller {
            return Ok(());
        }
        Err(AppError::Forbidden(
            "Caller is neither the staff member nor the event organizer".to_string(),
        ))
    }
}

/// Append-only audit row written when a staff-mediated sale completes.
#[allow(dead_code)]
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StaffSale {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub order_id: Uuid,
    pub event_id: Uuid,
    pub ticket_count: i32,
    pub gross_cents: i64,
    pub commission_cents: i64,
    pub recorded_at: DateTime<Utc>,
}
