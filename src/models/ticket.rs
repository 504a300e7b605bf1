use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    /// Placeholder created at order time, before payment is confirmed.
    Pending,
    /// Payment confirmed; ticket is valid for entry.
    Active,
    /// Scanned at the door.
    Used,
    /// Hold lapsed before payment; released by the sweep.
    Expired,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub event_id: Uuid,
    pub order_id: Uuid,
    pub tier_id: Uuid,
    pub ticket_code: String,
    pub status: TicketStatus,
    pub activation_code: Option<String>,
    pub sold_by_staff_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
