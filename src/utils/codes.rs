//! Generation of human-facing identifiers: ticket codes, order numbers and
//! 4-digit activation codes. All randomness comes from UUIDv4 material so no
//! extra RNG dependency is needed; uniqueness of ticket codes is ultimately
//! enforced by the database constraint.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Unique per-ticket code printed on the ticket, e.g. `TKT-9F2C41A7D03B`.
pub fn ticket_code() -> String {
    let id = Uuid::new_v4();
    let bytes = id.as_bytes();
    let mut suffix = String::with_capacity(12);
    for b in &bytes[..6] {
        suffix.push_str(&format!("{:02X}", b));
    }
    format!("TKT-{}", suffix)
}

/// Human-readable order number, e.g. `CSH-20260826-7B3F`.
pub fn order_number(now: DateTime<Utc>) -> String {
    let id = Uuid::new_v4();
    let bytes = id.as_bytes();
    format!(
        "CSH-{}-{:02X}{:02X}",
        now.format("%Y%m%d"),
        bytes[0],
        bytes[1]
    )
}

/// 4-digit activation code a buyer can read over the counter. Leading zeros
/// are preserved ("0042" is a valid code).
pub fn activation_code() -> String {
    let id = Uuid::new_v4();
    let n = u32::from_be_bytes(id.as_bytes()[..4].try_into().unwrap_or([0; 4]));
    format!("{:04}", n % 10_000)
}
