//! Active expiry of lapsed cash-payment holds. Read paths already filter
//! expired holds out, but only this sweep formally transitions the rows:
//! order to Expired, its Pending tickets to Expired, and the reserved tier
//! inventory released. Without it, abandoned orders would block inventory
//! forever.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::models::{Order, OrderStatus, TicketStatus, TicketTier};
use crate::services::allocations::{bump_tier_sold, MAX_VERSION_RETRIES};
use crate::utils::error::AppError;

/// Long-running task spawned from `main`. Failures are logged and the loop
/// keeps going; the sweep is never fatal to the process.
pub async fn run(pool: PgPool, interval_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(interval_secs, "hold expiry sweep started");
    loop {
        ticker.tick().await;
        match sweep_once(&pool).await {
            Ok(0) => {}
            Ok(expired) => tracing::info!(expired, "expired lapsed cash order holds"),
            Err(e) => tracing::error!(error = ?e, "hold expiry sweep pass failed"),
        }
    }
}

/// One sweep pass. Each order is expired in its own transaction so one bad
/// row cannot wedge the rest of the batch. Returns how many orders flipped.
pub async fn sweep_once(pool: &PgPool) -> Result<u64, AppError> {
    let candidates: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT id FROM orders
        WHERE status IN ('pending_cash_payment', 'code_issued')
          AND hold_expires_at <= now()
        ORDER BY hold_expires_at
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut expired = 0u64;
    for order_id in candidates {
        match expire_order(pool, order_id).await {
            Ok(true) => expired += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(%order_id, error = ?e, "failed to expire order, will retry next pass");
            }
        }
    }
    Ok(expired)
}

/// Expires a single order if its hold has lapsed. Idempotent: returns
/// `Ok(false)` when another actor already moved the order on.
async fn expire_order(pool: &PgPool, order_id: Uuid) -> Result<bool, AppError> {
    for attempt in 1..=MAX_VERSION_RETRIES {
        match try_expire_order(pool, order_id).await {
            Err(AppError::ConcurrentUpdate) if attempt < MAX_VERSION_RETRIES => {
                tracing::debug!(%order_id, attempt, "tier version conflict while releasing, retrying");
                continue;
            }
            other => return other,
        }
    }
    Err(AppError::ConcurrentUpdate)
}

/// An order is swept only while it still holds inventory and its hold has
/// lapsed. Approved or already-swept orders are left alone, which is what
/// makes re-running the sweep over the same rows a no-op.
fn eligible_for_expiry(order: &Order, now: DateTime<Utc>) -> bool {
    order.status.holds_inventory() && order.hold_expired(now)
}

async fn try_expire_order(pool: &PgPool, order_id: Uuid) -> Result<bool, AppError> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;
    let order = match order {
        Some(order) => order,
        None => return Ok(false),
    };

    if !eligible_for_expiry(&order, now) {
        return Ok(false);
    }

    // Release the per-tier reservation taken at creation.
    let held: Vec<(Uuid, i64)> = sqlx::query_as(
        "SELECT tier_id, COUNT(*) FROM tickets WHERE order_id = $1 AND status = $2 GROUP BY tier_id",
    )
    .bind(order_id)
    .bind(TicketStatus::Pending)
    .fetch_all(&mut *tx)
    .await?;

    for (tier_id, count) in &held {
        let tier: TicketTier = sqlx::query_as("SELECT * FROM ticket_tiers WHERE id = $1")
            .bind(tier_id)
            .fetch_one(&mut *tx)
            .await?;
        bump_tier_sold(&mut tx, &tier, -(*count as i32)).await?;
    }

    sqlx::query("UPDATE tickets SET status = $1, updated_at = now() WHERE order_id = $2 AND status = $3")
        .bind(TicketStatus::Expired)
        .bind(order_id)
        .bind(TicketStatus::Pending)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE orders SET status = $1, updated_at = now() WHERE id = $2")
        .bind(OrderStatus::Expired)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(%order_id, "cash order hold expired, inventory released");
    Ok(true)
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
    fn lapsed_holds_are_swept_on_either_fulfillment_path() {
        let now = Utc::now();
        let past = Some(now - Duration::minutes(1));
        assert!(eligible_for_expiry(
            &order(OrderStatus::PendingCashPayment, past),
            now
        ));
        assert!(eligible_for_expiry(&order(OrderStatus::CodeIssued, past), now));
    }

    #[test]
    fn sweeping_the_same_order_twice_is_a_no_op() {
        let now = Utc::now();
        let mut o = order(
            OrderStatus::PendingCashPayment,
            Some(now - Duration::minutes(1)),
        );
        assert!(eligible_for_expiry(&o, now));

        // First pass flips the row to Expired; a second pass must skip it
        // rather than release the tier reservation again.
        o.status = OrderStatus::Expired;
        assert!(!eligible_for_expiry(&o, now));
    }

    #[test]
    fn live_or_completed_orders_are_left_alone() {
        let now = Utc::now();
        let live = order(
            OrderStatus::PendingCashPayment,
            Some(now + Duration::minutes(10)),
        );
        assert!(!eligible_for_expiry(&live, now));

        let completed = order(OrderStatus::Completed, Some(now - Duration::minutes(1)));
        assert!(!eligible_for_expiry(&completed, now));
    }
}
