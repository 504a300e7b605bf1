//! Cash order lifecycle: creation with a 30-minute hold, staff approval,
//! activation-code issuance and buyer self-activation. Creation reserves tier
//! inventory through the version-guarded counter; the sweep releases it when
//! a hold lapses.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::config::Config;
use crate::models::{Event, Order, OrderStatus, StaffIdentity, TicketStatus, TicketTier};
use crate::services::allocations::{bump_tier_sold, fetch_staff, MAX_VERSION_RETRIES};
use crate::services::commission::commission_cents;
use crate::services::notify::{NewCashOrderNotice, Notifier};
use crate::utils::codes;
use crate::utils::error::AppError;

pub const PAYMENT_METHOD_CASH: &str = "cash_in_person";

#[derive(Debug, Clone, Deserialize)]
pub struct CashOrderLine {
    pub tier_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCashOrderRequest {
    pub event_id: Uuid,
    pub buyer_name: String,
    pub buyer_phone: String,
    pub buyer_email: Option<String>,
    pub lines: Vec<CashOrderLine>,
}

#[derive(Debug, Serialize)]
pub struct CashOrderCreated {
    pub order_id: Uuid,
    pub order_number: String,
    pub total_cents: i64,
    pub hold_expires_at: DateTime<Utc>,
    pub ticket_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct OrderCompleted {
    pub order_id: Uuid,
    pub tickets_activated: i32,
    pub commission_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct ActivationCodeIssued {
    pub order_id: Uuid,
    pub activation_code: String,
    pub ticket_count: i32,
}

#[derive(Debug, Serialize)]
pub struct PendingCashOrder {
    pub order_id: Uuid,
    pub order_number: String,
    pub event_id: Uuid,
    pub status: OrderStatus,
    pub buyer_name: String,
    pub buyer_phone: String,
    pub buyer_email: Option<String>,
    pub subtotal_cents: i64,
    pub total_cents: i64,
    pub ticket_count: i64,
    pub sold_by_staff_id: Option<Uuid>,
    pub hold_expires_at: DateTime<Utc>,
    pub time_remaining_secs: i64,
}

/// Creates a cash order: prices the requested lines at the tiers' current
/// unit price (a snapshot; later price edits do not touch the order),
/// reserves tier inventory, writes one Pending ticket per unit and starts
/// the hold clock. The staff notification is dispatched on a spawned task
/// after commit, off the request path, and is best-effort.
pub async fn create_cash_order(
    pool: &PgPool,
    config: &Config,
    notifier: Arc<dyn Notifier>,
    request: NewCashOrderRequest,
) -> Result<CashOrderCreated, AppError> {
    validate_request(&request)?;

    for attempt in 1..=MAX_VERSION_RETRIES {
        match try_create(pool, config, &request).await {
            Err(AppError::ConcurrentUpdate) if attempt < MAX_VERSION_RETRIES => {
                tracing::debug!(attempt, "tier version conflict while reserving, retrying");
                continue;
            }
            Ok(created) => {
                let notice = NewCashOrderNotice {
                    order_id: created.order_id,
                    event_id: request.event_id,
                    order_number: created.order_number.clone(),
                    buyer_name: request.buyer_name.clone(),
                    total_cents: created.total_cents,
                };
                let notifier = Arc::clone(&notifier);
                tokio::spawn(async move {
                    notifier.notify_new_cash_order(notice);
                });
                tracing::info!(
                    order_id = %created.order_id,
                    order_number = %created.order_number,
                    total_cents = created.total_cents,
                    "created cash order with payment hold"
                );
                return Ok(created);
            }
            Err(e) => return Err(e),
        }
    }
    Err(AppError::ConcurrentUpdate)
}

fn validate_request(request: &NewCashOrderRequest) -> Result<(), AppError> {
    if request.buyer_name.trim().is_empty() || request.buyer_phone.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Buyer name and phone are required".to_string(),
        ));
    }
    if request.lines.is_empty() {
        return Err(AppError::ValidationError(
            "Order must contain at least one ticket line".to_string(),
        ));
    }
    if request.lines.iter().any(|line| line.quantity <= 0) {
        return Err(AppError::ValidationError(
            "Ticket quantities must be positive".to_string(),
        ));
    }
    Ok(())
}

async fn try_create(
    pool: &PgPool,
    config: &Config,
    request: &NewCashOrderRequest,
) -> Result<CashOrderCreated, AppError> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let event: Event = sqlx::query_as("SELECT * FROM events WHERE id = $1")
        .bind(request.event_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {} not found", request.event_id)))?;

    // Duplicate tier lines are merged so each tier is reserved exactly once;
    // BTreeMap ordering also keeps lock acquisition deterministic.
    let mut requested: BTreeMap<Uuid, i32> = BTreeMap::new();
    for line in &request.lines {
        *requested.entry(line.tier_id).or_insert(0) += line.quantity;
    }

    let mut subtotal_cents = 0i64;
    let mut priced: Vec<(TicketTier, i32)> = Vec::with_capacity(requested.len());
    for (&tier_id, &quantity) in &requested {
        let tier: TicketTier = sqlx::query_as("SELECT * FROM ticket_tiers WHERE id = $1")
            .bind(tier_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Ticket tier {tier_id} not found"))
            })?;
        if tier.event_id != event.id {
            return Err(AppError::NotFound(format!(
                "Ticket tier {tier_id} not found for this event"
            )));
        }
        tier.ensure_capacity(quantity)?;
        subtotal_cents += tier.line_price_cents(quantity);
        priced.push((tier, quantity));
    }

    // Reserve inventory while the hold is open.
    for (tier, quantity) in &priced {
        bump_tier_sold(&mut tx, tier, *quantity).await?;
    }

    let total_cents = subtotal_cents + config.platform_fee_cents + config.processing_fee_cents;

    let guest_contact_id: Uuid = sqlx::query_scalar(
        "INSERT INTO guest_contacts (name, phone, email) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(request.buyer_name.trim())
    .bind(request.buyer_phone.trim())
    .bind(request.buyer_email.as_deref())
    .fetch_one(&mut *tx)
    .await?;

    let order_number = codes::order_number(now);
    let hold_expires_at = now + Duration::minutes(config.hold_minutes);

    let order_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO orders
            (event_id, order_number, guest_contact_id, status, subtotal_cents,
             platform_fee_cents, processing_fee_cents, total_cents, payment_method,
             hold_expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id
        "#,
    )
    .bind(event.id)
    .bind(&order_number)
    .bind(guest_contact_id)
    .bind(OrderStatus::PendingCashPayment)
    .bind(subtotal_cents)
    .bind(config.platform_fee_cents)
    .bind(config.processing_fee_cents)
    .bind(total_cents)
    .bind(PAYMENT_METHOD_CASH)
    .bind(hold_expires_at)
    .fetch_one(&mut *tx)
    .await?;

    let mut ticket_ids = Vec::new();
    for (tier, quantity) in &priced {
        for _ in 0..*quantity {
            let ticket_id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO tickets (event_id, order_id, tier_id, ticket_code, status)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(event.id)
            .bind(order_id)
            .bind(tier.id)
            .bind(codes::ticket_code())
            .bind(TicketStatus::Pending)
            .fetch_one(&mut *tx)
            .await?;
            ticket_ids.push(ticket_id);
        }
    }

    tx.commit().await?;

    Ok(CashOrderCreated {
        order_id,
        order_number,
        total_cents,
        hold_expires_at,
        ticket_ids,
    })
}

/// Staff-side completion: the buyer handed over cash, the staff member
/// confirms. Flips the order to Completed, activates every ticket, credits
/// the staff counters and commission and appends the audit sale record.
pub async fn approve_cash_order(
    pool: &PgPool,
    caller: Uuid,
    order_id: Uuid,
    staff_id: Uuid,
) -> Result<OrderCompleted, AppError> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let order = fetch_order(&mut tx, order_id).await?;
    order.ensure_awaiting_cash(now)?;

    let staff = fetch_staff(&mut tx, staff_id, true).await?;
    staff.ensure_acting_caller(caller)?;
    ensure_staff_on_event(&staff, &order)?;
    staff.ensure_accepts_cash()?;

    let outcome = complete_order(&mut tx, &order, &staff, now).await?;

    tx.commit().await?;

    tracing::info!(
        %order_id,
        %staff_id,
        tickets = outcome.tickets_activated,
        commission_cents = outcome.commission_cents,
        "approved cash order"
    );

    Ok(outcome)
}

/// Alternate fulfillment path: the staff member hands the buyer a 4-digit
/// code instead of approving on the spot. The order moves to CodeIssued so
/// the approve path can no longer fire against it; the buyer completes the
/// sale through [`activate_with_code`].
pub async fn generate_cash_activation_code(
    pool: &PgPool,
    caller: Uuid,
    order_id: Uuid,
    staff_id: Uuid,
) -> Result<ActivationCodeIssued, AppError> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let order = fetch_order(&mut tx, order_id).await?;
    order.ensure_awaiting_cash(now)?;

    let staff = fetch_staff(&mut tx, staff_id, false).await?;
    staff.ensure_acting_caller(caller)?;
    ensure_staff_on_event(&staff, &order)?;
    staff.ensure_accepts_cash()?;

    let activation_code = codes::activation_code();

    let stamped = sqlx::query(
        r#"
        UPDATE tickets
        SET activation_code = $1, sold_by_staff_id = $2, updated_at = now()
        WHERE order_id = $3 AND status = $4
        "#,
    )
    .bind(&activation_code)
    .bind(staff_id)
    .bind(order_id)
    .bind(TicketStatus::Pending)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE orders SET status = $1, sold_by_staff_id = $2, updated_at = now() WHERE id = $3",
    )
    .bind(OrderStatus::CodeIssued)
    .bind(staff_id)
    .bind(order_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(%order_id, %staff_id, "issued cash activation code");

    Ok(ActivationCodeIssued {
        order_id,
        activation_code,
        ticket_count: stamped.rows_affected() as i32,
    })
}

/// Buyer-side completion of a CodeIssued order. The activation code is the
/// credential; no caller identity is involved. Credits go to the staff
/// member who issued the code.
pub async fn activate_with_code(
    pool: &PgPool,
    order_id: Uuid,
    code: &str,
) -> Result<OrderCompleted, AppError> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let order = fetch_order(&mut tx, order_id).await?;
    order.ensure_awaiting_activation(now)?;

    let expected: Option<Option<String>> =
        sqlx::query_scalar("SELECT activation_code FROM tickets WHERE order_id = $1 LIMIT 1")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?;
    match expected.flatten() {
        Some(expected) if expected == code => {}
        _ => {
            return Err(AppError::ValidationError(
                "Activation code does not match this order".to_string(),
            ))
        }
    }

    let staff_id = order.sold_by_staff_id.ok_or_else(|| {
        AppError::InvalidStatus("Order has a code but no issuing staff member".to_string())
    })?;
    let staff = fetch_staff(&mut tx, staff_id, true).await?;

    let outcome = complete_order(&mut tx, &order, &staff, now).await?;

    tx.commit().await?;

    tracing::info!(%order_id, %staff_id, "cash order activated by buyer code");

    Ok(outcome)
}

/// Shared terminal transition into Completed: tickets go Active, the order
/// is stamped paid, staff counters and the audit record are written. Runs
/// inside the caller's transaction.
async fn complete_order(
    tx: &mut Transaction<'_, Postgres>,
    order: &Order,
    staff: &StaffIdentity,
    now: DateTime<Utc>,
) -> Result<OrderCompleted, AppError> {
    let activated: Vec<Uuid> = sqlx::query_scalar(
        r#"
        UPDATE tickets
        SET status = $1, sold_by_staff_id = $2, updated_at = now()
        WHERE order_id = $3 AND status = $4
        RETURNING id
        "#,
    )
    .bind(TicketStatus::Active)
    .bind(staff.id)
    .bind(order.id)
    .bind(TicketStatus::Pending)
    .fetch_all(&mut **tx)
    .await?;

    let ticket_count = activated.len() as i32;
    let commission = commission_cents(
        staff.commission_type,
        staff.commission_value,
        order.subtotal_cents,
        ticket_count,
    );

    sqlx::query(
        r#"
        UPDATE orders
        SET status = $1, paid_at = $2, approved_by_staff_id = $3,
            sold_by_staff_id = COALESCE(sold_by_staff_id, $3),
            staff_commission_cents = $4, updated_at = now()
        WHERE id = $5
        "#,
    )
    .bind(OrderStatus::Completed)
    .bind(now)
    .bind(staff.id)
    .bind(commission)
    .bind(order.id)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE staff_identities
        SET tickets_sold = tickets_sold + $1,
            cash_collected_cents = cash_collected_cents + $2,
            commission_earned_cents = commission_earned_cents + $3,
            updated_at = now()
        WHERE id = $4
        "#,
    )
    .bind(ticket_count)
    .bind(order.total_cents)
    .bind(commission)
    .bind(staff.id)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO staff_sales (staff_id, order_id, event_id, ticket_count, gross_cents, commission_cents)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(staff.id)
    .bind(order.id)
    .bind(order.event_id)
    .bind(ticket_count)
    .bind(order.total_cents)
    .bind(commission)
    .execute(&mut **tx)
    .await?;

    Ok(OrderCompleted {
        order_id: order.id,
        tickets_activated: ticket_count,
        commission_cents: commission,
    })
}

/// Snapshot read of orders still awaiting cash, filtered by the hold window
/// at read time so an unswept expired hold never surfaces. The caller must
/// relate to what they ask for: a staff filter requires acting as that staff
/// member (or their organizer), an event filter requires a role on the
/// event, and the unfiltered listing is scoped to the caller's own events
/// and sales.
pub async fn get_pending_cash_orders(
    pool: &PgPool,
    caller: Uuid,
    event_id: Option<Uuid>,
    staff_id: Option<Uuid>,
) -> Result<Vec<PendingCashOrder>, AppError> {
    if let Some(staff_id) = staff_id {
        let staff: StaffIdentity = sqlx::query_as("SELECT * FROM staff_identities WHERE id = $1")
            .bind(staff_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Staff identity {staff_id} not found")))?;
        staff.ensure_acting_caller(caller)?;
    } else if let Some(event_id) = event_id {
        ensure_event_access(pool, caller, event_id).await?;
    }

    #[derive(sqlx::FromRow)]
    struct Row {
        order_id: Uuid,
        order_number: String,
        event_id: Uuid,
        status: OrderStatus,
        buyer_name: String,
        buyer_phone: String,
        buyer_email: Option<String>,
        subtotal_cents: i64,
        total_cents: i64,
        ticket_count: i64,
        sold_by_staff_id: Option<Uuid>,
        hold_expires_at: DateTime<Utc>,
    }

    let rows: Vec<Row> = sqlx::query_as(
        r#"
        SELECT o.id AS order_id,
               o.order_number,
               o.event_id,
               o.status,
               g.name AS buyer_name,
               g.phone AS buyer_phone,
               g.email AS buyer_email,
               o.subtotal_cents,
               o.total_cents,
               (SELECT COUNT(*) FROM tickets t WHERE t.order_id = o.id) AS ticket_count,
               o.sold_by_staff_id,
               o.hold_expires_at
        FROM orders o
        JOIN guest_contacts g ON g.id = o.guest_contact_id
        WHERE o.status IN ('pending_cash_payment', 'code_issued')
          AND o.hold_expires_at > now()
          AND ($1::uuid IS NULL OR o.event_id = $1)
          AND ($2::uuid IS NULL OR o.sold_by_staff_id = $2)
          AND ($1::uuid IS NOT NULL OR $2::uuid IS NOT NULL
               OR EXISTS (SELECT 1 FROM events e
                          WHERE e.id = o.event_id AND e.organizer_id = $3)
               OR EXISTS (SELECT 1 FROM staff_identities si
                          WHERE si.id = o.sold_by_staff_id AND si.staff_user_id = $3))
        ORDER BY o.hold_expires_at
        "#,
    )
    .bind(event_id)
    .bind(staff_id)
    .bind(caller)
    .fetch_all(pool)
    .await?;

    let now = Utc::now();
    Ok(rows
        .into_iter()
        .map(|row| PendingCashOrder {
            order_id: row.order_id,
            order_number: row.order_number,
            event_id: row.event_id,
            status: row.status,
            buyer_name: row.buyer_name,
            buyer_phone: row.buyer_phone,
            buyer_email: row.buyer_email,
            subtotal_cents: row.subtotal_cents,
            total_cents: row.total_cents,
            ticket_count: row.ticket_count,
            sold_by_staff_id: row.sold_by_staff_id,
            time_remaining_secs: (row.hold_expires_at - now).num_seconds().max(0),
            hold_expires_at: row.hold_expires_at,
        })
        .collect())
}

/// Event-scoped reads are open to the organizer and to any staff identity
/// linked to the caller's user on that event.
async fn ensure_event_access(pool: &PgPool, caller: Uuid, event_id: Uuid) -> Result<(), AppError> {
    let related: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (SELECT 1 FROM events WHERE id = $1 AND organizer_id = $2)
            OR EXISTS (SELECT 1 FROM staff_identities
                       WHERE event_id = $1 AND staff_user_id = $2)
        "#,
    )
    .bind(event_id)
    .bind(caller)
    .fetch_one(pool)
    .await?;
    if !related {
        return Err(AppError::Forbidden(
            "Caller has no staff or organizer role on this event".to_string(),
        ));
    }
    Ok(())
}

fn ensure_staff_on_event(staff: &StaffIdentity, order: &Order) -> Result<(), AppError> {
    if staff.event_id != order.event_id {
        return Err(AppError::Forbidden(
            "Staff member belongs to a different event".to_string(),
        ));
    }
    Ok(())
}

async fn fetch_order(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> Result<Order, AppError> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(order_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))
}
