//! Staff allocation ledger: organizer grants, sale recording and hierarchical
//! transfers. Every mutation runs in a single transaction; rows under
//! mutation are locked with `FOR UPDATE`, and tier inventory changes go
//! through the version-guarded update in [`bump_tier_sold`] with a bounded
//! retry before surfacing `ConcurrentUpdate`.

use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::{StaffAllocation, StaffIdentity, TicketTier};
use crate::utils::error::AppError;

pub const MAX_VERSION_RETRIES: u32 = 3;

#[derive(Debug, Serialize)]
pub struct AllocationGrant {
    pub allocation_id: Uuid,
    pub added: i32,
}

#[derive(Debug, Serialize)]
pub struct SaleRecorded {
    pub allocation_id: Uuid,
    pub quantity: i32,
    pub remaining_quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct TransferOutcome {
    pub transferred: i32,
    pub source_remaining: i32,
    pub destination_remaining: i32,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AvailableTier {
    pub tier_id: Uuid,
    pub tier_name: String,
    pub unit_price_cents: i64,
    pub allocated_quantity: i32,
    pub sold_quantity: i32,
    pub remaining_quantity: i32,
}

/// Organizer grants `quantity` units of a tier to a staff identity.
/// Creates the (staff, tier) ledger row on first use, increments in place
/// afterwards. With `allow_overallocation` disabled the sum of grants across
/// a tier may not exceed the tier's total quantity.
pub async fn allocate(
    pool: &PgPool,
    allow_overallocation: bool,
    caller: Uuid,
    staff_id: Uuid,
    tier_id: Uuid,
    quantity: i32,
) -> Result<AllocationGrant, AppError> {
    ensure_positive(quantity)?;

    let mut tx = pool.begin().await?;

    let staff = fetch_staff(&mut tx, staff_id, false).await?;
    if staff.organizer_id != caller {
        return Err(AppError::Forbidden(
            "Only the event organizer can allocate tickets to staff".to_string(),
        ));
    }

    // Tier is locked so the over-allocation check serializes with
    // concurrent grants on the same tier.
    let tier: TicketTier =
        sqlx::query_as("SELECT * FROM ticket_tiers WHERE id = $1 FOR UPDATE")
            .bind(tier_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket tier {tier_id} not found")))?;

    if tier.event_id != staff.event_id {
        return Err(AppError::TierMismatch);
    }

    let already_allocated: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(allocated_quantity), 0) FROM staff_allocations WHERE tier_id = $1",
    )
    .bind(tier_id)
    .fetch_one(&mut *tx)
    .await?;
    check_allocation_headroom(
        tier.total_quantity,
        already_allocated,
        quantity,
        allow_overallocation,
    )?;

    let allocation_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO staff_allocations
            (staff_id, event_id, tier_id, allocated_quantity, sold_quantity, remaining_quantity)
        VALUES ($1, $2, $3, $4, 0, $4)
        ON CONFLICT ON CONSTRAINT uq_staff_allocations_staff_tier DO UPDATE SET
            allocated_quantity = staff_allocations.allocated_quantity + EXCLUDED.allocated_quantity,
            remaining_quantity = staff_allocations.remaining_quantity + EXCLUDED.remaining_quantity,
            updated_at = now()
        RETURNING id
        "#,
    )
    .bind(staff_id)
    .bind(staff.event_id)
    .bind(tier_id)
    .bind(quantity)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        %staff_id,
        %tier_id,
        quantity,
        "allocated tier inventory to staff member"
    );

    Ok(AllocationGrant {
        allocation_id,
        added: quantity,
    })
}

/// Records that a staff member sold `quantity` units of a tier outside the
/// cash-order flow. Decrements the ledger, bumps the staff running counter
/// and the tier's sold count, all in one transaction.
pub async fn record_sale(
    pool: &PgPool,
    caller: Uuid,
    staff_id: Uuid,
    tier_id: Uuid,
    quantity: i32,
) -> Result<SaleRecorded, AppError> {
    ensure_positive(quantity)?;

    for attempt in 1..=MAX_VERSION_RETRIES {
        match try_record_sale(pool, caller, staff_id, tier_id, quantity).await {
            Err(AppError::ConcurrentUpdate) if attempt < MAX_VERSION_RETRIES => {
                tracing::debug!(%tier_id, attempt, "tier version conflict, retrying sale");
                continue;
            }
            other => return other,
        }
    }
    Err(AppError::ConcurrentUpdate)
}

async fn try_record_sale(
    pool: &PgPool,
    caller: Uuid,
    staff_id: Uuid,
    tier_id: Uuid,
    quantity: i32,
) -> Result<SaleRecorded, AppError> {
    let mut tx = pool.begin().await?;

    let staff = fetch_staff(&mut tx, staff_id, true).await?;
    staff.ensure_acting_caller(caller)?;

    // Tier is read without a lock; the version-guarded update below detects
    // racing writers.
    let tier: TicketTier = sqlx::query_as("SELECT * FROM ticket_tiers WHERE id = $1")
        .bind(tier_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ticket tier {tier_id} not found")))?;

    if tier.event_id != staff.event_id {
        return Err(AppError::TierMismatch);
    }
    tier.ensure_capacity(quantity)?;

    let mut allocation = fetch_allocation(&mut tx, staff_id, tier_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("No allocation exists for this staff member and tier".to_string())
        })?;
    allocation.consume(quantity)?;
    store_allocation(&mut tx, &allocation).await?;

    sqlx::query(
        "UPDATE staff_identities SET tickets_sold = tickets_sold + $1, updated_at = now() WHERE id = $2",
    )
    .bind(quantity)
    .bind(staff_id)
    .execute(&mut *tx)
    .await?;

    bump_tier_sold(&mut tx, &tier, quantity).await?;

    tx.commit().await?;

    tracing::info!(%staff_id, %tier_id, quantity, "recorded staff ticket sale");

    Ok(SaleRecorded {
        allocation_id: allocation.id,
        quantity,
        remaining_quantity: allocation.remaining_quantity,
    })
}

/// Moves allocation down the hierarchy: a staff member (or the organizer on
/// their behalf) hands part of their remaining allocation to an associate
/// they assigned. Both ledger legs commit or neither does; the transfer is
/// zero-sum across the tier.
pub async fn transfer(
    pool: &PgPool,
    caller: Uuid,
    from_staff_id: Uuid,
    to_staff_id: Uuid,
    tier_id: Uuid,
    quantity: i32,
) -> Result<TransferOutcome, AppError> {
    ensure_positive(quantity)?;
    if from_staff_id == to_staff_id {
        return Err(AppError::ValidationError(
            "Cannot transfer an allocation to the same staff member".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let source_staff = fetch_staff(&mut tx, from_staff_id, false).await?;
    source_staff.ensure_acting_caller(caller)?;

    let destination_staff = fetch_staff(&mut tx, to_staff_id, false).await?;
    source_staff.ensure_assigned(&destination_staff)?;
    source_staff.ensure_same_event(&destination_staff)?;

    let mut source = fetch_allocation(&mut tx, from_staff_id, tier_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("Source staff member has no allocation for this tier".to_string())
        })?;
    source.release(quantity)?;
    store_allocation(&mut tx, &source).await?;

    let destination_remaining: i32 = sqlx::query_scalar(
        r#"
        INSERT INTO staff_allocations
            (staff_id, event_id, tier_id, allocated_quantity, sold_quantity, remaining_quantity)
        VALUES ($1, $2, $3, $4, 0, $4)
        ON CONFLICT ON CONSTRAINT uq_staff_allocations_staff_tier DO UPDATE SET
            allocated_quantity = staff_allocations.allocated_quantity + EXCLUDED.allocated_quantity,
            remaining_quantity = staff_allocations.remaining_quantity + EXCLUDED.remaining_quantity,
            updated_at = now()
        RETURNING remaining_quantity
        "#,
    )
    .bind(to_staff_id)
    .bind(destination_staff.event_id)
    .bind(tier_id)
    .bind(quantity)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        %from_staff_id,
        %to_staff_id,
        %tier_id,
        quantity,
        "transferred allocation to associate"
    );

    Ok(TransferOutcome {
        transferred: quantity,
        source_remaining: source.remaining_quantity,
        destination_remaining,
    })
}

/// Snapshot read: the tiers a staff member can currently sell from. Scoped
/// to callers acting as that staff member or as the organizer, like the
/// mutation paths.
pub async fn staff_available_tiers(
    pool: &PgPool,
    caller: Uuid,
    staff_id: Uuid,
) -> Result<Vec<AvailableTier>, AppError> {
    let staff: StaffIdentity = sqlx::query_as("SELECT * FROM staff_identities WHERE id = $1")
        .bind(staff_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Staff identity {staff_id} not found")))?;
    staff.ensure_acting_caller(caller)?;

    let tiers = sqlx::query_as(
        r#"
        SELECT a.tier_id,
               t.name AS tier_name,
               t.unit_price_cents,
               a.allocated_quantity,
               a.sold_quantity,
               a.remaining_quantity
        FROM staff_allocations a
        JOIN ticket_tiers t ON t.id = a.tier_id
        WHERE a.staff_id = $1
        ORDER BY t.name
        "#,
    )
    .bind(staff_id)
    .fetch_all(pool)
    .await?;

    Ok(tiers)
}

/// Version-guarded tier inventory bump shared by the sale paths. Zero rows
/// affected means another writer advanced the version first.
pub(crate) async fn bump_tier_sold(
    tx: &mut Transaction<'_, Postgres>,
    tier: &TicketTier,
    delta: i32,
) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        UPDATE ticket_tiers
        SET sold_count = sold_count + $1, version = version + 1, updated_at = now()
        WHERE id = $2 AND version = $3
          AND sold_count + $1 >= 0
          AND sold_count + $1 <= total_quantity
        "#,
    )
    .bind(delta)
    .bind(tier.id)
    .bind(tier.version)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::ConcurrentUpdate);
    }
    Ok(())
}

/// Capacity gate for organizer grants. With over-allocation disabled the sum
/// of all grants across a tier may not exceed the tier's total quantity; with
/// it enabled any grant passes.
pub fn check_allocation_headroom(
    total_quantity: i32,
    already_allocated: i64,
    requested: i32,
    allow_overallocation: bool,
) -> Result<(), AppError> {
    if allow_overallocation {
        return Ok(());
    }
    let headroom = total_quantity as i64 - already_allocated;
    if (requested as i64) > headroom {
        return Err(AppError::InsufficientAllocation {
            requested,
            remaining: headroom.max(0) as i32,
        });
    }
    Ok(())
}

fn ensure_positive(quantity: i32) -> Result<(), AppError> {
    if quantity <= 0 {
        return Err(AppError::ValidationError(
            "Quantity must be positive".to_string(),
        ));
    }
    Ok(())
}

pub(crate) async fn fetch_staff(
    tx: &mut Transaction<'_, Postgres>,
    staff_id: Uuid,
    for_update: bool,
) -> Result<StaffIdentity, AppError> {
    let query = if for_update {
        "SELECT * FROM staff_identities WHERE id = $1 FOR UPDATE"
    } else {
        "SELECT * FROM staff_identities WHERE id = $1"
    };
    sqlx::query_as(query)
        .bind(staff_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Staff identity {staff_id} not found")))
}

async fn fetch_allocation(
    tx: &mut Transaction<'_, Postgres>,
    staff_id: Uuid,
    tier_id: Uuid,
) -> Result<Option<StaffAllocation>, AppError> {
    let allocation = sqlx::query_as(
        "SELECT * FROM staff_allocations WHERE staff_id = $1 AND tier_id = $2 FOR UPDATE",
    )
    .bind(staff_id)
    .bind(tier_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(allocation)
}

async fn store_allocation(
    tx: &mut Transaction<'_, Postgres>,
    allocation: &StaffAllocation,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE staff_allocations
        SET allocated_quantity = $1, sold_quantity = $2, remaining_quantity = $3, updated_at = now()
        WHERE id = $4
        "#,
    )
    .bind(allocation.allocated_quantity)
    .bind(allocation.sold_quantity)
    .bind(allocation.remaining_quantity)
    .bind(allocation.id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
