use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::handlers::identity::CallerIdentity;
use crate::services::allocations;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};
use crate::AppState;

#[derive(Deserialize)]
pub struct AllocateBody {
    pub staff_id: Uuid,
    pub tier_id: Uuid,
    pub quantity: i32,
}

pub async fn allocate(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(body): Json<AllocateBody>,
) -> Result<Response, AppError> {
    let grant = allocations::allocate(
        &state.pool,
        state.config.allow_overallocation,
        caller.0,
        body.staff_id,
        body.tier_id,
        body.quantity,
    )
    .await?;
    Ok(created(grant, "Allocation recorded").into_response())
}

#[derive(Deserialize)]
pub struct RecordSaleBody {
    pub staff_id: Uuid,
    pub tier_id: Uuid,
    pub quantity: i32,
}

pub async fn record_sale(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(body): Json<RecordSaleBody>,
) -> Result<Response, AppError> {
    let sale = allocations::record_sale(
        &state.pool,
        caller.0,
        body.staff_id,
        body.tier_id,
        body.quantity,
    )
    .await?;
    Ok(success(sale, "Sale recorded").into_response())
}

#[derive(Deserialize)]
pub struct TransferBody {
    pub from_staff_id: Uuid,
    pub to_staff_id: Uuid,
    pub tier_id: Uuid,
    pub quantity: i32,
}

pub async fn transfer(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(body): Json<TransferBody>,
) -> Result<Response, AppError> {
    let outcome = allocations::transfer(
        &state.pool,
        caller.0,
        body.from_staff_id,
        body.to_staff_id,
        body.tier_id,
        body.quantity,
    )
    .await?;
    Ok(success(outcome, "Allocation transferred").into_response())
}

pub async fn staff_tiers(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(staff_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let tiers = allocations::staff_available_tiers(&state.pool, caller.0, staff_id).await?;
    Ok(success(tiers, "Available tiers").into_response())
}
