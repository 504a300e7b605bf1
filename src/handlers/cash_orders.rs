use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::handlers::identity::CallerIdentity;
use crate::services::cash_orders::{self, NewCashOrderRequest};
use crate::utils::error::AppError;
use crate::utils::response::{created, success};
use crate::AppState;

/// Buyer-facing: no caller identity, the order itself is the anchor.
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewCashOrderRequest>,
) -> Result<Response, AppError> {
    let order = cash_orders::create_cash_order(
        &state.pool,
        &state.config,
        state.notifier.clone(),
        body,
    )
    .await?;
    Ok(created(order, "Cash order created, awaiting in-person payment").into_response())
}

#[derive(Deserialize)]
pub struct ApproveBody {
    pub staff_id: Uuid,
}

pub async fn approve(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(order_id): Path<Uuid>,
    Json(body): Json<ApproveBody>,
) -> Result<Response, AppError> {
    let outcome =
        cash_orders::approve_cash_order(&state.pool, caller.0, order_id, body.staff_id).await?;
    Ok(success(outcome, "Cash payment approved").into_response())
}

#[derive(Deserialize)]
pub struct IssueCodeBody {
    pub staff_id: Uuid,
}

pub async fn issue_activation_code(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(order_id): Path<Uuid>,
    Json(body): Json<IssueCodeBody>,
) -> Result<Response, AppError> {
    let issued =
        cash_orders::generate_cash_activation_code(&state.pool, caller.0, order_id, body.staff_id)
            .await?;
    Ok(success(issued, "Activation code issued").into_response())
}

#[derive(Deserialize)]
pub struct ActivateBody {
    pub activation_code: String,
}

/// Buyer-facing: the activation code is the credential.
pub async fn activate(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(body): Json<ActivateBody>,
) -> Result<Response, AppError> {
    let outcome =
        cash_orders::activate_with_code(&state.pool, order_id, &body.activation_code).await?;
    Ok(success(outcome, "Order activated").into_response())
}

#[derive(Deserialize)]
pub struct PendingQuery {
    pub event_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
}

pub async fn pending(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(query): Query<PendingQuery>,
) -> Result<Response, AppError> {
    let orders =
        cash_orders::get_pending_cash_orders(&state.pool, caller.0, query.event_id, query.staff_id)
            .await?;
    Ok(success(orders, "Pending cash orders").into_response())
}
