use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{allocations, cash_orders, health_check};
use crate::AppState;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/allocations", post(allocations::allocate))
        .route("/allocations/record-sale", post(allocations::record_sale))
        .route("/allocations/transfer", post(allocations::transfer))
        .route("/staff/:staff_id/tiers", get(allocations::staff_tiers))
        .route("/cash-orders", post(cash_orders::create))
        .route("/cash-orders/pending", get(cash_orders::pending))
        .route("/cash-orders/:order_id/approve", post(cash_orders::approve))
        .route(
            "/cash-orders/:order_id/activation-code",
            post(cash_orders::issue_activation_code),
        )
        .route(
            "/cash-orders/:order_id/activate",
            post(cash_orders::activate),
        )
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer())
        .layer(create_cors_layer())
        .with_state(state)
}
