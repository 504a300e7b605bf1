//! Cash order lifecycle and staff allocation ledger for event ticketing.
//!
//! Staff identities receive tier allocations from the organizer and may pass
//! them down to their associates; buyers reserve tickets with a time-boxed
//! cash hold that staff approve in person or fulfill via an activation code.
//! A background sweep expires lapsed holds and releases their inventory.

use std::sync::Arc;

use sqlx::PgPool;

pub mod config;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use config::Config;
use services::notify::Notifier;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub notifier: Arc<dyn Notifier>,
}
