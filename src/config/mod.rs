use std::env;
use std::str::FromStr;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

/// Runtime configuration, sourced from the environment once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// How long a cash order holds its tickets before expiring.
    pub hold_minutes: i64,
    /// Cadence of the background sweep that expires lapsed holds.
    pub sweep_interval_secs: u64,
    /// When false (default), the sum of staff allocations across a tier may
    /// not exceed the tier's total quantity.
    pub allow_overallocation: bool,
    /// Flat per-order fees, in cents. Zero unless the deployment charges them.
    pub platform_fee_cents: i64,
    pub processing_fee_cents: i64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/boxoffice".to_string()),
            port: parse_env("PORT", 3001),
            hold_minutes: parse_env("CASH_HOLD_MINUTES", 30),
            sweep_interval_secs: parse_env("HOLD_SWEEP_INTERVAL_SECS", 60),
            allow_overallocation: parse_env("ALLOW_OVERALLOCATION", false),
            platform_fee_cents: parse_env("PLATFORM_FEE_CENTS", 0),
            processing_fee_cents: parse_env("PROCESSING_FEE_CENTS", 0),
        }
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, raw = %raw, "unparseable env value, using default");
                default
            }
        },
        Err(_) => default,
    }
}
