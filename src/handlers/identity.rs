use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::utils::error::AppError;

pub const CALLER_ID_HEADER: &str = "x-caller-id";

/// Explicit caller identity for staff and organizer operations, taken from
/// the `x-caller-id` header set by the authenticating proxy. Fails closed:
/// there is no fallback identity of any kind.
#[derive(Debug, Clone, Copy)]
pub struct CallerIdentity(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(CALLER_ID_HEADER)
            .ok_or_else(|| AppError::AuthError("Missing caller identity".to_string()))?
            .to_str()
            .map_err(|_| AppError::AuthError("Malformed caller identity".to_string()))?;

        let caller = Uuid::parse_str(raw)
            .map_err(|_| AppError::AuthError("Malformed caller identity".to_string()))?;

        Ok(CallerIdentity(caller))
    }
}
