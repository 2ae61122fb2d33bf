use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "X-Sharer-User-Id";

/// Identity of the user issuing a request, taken verbatim from the
/// `X-Sharer-User-Id` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorContext {
    pub user_id: i64,
}

impl ActorContext {
    pub fn new(user_id: i64) -> Self {
        Self { user_id }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ActorContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Validation(format!("Missing {USER_ID_HEADER} header")))?;

        let user_id = raw.trim().parse::<i64>().map_err(|_| {
            warn!(header = %raw, "non-numeric actor header");
            AppError::Validation(format!("Invalid {USER_ID_HEADER} header"))
        })?;

        Ok(ActorContext::new(user_id))
    }
}
