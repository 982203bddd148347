//! Caller identity extractor.
//!
//! The authenticating proxy in front of this service resolves the user and
//! forwards it in `X-User-ID`, `X-User-Name` and `X-User-Email`.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;

use crate::services::gateway::Payer;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

#[derive(Debug, Clone)]
pub struct CallerContext {
    pub user_id: i64,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl CallerContext {
    /// Payer details shown on the gateway checkout page.
    pub fn payer(&self) -> Payer {
        Payer {
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing X-User-ID header")))?
            .parse::<i64>()
            .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid X-User-ID header")))?;

        tracing::Span::current().record("user_id", user_id);

        Ok(CallerContext {
            user_id,
            name: header(parts, USER_NAME_HEADER),
            email: header(parts, USER_EMAIL_HEADER),
        })
    }
}
