//! Authentication resolution middleware.
//!
//! Turns a bearer access token into an explicit request-scoped
//! [`AuthContext`]: verify the token's signature and expiry, load the
//! current user row, reject non-active accounts, and attach the resolved
//! identity to the request. Handlers receive the caller through the
//! [`AuthUser`] extractor and pass it to the workflows as a plain parameter.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::services::AuthContext;
use crate::AppState;

/// Middleware to require an authenticated, active caller.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?;

    let context = state.accounts.resolve_session(token).await?;

    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}

/// Extractor for the resolved caller identity in handlers.
pub struct AuthUser(pub AuthContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let context = parts.extensions.get::<AuthContext>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Auth context missing from request extensions"
            ))
        })?;

        Ok(AuthUser(context.clone()))
    }
}
