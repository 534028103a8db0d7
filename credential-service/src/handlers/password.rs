//! Password reset handlers.

use axum::{
    extract::{ConnectInfo, Json, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::net::SocketAddr;

use crate::dtos::auth::{PasswordResetConfirm, PasswordResetRequest, ValidateResetResponse};
use crate::handlers::client_meta;
use crate::utils::ValidatedJson;
use crate::AppState;
use service_core::error::AppError;

/// Request a password reset link.
///
/// Always answers 200 with the same message so callers cannot probe which
/// emails have accounts.
///
/// POST /auth/password-reset/request
#[tracing::instrument(skip_all)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    ValidatedJson(req): ValidatedJson<PasswordResetRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = client_meta(&headers, connect_info.as_ref());

    state.password_resets.request_reset(&req.email, &meta).await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "If an account with that email exists, we have sent a password reset link."
        })),
    ))
}

/// Check a reset token before showing the new-password form.
///
/// GET /auth/password-reset/validate/{token}
#[tracing::instrument(skip_all)]
pub async fn validate_reset_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ValidateResetResponse>, AppError> {
    let reset = state.password_resets.validate_reset_token(&token).await?;

    Ok(Json(ValidateResetResponse { email: reset.email }))
}

/// Complete a password reset with a valid token.
///
/// POST /auth/password-reset/confirm
#[tracing::instrument(skip_all)]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    ValidatedJson(req): ValidatedJson<PasswordResetConfirm>,
) -> Result<impl IntoResponse, AppError> {
    let meta = client_meta(&headers, connect_info.as_ref());

    state
        .password_resets
        .reset_password(&req.token, &req.new_password, &meta)
        .await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "Password reset successful. You can now login with your new password."
        })),
    ))
}
