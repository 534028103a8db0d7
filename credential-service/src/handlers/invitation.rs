//! Invitation handlers.
//!
//! - Create invitation with a pre-assigned role (administrators)
//! - Validate an invitation token (public, pre-fills the signup form)
//! - Accept invitation (public, creates the account)
//! - Revoke a pending invitation (administrators)

use axum::{
    extract::{ConnectInfo, Json, Path, State},
    http::{HeaderMap, StatusCode},
};
use std::net::SocketAddr;
use uuid::Uuid;

use crate::dtos::auth::{
    AcceptInvitationRequest, CreateInvitationRequest, ValidateInvitationResponse,
};
use crate::handlers::client_meta;
use crate::middleware::AuthUser;
use crate::models::InvitationResponse;
use crate::utils::ValidatedJson;
use crate::AppState;
use service_core::error::AppError;

/// Create a new invitation.
///
/// POST /admin/invitations
#[tracing::instrument(skip_all)]
pub async fn create_invitation(
    State(state): State<AppState>,
    issuer: AuthUser,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    ValidatedJson(req): ValidatedJson<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<InvitationResponse>), AppError> {
    let meta = client_meta(&headers, connect_info.as_ref());

    let invitation = state
        .invitations
        .create_invitation(&req.email, req.role, &issuer.0, &meta)
        .await?;

    Ok((StatusCode::CREATED, Json(invitation.into())))
}

/// Look up the email and role behind an invitation token.
///
/// GET /auth/invitations/{token}
#[tracing::instrument(skip_all)]
pub async fn validate_invitation(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ValidateInvitationResponse>, AppError> {
    let invitation = state.invitations.validate_token(&token).await?;

    Ok(Json(ValidateInvitationResponse {
        email: invitation.email,
        role: invitation.role,
    }))
}

/// Accept an invitation and create the account.
///
/// POST /auth/invitations/accept
#[tracing::instrument(skip_all)]
pub async fn accept_invitation(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    ValidatedJson(req): ValidatedJson<AcceptInvitationRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let meta = client_meta(&headers, connect_info.as_ref());

    let user = state
        .invitations
        .accept_invitation(&req.token, &req.name, &req.password, &meta)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Account created successfully",
            "user": {
                "user_id": user.user_id,
                "email": user.email,
                "display_name": user.display_name,
            },
        })),
    ))
}

/// Revoke a pending invitation.
///
/// DELETE /admin/invitations/{invitation_id}
#[tracing::instrument(skip_all, fields(invitation_id = %invitation_id))]
pub async fn revoke_invitation(
    State(state): State<AppState>,
    caller: AuthUser,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Path(invitation_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let meta = client_meta(&headers, connect_info.as_ref());

    state
        .invitations
        .revoke_invitation(invitation_id, &caller.0, &meta)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
