//! Session handlers: credential login, logout, profile, and the Google SSO
//! authorization-code flow.

use axum::{
    extract::{ConnectInfo, Json, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::net::SocketAddr;

use crate::dtos::auth::{AuthResponse, GoogleCallbackQuery, LoginRequest, TokenResponse};
use crate::handlers::client_meta;
use crate::middleware::AuthUser;
use crate::utils::ValidatedJson;
use crate::AppState;
use service_core::error::AppError;

/// Authenticate with email and password.
///
/// POST /auth/login
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let meta = client_meta(&headers, connect_info.as_ref());

    let (user, access_token) = state.accounts.login(&req.email, &req.password, &meta).await?;

    Ok(Json(AuthResponse {
        user: user.sanitized(),
        tokens: TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: state.jwt.access_token_expiry_seconds(),
        },
    }))
}

/// Record a logout for the calling session. Tokens are stateless, so the
/// client discards its copy; this endpoint exists for the audit trail.
///
/// POST /auth/logout
#[tracing::instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    caller: AuthUser,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Result<impl IntoResponse, AppError> {
    let meta = client_meta(&headers, connect_info.as_ref());
    state.accounts.logout(&caller.0, &meta);

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Logged out" })),
    ))
}

/// The resolved identity of the calling session.
///
/// GET /users/me
pub async fn get_me(caller: AuthUser) -> Json<serde_json::Value> {
    let ctx = caller.0;
    Json(serde_json::json!({
        "user_id": ctx.user_id,
        "email": ctx.email,
        "display_name": ctx.display_name,
        "role": ctx.role,
        "status": ctx.status,
    }))
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    email: String,
    verified_email: bool,
    name: Option<String>,
}

/// Start the Google OAuth flow with PKCE.
///
/// GET /auth/google
pub async fn google_login(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Response) {
    let state_val = uuid::Uuid::new_v4().to_string();
    let code_verifier = {
        let mut bytes = [0u8; 32];
        use rand::RngCore;
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    };

    let code_challenge = {
        let mut hasher = Sha256::new();
        hasher.update(code_verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    };

    let google_url = format!(
        "https://accounts.google.com/o/oauth2/v2/auth?client_id={}&redirect_uri={}&response_type=code&scope=openid%20email%20profile&state={}&code_challenge={}&code_challenge_method=S256",
        state.config.google.client_id,
        state.config.google.redirect_uri,
        state_val,
        code_challenge
    );

    let updated_jar = jar
        .add(
            Cookie::build(("oauth_state", state_val))
                .path("/")
                .http_only(true)
                .secure(true)
                .max_age(time::Duration::minutes(5))
                .build(),
        )
        .add(
            Cookie::build(("code_verifier", code_verifier))
                .path("/")
                .http_only(true)
                .secure(true)
                .max_age(time::Duration::minutes(5))
                .build(),
        );

    (updated_jar, Redirect::to(&google_url).into_response())
}

/// Finish the Google OAuth flow: exchange the code, fetch the profile, and
/// provision or refresh the user if the email's domain is allow-listed.
///
/// GET /auth/google/callback
#[tracing::instrument(skip_all)]
pub async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Query(query): Query<GoogleCallbackQuery>,
) -> Result<(CookieJar, Response), AppError> {
    let stored_state = jar.get("oauth_state").map(|c| c.value());
    if stored_state != Some(&query.state) {
        return Err(AppError::BadRequest(anyhow::anyhow!("Invalid OAuth state")));
    }

    let code_verifier = jar
        .get("code_verifier")
        .map(|c| c.value())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing code verifier")))?;

    let client = reqwest::Client::new();
    let token_res = client
        .post("https://oauth2.googleapis.com/token")
        .form(&[
            ("client_id", &state.config.google.client_id),
            ("client_secret", &state.config.google.client_secret),
            ("code", &query.code),
            ("code_verifier", &code_verifier.to_string()),
            ("grant_type", &"authorization_code".to_string()),
            ("redirect_uri", &state.config.google.redirect_uri),
        ])
        .send()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to exchange Google code");
            AppError::AuthError(anyhow::anyhow!("Authentication failed"))
        })?;

    if !token_res.status().is_success() {
        let status = token_res.status();
        let err_body = token_res.text().await.unwrap_or_default();
        tracing::error!(status = %status, body = %err_body, "Google token exchange error");
        return Err(AppError::AuthError(anyhow::anyhow!(
            "Authentication failed"
        )));
    }

    let token_data: GoogleTokenResponse = token_res.json().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to parse Google token response");
        AppError::InternalError(anyhow::anyhow!("Internal server error"))
    })?;

    let user_info_res = client
        .get("https://www.googleapis.com/oauth2/v2/userinfo")
        .bearer_auth(token_data.access_token)
        .send()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch Google user info");
            AppError::AuthError(anyhow::anyhow!("Authentication failed"))
        })?;

    let user_info: GoogleUserInfo = user_info_res.json().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to parse Google user info");
        AppError::InternalError(anyhow::anyhow!("Internal server error"))
    })?;

    if !user_info.verified_email {
        return Err(AppError::AuthError(anyhow::anyhow!(
            "Google account email is not verified"
        )));
    }

    let meta = client_meta(&headers, connect_info.as_ref());
    let (_user, access_token) = state
        .accounts
        .sso_sign_in(&user_info.email, user_info.name, &meta)
        .await?;

    let cleared_jar = jar
        .remove(Cookie::from("oauth_state"))
        .remove(Cookie::from("code_verifier"));

    // Hand the token to the frontend in the URL fragment so it never hits
    // server logs on the redirect target.
    let redirect_url = format!(
        "{}/auth/callback#access_token={}",
        state.config.google.frontend_url.trim_end_matches('/'),
        access_token
    );

    Ok((cleared_jar, Redirect::to(&redirect_url).into_response()))
}
