pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use service_core::middleware::{
    rate_limit::ip_rate_limit_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::CredentialConfig;
use crate::services::{
    AccountService, AuditSink, CredentialStore, InvitationService, JwtService, Notifier,
    PasswordResetService,
};
use service_core::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub config: CredentialConfig,
    pub store: CredentialStore,
    pub notifier: Arc<dyn Notifier>,
    pub jwt: JwtService,
    pub audit: AuditSink,
    pub invitations: InvitationService,
    pub password_resets: PasswordResetService,
    pub accounts: AccountService,
    pub login_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
    pub password_reset_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
    pub invitation_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
    pub ip_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
}

impl AppState {
    /// Wire the services from their shared collaborators.
    pub fn build(
        config: CredentialConfig,
        store: CredentialStore,
        notifier: Arc<dyn Notifier>,
        jwt: JwtService,
    ) -> Self {
        let audit = AuditSink::new(store.clone());
        let invitations = InvitationService::new(store.clone(), notifier.clone(), audit.clone());
        let password_resets =
            PasswordResetService::new(store.clone(), notifier.clone(), audit.clone());
        let accounts = AccountService::new(
            store.clone(),
            jwt.clone(),
            audit.clone(),
            config.google.allowed_domains.clone(),
        );

        let login_rate_limiter = service_core::middleware::rate_limit::create_ip_rate_limiter(
            config.rate_limit.login_attempts,
            config.rate_limit.login_window_seconds,
        );
        let password_reset_rate_limiter =
            service_core::middleware::rate_limit::create_ip_rate_limiter(
                config.rate_limit.password_reset_attempts,
                config.rate_limit.password_reset_window_seconds,
            );
        let invitation_rate_limiter = service_core::middleware::rate_limit::create_ip_rate_limiter(
            config.rate_limit.invitation_attempts,
            config.rate_limit.invitation_window_seconds,
        );
        let ip_rate_limiter = service_core::middleware::rate_limit::create_ip_rate_limiter(
            config.rate_limit.global_ip_limit,
            config.rate_limit.global_ip_window_seconds,
        );

        Self {
            config,
            store,
            notifier,
            jwt,
            audit,
            invitations,
            password_resets,
            accounts,
            login_rate_limiter,
            password_reset_rate_limiter,
            invitation_rate_limiter,
            ip_rate_limiter,
        }
    }
}

pub fn build_router(state: AppState) -> Result<Router, AppError> {
    // Administrative routes: authenticated; invitation creation additionally
    // rate limited per IP.
    let invite_limiter = state.invitation_rate_limiter.clone();
    let admin_routes = Router::new()
        .route(
            "/admin/invitations",
            post(handlers::invitation::create_invitation).layer(from_fn_with_state(
                invite_limiter,
                ip_rate_limit_middleware,
            )),
        )
        .route(
            "/admin/invitations/:invitation_id",
            delete(handlers::invitation::revoke_invitation),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    // Login with per-IP rate limiting
    let login_limiter = state.login_rate_limiter.clone();
    let login_route = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(login_limiter, ip_rate_limit_middleware));

    // Password reset request with per-IP rate limiting
    let reset_request_limiter = state.password_reset_rate_limiter.clone();
    let reset_request_route = Router::new()
        .route(
            "/auth/password-reset/request",
            post(handlers::password::request_password_reset),
        )
        .layer(from_fn_with_state(
            reset_request_limiter,
            ip_rate_limit_middleware,
        ));

    let ip_limiter = state.ip_rate_limiter.clone();

    let app = Router::new()
        .route("/health", get(health_check))
        // Invitation acceptance (public, token-bearing)
        .route(
            "/auth/invitations/:token",
            get(handlers::invitation::validate_invitation),
        )
        .route(
            "/auth/invitations/accept",
            post(handlers::invitation::accept_invitation),
        )
        // Password reset (public, token-bearing)
        .route(
            "/auth/password-reset/validate/:token",
            get(handlers::password::validate_reset_token),
        )
        .route(
            "/auth/password-reset/confirm",
            post(handlers::password::confirm_password_reset),
        )
        // Google SSO
        .route("/auth/google", get(handlers::auth::google_login))
        .route(
            "/auth/google/callback",
            get(handlers::auth::google_callback),
        )
        .merge(login_route)
        .merge(reset_request_route)
        .merge(admin_routes)
        .merge(
            Router::new()
                .route("/auth/logout", post(handlers::auth::logout))
                .route("/users/me", get(handlers::auth::get_me))
                .layer(from_fn_with_state(
                    state.clone(),
                    middleware::auth_middleware,
                )),
        )
        .with_state(state.clone())
        // Overall request deadline covering store and notifier calls
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        // Global IP rate limiting
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        // Tracing layer with request ids
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        // CORS
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .security
                        .allowed_origins
                        .iter()
                        .map(|o| {
                            o.parse::<service_core::axum::http::HeaderValue>()
                                .unwrap_or_else(|e| {
                                    tracing::error!(
                                        "Invalid CORS origin '{}': {}. Using fallback.",
                                        o,
                                        e
                                    );
                                    service_core::axum::http::HeaderValue::from_static("*")
                                })
                        })
                        .collect::<Vec<service_core::axum::http::HeaderValue>>(),
                )
                .allow_methods([
                    service_core::axum::http::Method::GET,
                    service_core::axum::http::Method::POST,
                    service_core::axum::http::Method::DELETE,
                    service_core::axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    service_core::axum::http::header::AUTHORIZATION,
                    service_core::axum::http::header::CONTENT_TYPE,
                ]),
        );

    Ok(app)
}

/// Service health check
pub async fn health_check(
    service_core::axum::extract::State(state): service_core::axum::extract::State<AppState>,
) -> Result<service_core::axum::Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Database health check failed");
        AppError::from(e)
    })?;

    Ok(service_core::axum::Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "postgres": "up"
        }
    })))
}
