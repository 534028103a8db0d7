use credential_service::{
    build_router,
    config::CredentialConfig,
    services::{CredentialStore, JwtService, SmtpNotifier},
    AppState,
};
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = CredentialConfig::from_env()?;

    init_tracing(&config.service_name, &config.log_level);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting credential service"
    );

    // Initialize database
    let pool = credential_service::db::create_pool(&config.database)
        .await
        .map_err(|e| service_core::error::AppError::DatabaseError(anyhow::Error::new(e)))?;
    credential_service::db::run_migrations(&pool)
        .await
        .map_err(|e| service_core::error::AppError::DatabaseError(anyhow::Error::new(e)))?;
    let store = CredentialStore::new(pool);

    // Initialize collaborators
    let notifier = Arc::new(SmtpNotifier::new(&config.smtp, &config.public_base_url)?);
    let jwt = JwtService::new(&config.jwt)
        .map_err(service_core::error::AppError::InternalError)?;

    let state = AppState::build(config.clone(), store, notifier, jwt);

    // Seed the first SUPER_ADMIN on an empty database, when configured.
    if let Some(bootstrap) = &config.bootstrap {
        if let Some(admin) = state
            .accounts
            .bootstrap_super_admin(&bootstrap.admin_email, &bootstrap.admin_password)
            .await
            .map_err(service_core::error::AppError::from)?
        {
            tracing::info!(user_id = %admin.user_id, "Seeded bootstrap super admin");
        }
    }

    let app = build_router(state)?;

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
