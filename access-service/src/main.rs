use access_service::{
    build_router,
    config::AccessConfig,
    db,
    services::{
        AuthService, EmailService, Guardian, JwtService, OtpRepository, OtpService,
        PgCredentialStore, PgPermissionStore, RedisService, SessionManager, TwilioSmsService,
    },
    AppState,
};
use service_core::observability::init_tracing;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = AccessConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting access service"
    );

    if config.otp_gate_disabled_in_production() {
        tracing::warn!("OTP sign-up gate is disabled in production");
    }

    let pool = db::create_pool(&config.database).await?;

    let kv = Arc::new(
        RedisService::new(&config.redis)
            .await
            .map_err(service_core::error::AppError::InternalError)?,
    );
    tracing::info!("Redis service initialized");

    let email = Arc::new(EmailService::new(&config.smtp)?);
    let sms = Arc::new(TwilioSmsService::new(&config.twilio)?);
    tracing::info!("Delivery providers initialized");

    let jwt = JwtService::new(&config.jwt);

    let users = Arc::new(PgCredentialStore::new(pool.clone()));
    let permissions = Arc::new(PgPermissionStore::new(pool.clone()));

    let otp = OtpService::new(
        OtpRepository::new(kv.clone()),
        email,
        sms,
        config.otp.sender_name.clone(),
        config.phone_default_country_code.clone(),
    );
    let sessions = SessionManager::new(users.clone(), jwt.clone());
    let auth = AuthService::new(
        users.clone(),
        permissions.clone(),
        otp.clone(),
        sessions,
        jwt.clone(),
        config.otp.enabled,
        config.phone_default_country_code.clone(),
    );
    let guardian = Guardian::new(users, permissions)
        .with_snapshot_cache(kv.clone(), config.guardian_snapshot_ttl_seconds);

    let addr = config.common.bind_addr();
    let config = Arc::new(config);

    let state = AppState {
        config: config.clone(),
        db: Some(pool),
        kv,
        jwt,
        auth,
        otp,
        guardian,
    };
    let app = build_router(state);

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
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
