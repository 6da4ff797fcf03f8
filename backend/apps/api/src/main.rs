//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors; request errors are rendered by the
//! auth crate as problem documents.

use auth::{AuthConfig, InMemoryAuthRepository, PgAuthRepository, auth_router};
use axum::{
    Router, http,
    http::{Method, header},
};
use base64::Engine;
use base64::engine::general_purpose;
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PORT: u16 = 31113;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,auth=info,audit=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let auth_config = auth_config_from_env()?;

    // Store selection: PostgreSQL when configured, otherwise in-memory
    let auth = match env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&database_url)
                .await?;

            tracing::info!("Connected to database");

            // Run migrations
            sqlx::migrate!("../../../database/migrations")
                .run(&pool)
                .await?;

            tracing::info!("Migrations completed");

            // Startup cleanup: mark and prune expired sessions
            // Errors here should not prevent server startup
            let store = PgAuthRepository::new(pool);
            match store.cleanup_expired().await {
                Ok((expired, deleted)) => {
                    tracing::info!(
                        sessions_expired = expired,
                        sessions_deleted = deleted,
                        "Auth session cleanup completed"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Auth session cleanup failed, continuing anyway"
                    );
                }
            }

            auth_router(store, auth_config)?
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set, using in-memory auth store (data is lost on exit)");
            auth_router(InMemoryAuthRepository::new(), auth_config)?
        }
    };

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .nest("/api", auth)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let port = env_parse("PORT")?.unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Auth settings from `AUTH_*` variables. Debug builds without
/// `AUTH_JWT_SECRET` get a random secret and TOTP enabled.
fn auth_config_from_env() -> anyhow::Result<AuthConfig> {
    let mut config = match env::var("AUTH_JWT_SECRET") {
        Ok(secret_b64) => AuthConfig {
            jwt_secret: general_purpose::STANDARD.decode(secret_b64.trim())?,
            ..AuthConfig::default()
        },
        Err(_) if cfg!(debug_assertions) => {
            tracing::warn!("AUTH_JWT_SECRET not set, using a random development secret");
            AuthConfig::development()
        }
        Err(_) => anyhow::bail!("AUTH_JWT_SECRET must be set in production"),
    };

    if let Ok(issuer) = env::var("AUTH_JWT_ISSUER") {
        config.jwt_issuer = issuer;
    }
    if let Some(secs) = env_parse::<u64>("AUTH_ACCESS_TOKEN_TTL_SECS")? {
        config.access_token_ttl = Duration::from_secs(secs);
    }
    if let Some(secs) = env_parse::<u64>("AUTH_REFRESH_TOKEN_TTL_SECS")? {
        config.refresh_token_ttl = Duration::from_secs(secs);
    }
    if let Ok(code) = env::var("AUTH_DEFAULT_APP_CODE") {
        config.default_app_code = code;
    }
    if let Ok(code) = env::var("AUTH_DEFAULT_ROLE_CODE") {
        config.default_role_code = Some(code).filter(|c| !c.trim().is_empty());
    }
    if let Ok(pepper) = env::var("AUTH_PASSWORD_PEPPER") {
        config.password_pepper = Some(pepper.into_bytes());
    }
    if let Some(revoke) = env_parse::<bool>("AUTH_REVOKE_ON_REFRESH_REUSE")? {
        config.revoke_session_on_refresh_reuse = revoke;
    }

    if let Some(enabled) = env_parse::<bool>("AUTH_TOTP_ENABLED")? {
        config.totp.enabled = enabled;
    }
    if let Ok(issuer) = env::var("AUTH_TOTP_ISSUER") {
        config.totp.issuer = issuer;
    }
    if let Some(skew) = env_parse::<u8>("AUTH_TOTP_SKEW")? {
        config.totp.skew = skew;
    }
    if let Some(secs) = env_parse::<u64>("AUTH_TOTP_LOGIN_TOKEN_TTL_SECS")? {
        config.totp.login_token_ttl = Duration::from_secs(secs);
    }

    tracing::info!(
        issuer = %config.jwt_issuer,
        access_ttl_secs = config.access_token_ttl.as_secs(),
        refresh_ttl_secs = config.refresh_token_ttl.as_secs(),
        totp_enabled = config.totp.enabled,
        "Auth configuration loaded"
    );

    Ok(config)
}

fn env_parse<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => Ok(Some(raw.trim().parse::<T>().map_err(|e| {
            anyhow::anyhow!("{key} is invalid: {e}")
        })?)),
        Err(_) => Ok(None),
    }
}
