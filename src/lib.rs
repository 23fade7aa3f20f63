pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod otp;
pub mod users;

use std::sync::Arc;
use std::time::Duration;
use sqlx::PgPool;
use actix_web::{web, HttpResponse};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{AuthService, JwtTokenIssuer, RateLimitConfig, RateLimiter, TokenIssuer, VerifyOutcome};
pub use cache::{CacheStore, MemoryCache, RedisCache, UserCache};
pub use db::{DbOperations, InMemoryUserStore, User, UserPatch, UserStore};
pub use otp::{OtpProvider, TwilioVerify};
pub use users::{SignInOutcome, UserDirectory};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Registers every HTTP route on an actix `App`.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/auth/otp/request", web::post().to(auth::handlers::request_otp))
        .route("/auth/otp/verify", web::post().to(auth::handlers::verify_otp))
        .route("/users/me", web::get().to(users::handlers::get_me))
        .route("/users/me", web::patch().to(users::handlers::update_me));
}

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub auth_service: Arc<AuthService>,
    pub tokens: Arc<JwtTokenIssuer>,
    pub cache: Arc<dyn CacheStore>,
    pub db_pool: Option<Arc<PgPool>>,
}

impl AppState {
    /// Connects to Postgres and the cache, runs migrations and wires the
    /// Twilio provider.
    pub async fn new(config: Settings) -> Result<Self> {
        let db = DbOperations::new_with_options(
            &config.database.url,
            config.database.max_connections,
            Duration::from_secs(5),
        )
        .await?;

        sqlx::migrate!("./migrations").run(db.pool()).await?;

        let db_pool = Arc::new(db.pool().clone());
        let otp = Arc::new(TwilioVerify::new(&config.otp)?);
        let cache = cache::connect(&config.cache).await?;

        let mut state = Self::with_components(config, Arc::new(db), otp, cache);
        state.db_pool = Some(db_pool);
        Ok(state)
    }

    /// Builds the state around an explicit store, provider and cache backend.
    pub fn with_components(
        config: Settings,
        store: Arc<dyn UserStore>,
        otp: Arc<dyn OtpProvider>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        let tokens = Arc::new(JwtTokenIssuer::new(
            &config.auth.jwt_secret,
            chrono::Duration::hours(config.auth.token_expiry_hours),
        ));
        let user_cache = UserCache::new(cache.clone(), config.cache.ttl());
        let users = UserDirectory::new(store, user_cache);
        let rate_limiter = RateLimiter::new(RateLimitConfig::from(&config.rate_limit));

        let auth_service = AuthService::new(otp, users, tokens.clone(), rate_limiter);

        Self {
            config: Arc::new(config),
            auth_service: Arc::new(auth_service),
            tokens,
            cache,
            db_pool: None,
        }
    }

    pub async fn shutdown(&self) -> Result<()> {
        // Close database connections
        if let Some(pool) = &self.db_pool {
            pool.close().await;
        }
        Ok(())
    }
}
