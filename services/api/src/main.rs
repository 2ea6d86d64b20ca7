use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Result;
use common::{
    SystemClock,
    cache::RedisPool,
    database::{health_check, init_pool},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod csrf;
mod error;
mod extract;
mod middleware;
mod models;
mod rate_limiter;
mod repositories;
mod routes;
mod session;
mod state;

use crate::{
    auth::AccessTokenVerifier,
    config::{AppConfig, SessionStoreKind},
    csrf::CsrfTokenManager,
    rate_limiter::RateLimiter,
    repositories::{TaskRepository, goals::GoalRepository},
    session::{MemorySessionStore, RedisSessionStore, SessionManager, SessionStore},
    state::{AppState, cookie_key},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting API service");

    let config = AppConfig::from_env()?;
    info!("Environment: {}", config.environment);

    // Initialize database connection pool
    let pool = init_pool(&config.database).await?;

    // Check database connectivity
    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied");

    let clock = SystemClock::shared();

    let store: Arc<dyn SessionStore> = match config.session_store {
        SessionStoreKind::Redis => {
            let redis = RedisPool::new(&config.redis)?;
            if !redis.health_check().await? {
                anyhow::bail!("Failed to connect to Redis");
            }
            info!("Using Redis session store");
            Arc::new(RedisSessionStore::new(redis))
        }
        SessionStoreKind::Memory => {
            warn!("Using in-memory session store; sessions are lost on restart");
            Arc::new(MemorySessionStore::new())
        }
    };

    let csrf = CsrfTokenManager::new(&config.csrf_secret, clock.clone())?;
    // Keep the scheduler alive for the lifetime of the process
    let _csrf_sweep = csrf.start_cleanup_job(&config.csrf_cleanup_schedule).await?;

    let rate_limiter = RateLimiter::new(config.rate_limit.clone());
    let sessions = SessionManager::new(store, clock);
    spawn_maintenance(rate_limiter.clone(), sessions.clone());

    let port = config.port;
    let app_state = AppState {
        started_at: Instant::now(),
        sessions,
        csrf,
        rate_limiter,
        access_tokens: AccessTokenVerifier::new(&config.auth_jwt_secret),
        task_repository: TaskRepository::new(pool.clone()),
        goal_repository: GoalRepository::new(pool),
        cookie_key: cookie_key(&config.session_secret),
        config: Arc::new(config),
    };

    // Start the web server
    let app = routes::create_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API service listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Periodically drop ended rate-limit windows and expired sessions
fn spawn_maintenance(rate_limiter: RateLimiter, sessions: SessionManager) {
    tokio::spawn(async move {
        let period = rate_limiter.config().window.max(Duration::from_secs(1));
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            rate_limiter.prune().await;
            if let Err(e) = sessions.cleanup_expired().await {
                warn!("Session cleanup failed: {}", e);
            }
        }
    });
}
