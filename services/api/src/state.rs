//! Application state shared across handlers

use std::sync::Arc;
use std::time::Instant;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};

use crate::{
    auth::AccessTokenVerifier,
    config::AppConfig,
    csrf::CsrfTokenManager,
    rate_limiter::RateLimiter,
    repositories::{TaskRepository, goals::GoalRepository},
    session::SessionManager,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub started_at: Instant,
    pub sessions: SessionManager,
    pub csrf: CsrfTokenManager,
    pub rate_limiter: RateLimiter,
    pub access_tokens: AccessTokenVerifier,
    pub task_repository: TaskRepository,
    pub goal_repository: GoalRepository,
    pub cookie_key: Key,
}

/// Cookie signing key derived from the session secret
pub fn cookie_key(session_secret: &str) -> Key {
    let digest = Sha512::digest(session_secret.as_bytes());
    Key::from(digest.as_slice())
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
