//! CSRF token manager
//!
//! Tokens are kept in memory, one per session id, and expire 24 hours after
//! issuance. A cron job sweeps expired entries; validation also evicts an
//! expired entry it runs into.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use common::SharedClock;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info};

pub const CSRF_HEADER: &str = "x-csrf-token";
/// Body field checked when the header is absent
pub const CSRF_FIELD: &str = "_csrf";
pub const TOKEN_LIFETIME_HOURS: i64 = 24;

#[derive(Error, Debug)]
pub enum CsrfError {
    #[error("CSRF secret must not be empty")]
    EmptySecret,
}

#[derive(Debug, Clone)]
struct CsrfEntry {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CsrfEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Clone)]
pub struct CsrfTokenManager {
    secret: Arc<str>,
    clock: SharedClock,
    tokens: Arc<Mutex<HashMap<String, CsrfEntry>>>,
}

impl CsrfTokenManager {
    pub fn new(secret: &str, clock: SharedClock) -> Result<Self, CsrfError> {
        if secret.is_empty() {
            return Err(CsrfError::EmptySecret);
        }

        Ok(Self {
            secret: Arc::from(secret),
            clock,
            tokens: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn mint(&self, session_id: &str) -> String {
        let mut nonce = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(session_id.as_bytes());
        hasher.update(nonce);
        hex::encode(hasher.finalize())
    }

    /// Issue a new token for the session, replacing any previous one
    pub async fn generate_token(&self, session_id: &str) -> String {
        let token = self.mint(session_id);
        let expires_at = self.clock.now() + Duration::hours(TOKEN_LIFETIME_HOURS);

        self.tokens.lock().await.insert(
            session_id.to_string(),
            CsrfEntry {
                token: token.clone(),
                expires_at,
            },
        );

        debug!("Issued CSRF token for session {}", session_id);
        token
    }

    /// True only for the live token currently stored for the session
    pub async fn validate_token(&self, session_id: &str, token: &str) -> bool {
        let mut tokens = self.tokens.lock().await;

        let Some(entry) = tokens.get(session_id) else {
            return false;
        };

        if entry.is_expired(self.clock.now()) {
            tokens.remove(session_id);
            return false;
        }

        entry.token.as_bytes() == token.as_bytes()
    }

    /// Current live token for the session, minting one when none is live
    pub async fn issue_or_reuse(&self, session_id: &str) -> String {
        {
            let tokens = self.tokens.lock().await;
            if let Some(entry) = tokens.get(session_id) {
                if !entry.is_expired(self.clock.now()) {
                    return entry.token.clone();
                }
            }
        }

        self.generate_token(session_id).await
    }

    /// Live token for the session, without minting
    pub async fn current_token(&self, session_id: &str) -> Option<String> {
        let tokens = self.tokens.lock().await;
        tokens
            .get(session_id)
            .filter(|entry| !entry.is_expired(self.clock.now()))
            .map(|entry| entry.token.clone())
    }

    pub async fn revoke(&self, session_id: &str) -> bool {
        self.tokens.lock().await.remove(session_id).is_some()
    }

    /// Remove every expired entry, returning how many were dropped
    pub async fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut tokens = self.tokens.lock().await;

        let before = tokens.len();
        tokens.retain(|_, entry| !entry.is_expired(now));
        before - tokens.len()
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.tokens.lock().await.len()
    }

    /// Run [`cleanup_expired`](Self::cleanup_expired) on a cron schedule
    pub async fn start_cleanup_job(&self, schedule: &str) -> Result<JobScheduler> {
        let manager = self.clone();
        let scheduler = JobScheduler::new().await?;

        let job = Job::new_async(schedule, move |_, _| {
            let manager = manager.clone();
            Box::pin(async move {
                let removed = manager.cleanup_expired().await;
                info!("CSRF sweep removed {} expired tokens", removed);
            })
        })?;

        scheduler.add(job).await?;
        scheduler.start().await?;

        info!("Started CSRF cleanup scheduler with schedule: {}", schedule);
        Ok(scheduler)
    }
}
