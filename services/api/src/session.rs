//! Server-side sessions
//!
//! A session is created when the client exchanges an access token from the
//! auth provider; the browser only holds its id in a signed cookie. Records
//! live in Redis with a TTL, or in memory for single-process setups and tests.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::SharedClock;
use common::cache::RedisPool;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "maker.sid";
pub const SESSION_LIFETIME_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn new(user_id: Uuid, now: DateTime<Utc>) -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);

        Self {
            id: hex::encode(bytes),
            user_id,
            created_at: now,
            expires_at: now + Duration::hours(SESSION_LIFETIME_HOURS),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Persistence for session records
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: &Session, ttl_seconds: u64) -> Result<()>;

    async fn load(&self, id: &str) -> Result<Option<Session>>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Remove records expired at `now`; stores with native TTLs have nothing to do
    async fn delete_expired(&self, _now: DateTime<Utc>) -> Result<usize> {
        Ok(0)
    }
}

/// Sessions as JSON under `session:{id}` in Redis
pub struct RedisSessionStore {
    redis_pool: RedisPool,
}

impl RedisSessionStore {
    pub fn new(redis_pool: RedisPool) -> Self {
        Self { redis_pool }
    }

    fn key(id: &str) -> String {
        format!("session:{}", id)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn save(&self, session: &Session, ttl_seconds: u64) -> Result<()> {
        let value = serde_json::to_string(session)?;
        self.redis_pool
            .set(&Self::key(&session.id), &value, Some(ttl_seconds))
            .await?;
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Session>> {
        match self.redis_pool.get(&Self::key(id)).await? {
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.redis_pool.delete(&Self::key(id)).await?;
        Ok(())
    }
}

/// Process-local sessions; expiry is enforced by [`SessionManager`]
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, session: &Session, _ttl_seconds: u64) -> Result<()> {
        self.sessions
            .lock()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.lock().await.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.lock().await.remove(id);
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        Ok(before - sessions.len())
    }
}

/// Session manager for creating, resolving and ending sessions
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    clock: SharedClock,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    pub async fn create(&self, user_id: Uuid) -> Result<Session> {
        let session = Session::new(user_id, self.clock.now());
        self.store
            .save(&session, (SESSION_LIFETIME_HOURS * 3600) as u64)
            .await?;

        info!("Created session for user: {}", user_id);
        Ok(session)
    }

    /// Live session for the id; expired records are removed and treated as absent
    pub async fn get(&self, id: &str) -> Result<Option<Session>> {
        let Some(session) = self.store.load(id).await? else {
            return Ok(None);
        };

        if session.is_expired(self.clock.now()) {
            debug!("Session {} expired", id);
            self.store.delete(id).await?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Sweep expired records out of the store
    pub async fn cleanup_expired(&self) -> Result<usize> {
        let removed = self.store.delete_expired(self.clock.now()).await?;
        if removed > 0 {
            info!("Removed {} expired sessions", removed);
        }
        Ok(removed)
    }

    pub async fn destroy(&self, id: &str) -> Result<()> {
        self.store.delete(id).await?;
        info!("Deleted session {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ManualClock;

    #[tokio::test]
    async fn test_session_lifecycle() {
        let clock = ManualClock::default();
        let manager = SessionManager::new(Arc::new(MemorySessionStore::new()), clock.shared());
        let user_id = Uuid::new_v4();

        let session = manager.create(user_id).await.unwrap();
        assert_eq!(session.id.len(), 64);
        assert_eq!(session.expires_at - session.created_at, Duration::hours(24));

        let loaded = manager.get(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.user_id, user_id);

        manager.destroy(&session.id).await.unwrap();
        assert!(manager.get(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_absent() {
        let clock = ManualClock::default();
        let store = Arc::new(MemorySessionStore::new());
        let manager = SessionManager::new(store.clone(), clock.shared());

        let session = manager.create(Uuid::new_v4()).await.unwrap();
        clock.advance(Duration::hours(25));

        assert!(manager.get(&session.id).await.unwrap().is_none());
        assert!(store.load(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_expired_sessions() {
        let clock = ManualClock::default();
        let store = Arc::new(MemorySessionStore::new());
        let manager = SessionManager::new(store.clone(), clock.shared());

        let old = manager.create(Uuid::new_v4()).await.unwrap();
        let older = manager.create(Uuid::new_v4()).await.unwrap();
        clock.advance(Duration::hours(25));
        let live = manager.create(Uuid::new_v4()).await.unwrap();

        assert_eq!(manager.cleanup_expired().await.unwrap(), 2);
        assert!(store.load(&old.id).await.unwrap().is_none());
        assert!(store.load(&older.id).await.unwrap().is_none());
        assert!(manager.get(&live.id).await.unwrap().is_some());

        assert_eq!(manager.cleanup_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let manager = SessionManager::new(
            Arc::new(MemorySessionStore::new()),
            ManualClock::default().shared(),
        );
        assert!(manager.get("missing").await.unwrap().is_none());
    }
}
