//! Per-user session serialisation.
//!
//! Every handler for a user runs while holding that user's
//! [`SessionGuard`], so two events from the same user never interleave
//! their reads and writes of `last_deals`. Different users never contend.
//! Snapshots are written through a [`SessionStore`] while the guard is held.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dealbot_core::UserSession;
use sqlx::PgPool;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::DealError;

pub type SessionGuard = OwnedMutexGuard<UserSession>;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, user_id: &str) -> Result<Option<UserSession>, DealError>;
    async fn save(&self, session: &UserSession) -> Result<(), DealError>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, UserSession>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, user_id: &str) -> Result<Option<UserSession>, DealError> {
        Ok(self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned())
    }

    async fn save(&self, session: &UserSession) -> Result<(), DealError> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.user_id.clone(), session.clone());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn load(&self, user_id: &str) -> Result<Option<UserSession>, DealError> {
        Ok(dealbot_db::load_session(&self.pool, user_id).await?)
    }

    async fn save(&self, session: &UserSession) -> Result<(), DealError> {
        Ok(dealbot_db::save_session(&self.pool, session).await?)
    }
}

pub struct SessionManager {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<UserSession>>>>,
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            store,
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStore::new()))
    }

    /// Acquire `user_id`'s session, restoring the persisted snapshot on
    /// first use. Waits while another handler for the same user holds it.
    /// A failed restore starts a fresh session.
    pub async fn lock(&self, user_id: &str, now: DateTime<Utc>) -> SessionGuard {
        let slot = match self.slot(user_id) {
            Some(slot) => slot,
            None => {
                let restored = match self.store.load(user_id).await {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::warn!(user_id, error = %e, "session load failed, starting fresh");
                        None
                    }
                };
                self.insert_slot(
                    user_id,
                    restored.unwrap_or_else(|| UserSession::new(user_id, now)),
                )
            }
        };
        slot.lock_owned().await
    }

    /// Write the guarded snapshot to the store.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn persist(&self, session: &UserSession) -> Result<(), DealError> {
        self.store.save(session).await
    }

    /// Drop in-process sessions idle for longer than `idle`. Sessions
    /// currently held are kept.
    pub fn evict_idle(&self, now: DateTime<Utc>, idle: Duration) -> usize {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let before = slots.len();
        // A slot cloned by `lock` but not yet acquired has a second owner.
        slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(session) => now - session.last_updated <= idle,
                Err(_) => true,
            }
        });
        before - slots.len()
    }

    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Another task may have inserted the slot while we loaded; theirs wins.
    fn insert_slot(&self, user_id: &str, session: UserSession) -> Arc<AsyncMutex<UserSession>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            slots
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(session))),
        )
    }

    fn slot(&self, user_id: &str) -> Option<Arc<AsyncMutex<UserSession>>> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
    }
}
