//! In-memory session store with TTL expiry and a capacity limit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::model::{NewSession, Session, SessionFilter, SessionUpdate};

/// Store tunables.
#[derive(Debug, Clone)]
pub struct SessionStoreConfig {
    /// TTL applied when a session is created without an explicit one.
    pub default_ttl: Duration,
    /// Maximum number of live sessions; enforced at creation time only.
    pub max_sessions: usize,
    /// Period of the background sweep started by `start_sweeper`.
    pub sweep_interval: std::time::Duration,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::hours(24),
            max_sessions: 1000,
            sweep_interval: std::time::Duration::from_secs(300),
        }
    }
}

/// Point-in-time counters for the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub active: usize,
    pub max_sessions: usize,
    pub created_total: u64,
    pub expired_total: u64,
}

/// Keyed, TTL-expiring session container.
///
/// Every mutation happens under a single write lock and never awaits, so a
/// read-modify-write on one id cannot interleave with another and lose an
/// update. Stored values are `Arc<Session>`; callers get snapshots, never
/// references into the map.
#[derive(Debug)]
pub struct SessionStore {
    config: SessionStoreConfig,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    created_total: AtomicU64,
    expired_total: AtomicU64,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionStoreConfig::default())
    }
}

impl SessionStore {
    pub fn new(config: SessionStoreConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            created_total: AtomicU64::new(0),
            expired_total: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SessionStoreConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Session>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Session>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a session with the default TTL. `id` defaults to a fresh uuid.
    pub fn create(&self, id: Option<&str>) -> SessionResult<Arc<Session>> {
        self.create_with(NewSession {
            id: id.map(str::to_string),
            ..Default::default()
        })
    }

    /// Create a session from explicit parameters.
    ///
    /// At capacity, expired entries are swept first; the call fails with
    /// [`SessionError::LimitExceeded`] only if that frees nothing.
    pub fn create_with(&self, params: NewSession) -> SessionResult<Arc<Session>> {
        let now = Utc::now();
        let id = params
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let ttl = params.ttl.unwrap_or(self.config.default_ttl);

        let mut sessions = self.write();

        if let Some(existing) = sessions.get(&id) {
            if !existing.is_expired_at(now) {
                return Err(SessionError::AlreadyExists(id));
            }
            sessions.remove(&id);
            self.expired_total.fetch_add(1, Ordering::Relaxed);
        }

        if sessions.len() >= self.config.max_sessions {
            let removed = self.retain_live(&mut sessions, now);
            debug!(removed, "forced sweep at session capacity");
            if sessions.len() >= self.config.max_sessions {
                warn!(
                    max_sessions = self.config.max_sessions,
                    "session limit reached"
                );
                return Err(SessionError::LimitExceeded {
                    max: self.config.max_sessions,
                });
            }
        }

        let mut session = Session::new(id.clone(), ttl, now);
        session.labels = params.labels;
        session.metadata = params.metadata;
        let session = Arc::new(session);
        sessions.insert(id.clone(), Arc::clone(&session));
        self.created_total.fetch_add(1, Ordering::Relaxed);

        info!(event = "session.created", session_id = %id, expires_at = %session.expires_at);
        Ok(session)
    }

    /// Fetch a live session. Expired entries are removed and reported absent.
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        let now = Utc::now();
        {
            let sessions = self.read();
            match sessions.get(id) {
                None => return None,
                Some(session) if !session.is_expired_at(now) => return Some(Arc::clone(session)),
                Some(_) => {}
            }
        }

        // Expired: re-check under the write lock, another caller may have
        // replaced it in between.
        let mut sessions = self.write();
        match sessions.get(id) {
            Some(session) if session.is_expired_at(now) => {
                sessions.remove(id);
                self.expired_total.fetch_add(1, Ordering::Relaxed);
                debug!(event = "session.expired", session_id = %id);
                None
            }
            other => other.cloned(),
        }
    }

    /// Return the live session with `id`, creating it when absent.
    pub fn get_or_create(&self, id: &str) -> SessionResult<Arc<Session>> {
        if let Some(session) = self.get(id) {
            return Ok(session);
        }
        match self.create(Some(id)) {
            // Lost a race with a concurrent creator.
            Err(SessionError::AlreadyExists(_)) => self
                .get(id)
                .ok_or_else(|| SessionError::NotFound(id.to_string())),
            other => other,
        }
    }

    /// Apply a partial update, producing and storing a new session value.
    pub fn update(&self, id: &str, update: SessionUpdate) -> SessionResult<Arc<Session>> {
        let now = Utc::now();
        let mut sessions = self.write();

        let current = match sessions.get(id) {
            Some(session) if !session.is_expired_at(now) => Arc::clone(session),
            Some(_) => {
                sessions.remove(id);
                self.expired_total.fetch_add(1, Ordering::Relaxed);
                return Err(SessionError::NotFound(id.to_string()));
            }
            None => return Err(SessionError::NotFound(id.to_string())),
        };

        let next = Arc::new(current.apply(update, now));
        sessions.insert(id.to_string(), Arc::clone(&next));
        debug!(
            event = "session.updated",
            session_id = %id,
            version = next.version,
            status = %next.status
        );
        Ok(next)
    }

    /// Remove a session. Returns whether anything was removed.
    pub fn delete(&self, id: &str) -> bool {
        let removed = self.write().remove(id).is_some();
        if removed {
            debug!(event = "session.deleted", session_id = %id);
        }
        removed
    }

    /// List live sessions matching `filter`, oldest first.
    pub fn list(&self, filter: &SessionFilter) -> Vec<Arc<Session>> {
        self.sweep_expired();
        let mut sessions: Vec<Arc<Session>> = self
            .read()
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        sessions
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every expired session. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.write();
        self.retain_live(&mut sessions, now)
    }

    fn retain_live(
        &self,
        sessions: &mut HashMap<String, Arc<Session>>,
        now: chrono::DateTime<Utc>,
    ) -> usize {
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired_at(now));
        let removed = before - sessions.len();
        if removed > 0 {
            self.expired_total
                .fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            active: self.len(),
            max_sessions: self.config.max_sessions,
            created_total: self.created_total.load(Ordering::Relaxed),
            expired_total: self.expired_total.load(Ordering::Relaxed),
        }
    }
}
