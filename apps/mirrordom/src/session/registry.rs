use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use super::{Session, SharedSession};

const DEFAULT_MAX_SESSIONS: usize = 256;

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("session limit of {limit} reached")]
    Full { limit: usize },
}

/// Live mirroring sessions keyed by id. Cloning shares the registry.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<SessionRegistryInner>,
}

struct SessionRegistryInner {
    sessions: DashMap<Uuid, SharedSession>,
    config: SessionConfig,
    total_sessions: parking_lot::RwLock<usize>,
}

impl SessionRegistry {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(SessionRegistryInner {
                sessions: DashMap::new(),
                config,
                total_sessions: parking_lot::RwLock::new(0),
            }),
        }
    }

    /// Opens a new, empty session.
    pub fn create(&self) -> Result<(Uuid, SharedSession), RegistryError> {
        let mut total = self.inner.total_sessions.write();
        let limit = self.inner.config.max_sessions;
        if *total >= limit {
            return Err(RegistryError::Full { limit });
        }

        let session_id = Uuid::new_v4();
        let session = SharedSession::new(Session::new());
        self.inner.sessions.insert(session_id, session.clone());
        *total += 1;
        info!(session = %session_id, total = *total, "session created");
        Ok((session_id, session))
    }

    pub fn get(&self, session_id: &Uuid) -> Option<SharedSession> {
        self.inner
            .sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
    }

    /// Ends a session. Handles already given out keep working but the
    /// session can no longer be looked up.
    pub fn end(&self, session_id: &Uuid) -> bool {
        let mut total = self.inner.total_sessions.write();
        let removed = self.inner.sessions.remove(session_id).is_some();
        if removed {
            *total -= 1;
            debug!(session = %session_id, total = *total, "session ended");
        }
        removed
    }

    pub fn total_sessions(&self) -> usize {
        *self.inner.total_sessions.read()
    }

    pub fn session_ids(&self) -> Vec<Uuid> {
        self.inner.sessions.iter().map(|entry| *entry.key()).collect()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
