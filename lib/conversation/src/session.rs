//! Conversation session management.
//!
//! Sessions hold the ordered turn history that is the model's only memory.
//! Turns are append-only. Retention is bounded by an idle TTL and a maximum
//! session count; the least recently used session that nobody holds the lock
//! for is evicted to make room.

use crate::error::SessionError;
use crate::locks::KeyedLocks;
use crate::message::{Turn, TurnRole};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use skycast_core::{Result, SessionId};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

const TITLE_CHARS: usize = 50;

/// A conversation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub id: SessionId,
    /// Turns in conversation order.
    pub turns: Vec<Turn>,
    /// Auxiliary per-session collections, currently unused by the core.
    #[serde(default)]
    pub collections: BTreeMap<String, JsonValue>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last active.
    pub last_active_at: DateTime<Utc>,
    /// Title derived from the first user turn.
    pub title: Option<String>,
}

impl Session {
    /// Creates an empty session.
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            turns: Vec::new(),
            collections: BTreeMap::new(),
            created_at: now,
            last_active_at: now,
            title: None,
        }
    }

    /// Appends turns in order.
    pub fn extend(&mut self, turns: impl IntoIterator<Item = Turn>) {
        self.turns.extend(turns);
        self.last_active_at = Utc::now();
        self.generate_title();
    }

    /// Returns the number of turns.
    #[must_use]
    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// Summary for listings.
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            title: self.title.clone(),
            created_at: self.created_at,
            last_active_at: self.last_active_at,
            turn_count: self.turns.len(),
        }
    }

    fn generate_title(&mut self) {
        if self.title.is_some() {
            return;
        }

        let Some(first) = self.turns.iter().find(|turn| turn.role == TurnRole::User) else {
            return;
        };

        let mut title: String = first.content.chars().take(TITLE_CHARS).collect();
        if first.content.chars().nth(TITLE_CHARS).is_some() {
            title.push_str("...");
        }
        self.title = Some(title);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// A session without its turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session identifier.
    pub id: SessionId,
    /// Session title, once a user turn exists.
    pub title: Option<String>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last active.
    pub last_active_at: DateTime<Utc>,
    /// Number of turns.
    pub turn_count: usize,
}

/// Session retention settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Sessions idle for longer than this are expired.
    #[serde(default = "default_idle_ttl_minutes")]
    pub idle_ttl_minutes: u64,

    /// Upper bound on live sessions.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// How often expired sessions are purged.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,
}

fn default_idle_ttl_minutes() -> u64 {
    24 * 60
}

fn default_max_sessions() -> usize {
    10_000
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_minutes: default_idle_ttl_minutes(),
            max_sessions: default_max_sessions(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
        }
    }
}

impl SessionConfig {
    /// Idle time after which a session expires.
    #[must_use]
    pub fn idle_ttl(&self) -> TimeDelta {
        let minutes = i64::try_from(self.idle_ttl_minutes).unwrap_or(i64::MAX);
        TimeDelta::try_minutes(minutes).unwrap_or(TimeDelta::MAX)
    }

    /// Interval between purges.
    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds.max(1))
    }
}

/// Storage for session histories.
///
/// Callers that read a history and append to it hold [`SessionStore::lock`]
/// across those steps; each other call is atomic on its own.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the history of `id`, or allocates a fresh empty session when
    /// `id` is absent, unknown or expired.
    async fn get_or_create(
        &self,
        id: Option<SessionId>,
    ) -> Result<(SessionId, Vec<Turn>), SessionError>;

    /// Waits for exclusive use of a session.
    ///
    /// A session is neither evicted nor purged while its guard is alive.
    async fn lock(&self, id: SessionId) -> OwnedMutexGuard<()>;

    /// Appends turns to the end of a session's history.
    async fn append(&self, id: SessionId, turns: Vec<Turn>) -> Result<(), SessionError>;

    /// Returns the history of a session.
    async fn history(&self, id: SessionId) -> Result<Vec<Turn>, SessionError>;

    /// Gets a session by ID.
    async fn get(&self, id: SessionId) -> Result<Session, SessionError>;

    /// Lists live sessions, most recently active first.
    async fn list(&self) -> Result<Vec<SessionSummary>, SessionError>;

    /// Deletes a session.
    async fn remove(&self, id: SessionId) -> Result<(), SessionError>;

    /// Drops expired sessions and returns how many were removed.
    async fn purge_expired(&self) -> Result<usize, SessionError>;
}

/// Process-local [`SessionStore`].
///
/// Sessions live in an LRU cache ordered by use: creating, continuing and
/// appending to a session make it the most recent. The cache is unbounded
/// and `max_sessions` is enforced on create, so that locked sessions can be
/// passed over.
#[derive(Debug)]
pub struct InMemorySessionStore {
    sessions: Mutex<LruCache<SessionId, Session>>,
    locks: KeyedLocks<SessionId>,
    idle_ttl: TimeDelta,
    max_sessions: usize,
}

impl InMemorySessionStore {
    /// Creates a store with the given retention settings.
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: Mutex::new(LruCache::unbounded()),
            locks: KeyedLocks::new(),
            idle_ttl: config.idle_ttl(),
            max_sessions: config.max_sessions.max(1),
        }
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(session.last_active_at) > self.idle_ttl
    }

    /// Evicts least recently used sessions until one more fits, skipping
    /// locked ones.
    fn make_room(&self, sessions: &mut LruCache<SessionId, Session>) {
        while sessions.len() >= self.max_sessions {
            let victim = sessions
                .iter()
                .rev()
                .map(|(id, _)| *id)
                .find(|id| !self.locks.is_locked(id));
            let Some(victim) = victim else {
                warn!(
                    sessions = sessions.len(),
                    max_sessions = self.max_sessions,
                    "every session is busy, exceeding the session limit"
                );
                return;
            };
            sessions.pop(&victim);
            info!(session_id = %victim, "evicted least recently used session");
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(
        &self,
        id: Option<SessionId>,
    ) -> Result<(SessionId, Vec<Turn>), SessionError> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;

        if let Some(id) = id {
            let expired = match sessions.get_mut(&id) {
                Some(session) if !self.is_expired(session, now) => {
                    session.last_active_at = now;
                    return Ok((id, session.turns.clone()));
                }
                Some(_) => true,
                None => false,
            };
            if expired {
                debug!(session_id = %id, "session expired, starting a new one");
                sessions.pop(&id);
            } else {
                debug!(session_id = %id, "unknown session, starting a new one");
            }
        }

        self.make_room(&mut sessions);

        let session = Session::new();
        let id = session.id;
        sessions.put(id, session);
        info!(session_id = %id, "created session");
        Ok((id, Vec::new()))
    }

    async fn lock(&self, id: SessionId) -> OwnedMutexGuard<()> {
        self.locks.lock(&id).await
    }

    async fn append(&self, id: SessionId, turns: Vec<Turn>) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(&id)
            .ok_or(SessionError::NotFound { id })?;
        session.extend(turns);
        Ok(())
    }

    async fn history(&self, id: SessionId) -> Result<Vec<Turn>, SessionError> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        sessions
            .get(&id)
            .filter(|session| !self.is_expired(session, now))
            .map(|session| session.turns.clone())
            .ok_or_else(|| SessionError::NotFound { id }.into())
    }

    async fn get(&self, id: SessionId) -> Result<Session, SessionError> {
        let now = Utc::now();
        let sessions = self.sessions.lock().await;
        sessions
            .peek(&id)
            .filter(|session| !self.is_expired(session, now))
            .cloned()
            .ok_or_else(|| SessionError::NotFound { id }.into())
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, SessionError> {
        let now = Utc::now();
        let sessions = self.sessions.lock().await;
        let mut summaries: Vec<_> = sessions
            .iter()
            .map(|(_, session)| session)
            .filter(|session| !self.is_expired(session, now))
            .map(Session::summary)
            .collect();
        summaries.sort_by(|a, b| b.last_active_at.cmp(&a.last_active_at));
        Ok(summaries)
    }

    async fn remove(&self, id: SessionId) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .pop(&id)
            .map(|_| ())
            .ok_or_else(|| SessionError::NotFound { id }.into())
    }

    async fn purge_expired(&self) -> Result<usize, SessionError> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        let expired: Vec<SessionId> = sessions
            .iter()
            .filter(|(id, session)| self.is_expired(session, now) && !self.locks.is_locked(id))
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            sessions.pop(id);
        }
        if !expired.is_empty() {
            info!(purged = expired.len(), "purged expired sessions");
        }
        Ok(expired.len())
    }
}
