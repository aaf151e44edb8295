//! In-memory session registry.
//!
//! Maps session ids to conversation histories. The map lock makes
//! create-if-absent atomic, so concurrent first-requests for one id observe
//! exactly one session. Callers hold the returned session's own mutex across
//! the provider call and the history append, which serializes requests that
//! share a session.
//!
//! The store is bounded: sessions idle past the configured TTL are dropped,
//! and once `max_sessions` is reached the least-recently-used entry makes
//! room for the next insert.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use nexus_common::SessionConfig;

use crate::provider::ChatTurn;

/// Shared handle to one conversation.
pub type SessionHandle = Arc<Mutex<Session>>;

/// One conversation's accumulated history.
#[derive(Debug, Default)]
pub struct Session {
    turns: Vec<ChatTurn>,
}

impl Session {
    /// History so far, oldest first.
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Record a completed user/model exchange.
    pub fn push_exchange(&mut self, user_text: impl Into<String>, reply_text: impl Into<String>) {
        self.turns.push(ChatTurn::user(user_text));
        self.turns.push(ChatTurn::model(reply_text));
    }
}

struct SessionEntry {
    handle: SessionHandle,
    last_active: Instant,
}

/// Bounded, process-lifetime session registry.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    max_sessions: usize,
    idle_ttl: Duration,
}

impl SessionStore {
    /// Create an empty store from configuration.
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_sessions: config.max_sessions,
            idle_ttl: Duration::from_secs(config.idle_ttl_secs),
        }
    }

    /// Fetch the session for `id`, creating it on first access.
    ///
    /// Runs eviction first: idle sessions past the TTL are dropped, and if
    /// the store is full the least-recently-used entry is removed. Both
    /// happen under the map lock, as does the create-if-absent step.
    pub async fn get_or_create(&self, id: &str) -> SessionHandle {
        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();

        sessions.retain(|_, entry| now.duration_since(entry.last_active) < self.idle_ttl);

        if let Some(entry) = sessions.get_mut(id) {
            entry.last_active = now;
            return Arc::clone(&entry.handle);
        }

        if sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_active)
                .map(|(key, _)| key.clone());
            if let Some(key) = oldest {
                sessions.remove(&key);
                tracing::debug!(session_id = %key, "Evicted least-recently-used session");
            }
        }

        let handle: SessionHandle = Arc::new(Mutex::new(Session::default()));
        sessions.insert(
            id.to_string(),
            SessionEntry {
                handle: Arc::clone(&handle),
                last_active: now,
            },
        );
        tracing::debug!(session_id = %id, total = sessions.len(), "Created session");

        handle
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Whether the store holds no sessions.
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
