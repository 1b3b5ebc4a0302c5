use std::{collections::HashMap, sync::Arc};

use jiff::{SignedDuration, Timestamp};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::models::ChatTurn;

pub const SESSION_COOKIE: &str = "cinegraph_session";

/// Matches the session cookie's max-age.
pub const SESSION_IDLE_HOURS: i64 = 24;

// older turns are dropped so prompts stay bounded
const MAX_TURNS: usize = 20;
const MAX_SESSIONS: usize = 10_000;

struct Session {
    turns: Vec<ChatTurn>,
    last_seen: Timestamp,
}

/// Chat history per browser session, kept in process memory.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
    idle_ttl: SignedDuration,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(SignedDuration::from_hours(SESSION_IDLE_HOURS), MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(idle_ttl: SignedDuration, max_sessions: usize) -> Self {
        Self { sessions: Arc::default(), idle_ttl, max_sessions: max_sessions.max(1) }
    }

    pub fn new_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }

    pub async fn history(&self, id: &str) -> Vec<ChatTurn> {
        self.history_at(id, Timestamp::now()).await
    }

    pub async fn push(&self, id: &str, turn: ChatTurn) {
        self.push_at(id, turn, Timestamp::now()).await
    }

    pub async fn clear(&self, id: &str) {
        self.sessions.lock().await.remove(id);
    }

    fn is_idle(&self, session: &Session, now: Timestamp) -> bool {
        now.duration_since(session.last_seen) > self.idle_ttl
    }

    async fn history_at(&self, id: &str, now: Timestamp) -> Vec<ChatTurn> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(id)
            .filter(|s| !self.is_idle(s, now))
            .map(|s| s.turns.clone())
            .unwrap_or_default()
    }

    async fn push_at(&self, id: &str, turn: ChatTurn, now: Timestamp) {
        let mut sessions = self.sessions.lock().await;

        let before = sessions.len();
        sessions.retain(|_, s| !self.is_idle(s, now));
        if sessions.len() < before {
            debug!(evicted = before - sessions.len(), "dropped idle chat sessions");
        }

        if !sessions.contains_key(id) && sessions.len() >= self.max_sessions {
            let oldest = sessions.iter().min_by_key(|(_, s)| s.last_seen).map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                sessions.remove(&oldest);
                debug!("session limit reached, dropped least recently used");
            }
        }

        let session = sessions
            .entry(id.to_string())
            .or_insert_with(|| Session { turns: Vec::new(), last_seen: now });
        session.last_seen = now;
        session.turns.push(turn);
        if session.turns.len() > MAX_TURNS {
            let excess = session.turns.len() - MAX_TURNS;
            session.turns.drain(..excess);
        }
    }
}
