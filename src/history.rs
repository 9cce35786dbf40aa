//! Per-session conversation history.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// Sessions kept before the least recently used one is dropped.
pub const DEFAULT_MAX_SESSIONS: usize = 1000;

/// One question and its answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
}

/// Rolling window of the most recent exchanges.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    exchanges: VecDeque<Exchange>,
    max_exchanges: usize,
}

impl ConversationHistory {
    pub fn new(max_exchanges: usize) -> Self {
        Self {
            exchanges: VecDeque::with_capacity(max_exchanges),
            max_exchanges,
        }
    }

    /// Record an exchange, evicting the oldest past the limit.
    pub fn push(&mut self, user: &str, assistant: &str) {
        if self.max_exchanges == 0 {
            return;
        }
        self.exchanges.push_back(Exchange {
            user: user.to_string(),
            assistant: assistant.to_string(),
        });
        while self.exchanges.len() > self.max_exchanges {
            self.exchanges.pop_front();
        }
    }

    /// `User: ...` / `Assistant: ...` lines, oldest first. `None` when empty.
    pub fn snapshot(&self) -> Option<String> {
        if self.exchanges.is_empty() {
            return None;
        }
        let lines: Vec<String> = self
            .exchanges
            .iter()
            .flat_map(|e| [format!("User: {}", e.user), format!("Assistant: {}", e.assistant)])
            .collect();
        Some(lines.join("\n"))
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
    }
}

/// Handle to one session's history. Holding the lock serializes the
/// session's queries.
pub type SessionHandle = Arc<tokio::sync::Mutex<ConversationHistory>>;

struct SessionEntry {
    handle: SessionHandle,
    last_used: Instant,
}

/// All sessions, keyed by id. Past `max_sessions` the least recently used
/// session is forgotten.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    max_history: usize,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_history,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }

    /// Set the session cap (at least one).
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }

    /// Mint a new empty session.
    pub fn create_session(&self) -> String {
        let id = format!("session_{}", Uuid::new_v4());
        self.session(&id);
        id
    }

    /// Get a session, creating it on first use.
    pub fn session(&self, id: &str) -> SessionHandle {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        if let Some(entry) = sessions.get_mut(id) {
            entry.last_used = now;
            return entry.handle.clone();
        }

        while sessions.len() >= self.max_sessions {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            debug!("Evicting idle session {}", oldest);
            sessions.remove(&oldest);
        }

        let handle: SessionHandle =
            Arc::new(tokio::sync::Mutex::new(ConversationHistory::new(self.max_history)));
        sessions.insert(
            id.to_string(),
            SessionEntry {
                handle: handle.clone(),
                last_used: now,
            },
        );
        handle
    }

    /// Snapshot of a session's history without creating it.
    pub async fn history(&self, id: &str) -> Option<String> {
        let handle = {
            let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            sessions.get(id).map(|entry| entry.handle.clone())
        }?;
        let history = handle.lock().await;
        history.snapshot()
    }

    /// Forget a session. Returns whether it existed.
    pub fn clear_session(&self, id: &str) -> bool {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.remove(id).is_some()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_format() {
        let mut history = ConversationHistory::new(2);
        assert_eq!(history.snapshot(), None);

        history.push("What is MCP?", "A protocol.");
        assert_eq!(
            history.snapshot().unwrap(),
            "User: What is MCP?\nAssistant: A protocol."
        );
    }

    #[test]
    fn test_oldest_exchange_is_evicted() {
        let mut history = ConversationHistory::new(2);
        history.push("q1", "a1");
        history.push("q2", "a2");
        history.push("q3", "a3");

        assert_eq!(history.len(), 2);
        let snapshot = history.snapshot().unwrap();
        assert!(!snapshot.contains("q1"));
        assert!(snapshot.starts_with("User: q2"));
        assert!(snapshot.ends_with("Assistant: a3"));
    }

    #[test]
    fn test_zero_depth_keeps_nothing() {
        let mut history = ConversationHistory::new(0);
        history.push("q", "a");
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let store = SessionStore::new(2);
        let a = store.create_session();
        let b = store.create_session();
        assert!(a.starts_with("session_"));
        assert_ne!(a, b);

        store.session(&a).lock().await.push("hello", "hi");
        assert!(store.history(&a).await.unwrap().contains("hello"));
        assert_eq!(store.history(&b).await, None);

        assert!(store.clear_session(&a));
        assert!(!store.clear_session(&a));
        assert_eq!(store.history(&a).await, None);
    }

    #[tokio::test]
    async fn test_unknown_session_is_created_on_use() {
        let store = SessionStore::new(2);
        assert_eq!(store.session_count(), 0);
        store.session("custom").lock().await.push("q", "a");
        assert_eq!(store.session_count(), 1);
        assert!(store.history("custom").await.is_some());
    }

    #[tokio::test]
    async fn test_least_recently_used_session_is_evicted() {
        let store = SessionStore::new(2).with_max_sessions(2);
        store.session("a").lock().await.push("qa", "aa");
        std::thread::sleep(std::time::Duration::from_millis(2));
        store.session("b").lock().await.push("qb", "ab");
        std::thread::sleep(std::time::Duration::from_millis(2));

        // Touching "a" makes "b" the idle one.
        store.session("a");
        std::thread::sleep(std::time::Duration::from_millis(2));
        store.session("c");

        assert_eq!(store.session_count(), 2);
        assert!(store.history("a").await.is_some());
        assert_eq!(store.history("b").await, None);
    }

    #[test]
    fn test_sessionless_requests_stay_bounded() {
        let store = SessionStore::new(2).with_max_sessions(10);
        for _ in 0..100 {
            store.create_session();
        }
        assert_eq!(store.session_count(), 10);
    }
}
