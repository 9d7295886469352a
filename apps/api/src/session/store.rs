//! In-memory conversation cache with idle TTL and a bounded entry count.
//!
//! Expiry is lazy: an entry idle for longer than the TTL is dropped the next
//! time it is looked up, and expired entries are purged in bulk whenever the
//! store is at capacity. When still full, the least-recently-used live entry
//! is evicted to make room.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::session::models::{Message, Role, Session};

struct Entry {
    session: Session,
    touched: Instant,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<Uuid, Entry>,
    /// Caller-supplied ids that were unknown when first seen, mapped to the
    /// session allocated for them. Lets concurrent callers reusing the same
    /// stale id converge on a single new session.
    aliases: HashMap<Uuid, Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub active_sessions: usize,
    pub max_sessions: usize,
    pub ttl_seconds: u64,
}

pub struct SessionStore {
    inner: Mutex<Inner>,
    ttl: Duration,
    capacity: usize,
}

impl SessionStore {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Returns the live session for `id`, or allocates a new one with a fresh id.
    pub fn get_or_create(&self, id: Option<Uuid>) -> Session {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        if let Some(requested) = id {
            let resolved = inner.resolve(requested);
            if let Some(entry) = inner.live_mut(resolved, now, self.ttl) {
                entry.touched = now;
                entry.session.last_activity = Utc::now();
                return entry.session.clone();
            }
        }

        let session = Session::new();
        self.admit(&mut inner, session.clone(), now);
        if let Some(requested) = id {
            debug!(requested = %requested, allocated = %session.id, "Unknown session id, allocated new session");
            inner.aliases.insert(requested, session.id);
        }
        session
    }

    /// Appends a message and refreshes the session's activity timestamp.
    /// Returns false when the session has expired or been cleared meanwhile.
    pub fn append(&self, id: Uuid, role: Role, content: impl Into<String>) -> bool {
        self.push(id, Message::new(role, content))
    }

    /// Appends assistant text that was cut short, flagged as partial.
    pub fn append_partial(&self, id: Uuid, content: impl Into<String>) -> bool {
        self.push(id, Message::partial(Role::Assistant, content))
    }

    /// Most recent `max_messages` messages (all when `None`). Trimming happens
    /// here so the stored history stays complete.
    pub fn history(&self, id: Uuid, max_messages: Option<usize>) -> Vec<Message> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let resolved = inner.resolve(id);
        inner
            .live_mut(resolved, now, self.ttl)
            .map(|entry| entry.session.recent(max_messages))
            .unwrap_or_default()
    }

    /// Snapshot of a live session without refreshing it.
    pub fn get(&self, id: Uuid) -> Option<Session> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let resolved = inner.resolve(id);
        inner
            .live_mut(resolved, now, self.ttl)
            .map(|entry| entry.session.clone())
    }

    /// Evicts a session immediately, regardless of TTL.
    pub fn clear(&self, id: Uuid) -> bool {
        let mut inner = self.inner.lock();
        let resolved = inner.resolve(id);
        let removed = inner.entries.remove(&resolved).is_some();
        inner.aliases.retain(|_, target| *target != resolved);
        removed
    }

    pub fn count(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.purge_expired(now, self.ttl);
        inner.entries.len()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            active_sessions: self.count(),
            max_sessions: self.capacity,
            ttl_seconds: self.ttl.as_secs(),
        }
    }

    fn push(&self, id: Uuid, message: Message) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let resolved = inner.resolve(id);
        match inner.live_mut(resolved, now, self.ttl) {
            Some(entry) => {
                entry.touched = now;
                entry.session.last_activity = message.timestamp;
                entry.session.messages.push(message);
                true
            }
            None => {
                warn!(session_id = %id, "Dropping message for expired or cleared session");
                false
            }
        }
    }

    fn admit(&self, inner: &mut Inner, session: Session, now: Instant) {
        if inner.entries.len() >= self.capacity {
            inner.purge_expired(now, self.ttl);
        }
        while inner.entries.len() >= self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.touched)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    debug!(session_id = %id, "Session store full, evicting least recently used");
                    inner.entries.remove(&id);
                }
                None => break,
            }
        }
        inner.entries.insert(
            session.id,
            Entry {
                session,
                touched: now,
            },
        );
        let Inner { entries, aliases } = inner;
        aliases.retain(|_, target| entries.contains_key(target));
    }
}

impl Inner {
    fn resolve(&self, id: Uuid) -> Uuid {
        self.aliases.get(&id).copied().unwrap_or(id)
    }

    fn live_mut(&mut self, id: Uuid, now: Instant, ttl: Duration) -> Option<&mut Entry> {
        let expired = match self.entries.get(&id) {
            Some(entry) => now.duration_since(entry.touched) >= ttl,
            None => return None,
        };
        if expired {
            self.entries.remove(&id);
            return None;
        }
        self.entries.get_mut(&id)
    }

    fn purge_expired(&mut self, now: Instant, ttl: Duration) {
        self.entries
            .retain(|_, entry| now.duration_since(entry.touched) < ttl);
    }
}
