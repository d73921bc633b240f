//! Bounded conversational memory for the chat assistant.
//!
//! One [`SessionStore`] serves the whole process; each open chat window owns
//! exactly one session, created on `open` and discarded on `close`.  A
//! session retains at most [`MAX_PAIRS`] user/assistant pairs — appending
//! beyond that evicts the oldest complete pair, never half of one.
//!
//! Sessions are memory-only and never persisted.  Ids are random UUIDs, so
//! a reply that arrives after its window closed cannot be applied to any
//! later session: the id no longer exists and `append` fails cleanly.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Maximum retained user/assistant pairs per session.
pub const MAX_PAIRS: usize = 10;

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

/// Session store failures.
#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    /// The session id is unknown — either never opened or already closed.
    #[error("unknown or closed session")]
    UnknownSession,
}

// ---------------------------------------------------------------------------
// SessionId / MessageTurn
// ---------------------------------------------------------------------------

/// Opaque handle for one open chat window's memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

/// One message within a session.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageTurn {
    pub role: TurnRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl MessageTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

/// Holds every open session's turn history behind one mutex.
///
/// The mutex serializes appends per session id (and across sessions, which
/// is harmless — appends are in-memory pushes).  No lock is ever held
/// across an await point.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, VecDeque<MessageTurn>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh empty session and return its id.
    pub fn open(&self) -> SessionId {
        let id = SessionId(Uuid::new_v4());
        self.lock().insert(id, VecDeque::with_capacity(MAX_PAIRS * 2));
        log::debug!("session {id}: opened");
        id
    }

    /// Discard a session and all its turns.
    ///
    /// Closing an already-closed session is a no-op: the window is gone
    /// either way.
    pub fn close(&self, id: SessionId) {
        if self.lock().remove(&id).is_some() {
            log::debug!("session {id}: closed");
        }
    }

    /// Append a turn, evicting the oldest pair when the window overflows.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownSession`] when `id` was never opened or has
    /// been closed — the caller must drop the turn, not re-home it.
    pub fn append(&self, id: SessionId, turn: MessageTurn) -> Result<(), SessionError> {
        let mut sessions = self.lock();
        let turns = sessions.get_mut(&id).ok_or(SessionError::UnknownSession)?;

        turns.push_back(turn);

        // Evict whole pairs from the front.  Turns alternate user/assistant,
        // so removing two front entries always removes one complete pair.
        while turns.len() > MAX_PAIRS * 2 {
            turns.pop_front();
            turns.pop_front();
        }
        Ok(())
    }

    /// Ordered copy of the retained turns, oldest first.  Read-only.
    pub fn snapshot(&self, id: SessionId) -> Result<Vec<MessageTurn>, SessionError> {
        let sessions = self.lock();
        let turns = sessions.get(&id).ok_or(SessionError::UnknownSession)?;
        Ok(turns.iter().cloned().collect())
    }

    /// Number of turns currently retained in a session.
    pub fn len(&self, id: SessionId) -> Result<usize, SessionError> {
        let sessions = self.lock();
        sessions
            .get(&id)
            .map(VecDeque::len)
            .ok_or(SessionError::UnknownSession)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, VecDeque<MessageTurn>>> {
        // A poisoned lock means another thread panicked mid-push; the map
        // itself is still structurally sound, so keep serving.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
