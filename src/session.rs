// SPDX-License-Identifier: MIT

//! Per-browser-session state with an explicit lifecycle.
//!
//! The OAuth1 handshake spans two independent HTTP exchanges separated by a
//! redirect to the identity provider, so the request-token secret must
//! survive across requests in server-side session state (the provider does
//! not return it on callback). Auth state is a sum type with per-phase data
//! so contradictory combinations (authenticated without tokens, a pending
//! callback without a request-token pair) are unrepresentable.

use crate::models::ConversationTurn;
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Authentication phase with the credentials that phase requires.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// Fresh session, no handshake started.
    #[default]
    NotStarted,
    /// A request-token pair was issued and the user was sent to the provider;
    /// waiting for the callback redirect.
    AwaitingCallback {
        request_token: String,
        request_token_secret: String,
    },
    /// Handshake complete; access credentials validated at least once.
    Authenticated {
        access_token: String,
        access_token_secret: String,
        user_id: String,
    },
    /// Token exchange or validation failed; restart required.
    Error { message: String },
}

impl AuthState {
    /// Short phase name for logs and the session endpoint.
    pub fn phase(&self) -> &'static str {
        match self {
            AuthState::NotStarted => "not_started",
            AuthState::AwaitingCallback { .. } => "awaiting_callback",
            AuthState::Authenticated { .. } => "authenticated",
            AuthState::Error { .. } => "error",
        }
    }
}

/// One user's session: auth lifecycle plus the in-memory conversation log.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub auth: AuthState,
    /// Append-only within a session; replaced wholesale on load.
    pub conversation: Vec<ConversationTurn>,
}

impl Session {
    /// Authenticated user id, if the handshake has completed.
    pub fn user_id(&self) -> Option<&str> {
        match &self.auth {
            AuthState::Authenticated { user_id, .. } => Some(user_id),
            _ => None,
        }
    }

    /// Reset every field to its default, atomically. Used by logout and by
    /// reset-authentication; durable per-user state is not touched.
    pub fn clear(&mut self) {
        *self = Session::default();
    }
}

/// Map slot: the session itself plus its last-touch time for idle expiry.
struct SessionSlot {
    session: Arc<Mutex<Session>>,
    last_seen: Instant,
}

impl SessionSlot {
    fn new() -> Self {
        Self {
            session: Arc::new(Mutex::new(Session::default())),
            last_seen: Instant::now(),
        }
    }
}

/// Process-wide session map, keyed by an opaque random cookie id.
///
/// Each session sits behind its own async mutex: one active mutator per
/// session at a time, run-to-completion per request. The authenticated user
/// id is mirrored in a separate map, maintained outside the per-session
/// mutex, so the retention sweep's active set never depends on whether a
/// request currently holds a session lock.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, SessionSlot>>,
    /// session id -> authenticated user id
    authenticated: Arc<DashMap<String, String>>,
    rng: Arc<SystemRandom>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            authenticated: Arc::new(DashMap::new()),
            rng: Arc::new(SystemRandom::new()),
        }
    }

    /// Mint a fresh session id (128 bits, hex).
    pub fn new_session_id(&self) -> String {
        let mut bytes = [0u8; 16];
        // SystemRandom::fill only fails if the OS RNG is unavailable.
        self.rng
            .fill(&mut bytes)
            .expect("system random unavailable");
        hex::encode(bytes)
    }

    /// Fetch the session for an id, creating a default one on first touch
    /// and refreshing its last-seen time.
    pub fn get_or_create(&self, session_id: &str) -> Arc<Mutex<Session>> {
        let mut slot = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(SessionSlot::new);
        slot.last_seen = Instant::now();
        slot.session.clone()
    }

    /// Look up an existing session without creating one.
    pub fn get(&self, session_id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.get(session_id).map(|s| s.session.clone())
    }

    /// Drop a session entirely (logout).
    pub fn remove(&self, session_id: &str) {
        self.sessions.remove(session_id);
        self.authenticated.remove(session_id);
    }

    /// Mirror the session's current authenticated user into the active map.
    /// The session middleware calls this after every request, so the map
    /// tracks each auth transition without the sweep ever needing the
    /// session lock.
    pub fn note_auth(&self, session_id: &str, session: &Session) {
        match session.user_id() {
            Some(user_id) => {
                self.authenticated
                    .insert(session_id.to_string(), user_id.to_string());
            }
            None => {
                self.authenticated.remove(session_id);
            }
        }
    }

    /// User ids with a live authenticated session, for the sweep to skip.
    pub fn active_user_ids(&self) -> Vec<String> {
        self.authenticated
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Drop sessions idle longer than `ttl`. Returns the number removed.
    /// An in-flight request always has a fresh last-seen time, so it is
    /// never expired out from under the handler.
    pub fn expire_idle(&self, ttl: Duration) -> usize {
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().last_seen.elapsed() >= ttl)
            .map(|entry| entry.key().clone())
            .collect();
        for session_id in &expired {
            self.remove(session_id);
        }
        expired.len()
    }
}
