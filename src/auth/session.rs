// src/auth/session.rs
//! Server-side sessions with sliding expiration.
//!
//! A session moves from created to active, is refreshed on every
//! authenticated request, and ends either by logout or by passing its
//! expiry. An ended session never comes back: refresh only touches
//! sessions that are still live.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::auth::csrf::CsrfTokenService;
use crate::config::constants::SESSION_ID_BYTES;
use crate::store::{Expiring, RecordStore};
use crate::utils::{self, clock::add_duration, Clock};

/// Session record
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub user_id: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Expiring for Session {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &utils::redact(&self.id))
            .field("user_id", &self.user_id)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Session manager
pub struct SessionStore {
    store: Arc<dyn RecordStore<Session>>,
    csrf: Arc<CsrfTokenService>,
    clock: Arc<dyn Clock>,
    duration: Duration,
}

impl SessionStore {
    /// Create a session manager. Deleting a session also revokes its
    /// CSRF tokens through `csrf`.
    pub fn new(
        store: Arc<dyn RecordStore<Session>>,
        csrf: Arc<CsrfTokenService>,
        clock: Arc<dyn Clock>,
        duration: Duration,
    ) -> Self {
        Self {
            store,
            csrf,
            clock,
            duration,
        }
    }

    /// Open a session for `user_id` and return its identifier
    pub fn create(&self, user_id: u64) -> String {
        let id = utils::random_token_hex(SESSION_ID_BYTES);
        let now = self.clock.now();

        self.store.put(
            &id,
            Session {
                id: id.clone(),
                user_id,
                created_at: now,
                expires_at: add_duration(now, self.duration),
            },
        );

        info!("Created session {} for user {}", utils::redact(&id), user_id);
        id
    }

    /// Live session, if any. Expired rows are left for the sweeper.
    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.store.get_if_not_expired(session_id, self.clock.now())
    }

    /// Push expiry to `now + duration`; false if the session is gone
    pub fn refresh(&self, session_id: &str) -> bool {
        let now = self.clock.now();
        let expires_at = add_duration(now, self.duration);
        self.store
            .update_if_not_expired(session_id, now, &mut |session: &mut Session| {
                session.expires_at = expires_at;
            })
    }

    /// Remove a session and its CSRF tokens; idempotent
    pub fn delete(&self, session_id: &str) -> bool {
        let existed = self.store.delete_if_present(session_id);
        let revoked = self.csrf.revoke_session(session_id);
        if existed {
            info!(
                "Deleted session {} ({} CSRF tokens revoked)",
                utils::redact(session_id),
                revoked
            );
        }
        existed
    }

    /// Drop expired sessions along with their CSRF tokens
    pub fn sweep_expired(&self) -> usize {
        let removed = self.store.sweep_expired(self.clock.now());
        for session_id in &removed {
            self.csrf.revoke_session(session_id);
        }
        if !removed.is_empty() {
            debug!("Cleaned up {} expired sessions", removed.len());
        }
        removed.len()
    }

    pub fn session_count(&self) -> usize {
        self.store.len()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}
