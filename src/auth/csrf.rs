// src/auth/csrf.rs
//! Single-use CSRF tokens scoped to a session.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::config::constants::CSRF_TOKEN_BYTES;
use crate::store::{Expiring, RecordStore};
use crate::types::{CoreError, Result};
use crate::utils::{self, clock::add_duration, logging::log_security_event, Clock};

/// Stored token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken {
    pub token: String,
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
}

impl CsrfToken {
    fn belongs_to(&self, session_id: &str) -> bool {
        self.session_id.as_bytes().ct_eq(session_id.as_bytes()).into()
    }
}

impl Expiring for CsrfToken {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// Issues, verifies and consumes CSRF tokens
pub struct CsrfTokenService {
    store: Arc<dyn RecordStore<CsrfToken>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl CsrfTokenService {
    pub fn new(store: Arc<dyn RecordStore<CsrfToken>>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    /// Issue a token for `session_id`
    pub fn issue(&self, session_id: &str) -> String {
        let token = utils::random_token_hex(CSRF_TOKEN_BYTES);
        let expires_at = add_duration(self.clock.now(), self.ttl);

        self.store.put(
            &token,
            CsrfToken {
                token: token.clone(),
                session_id: session_id.to_string(),
                expires_at,
            },
        );

        debug!("Issued CSRF token for session {}", utils::redact(session_id));
        token
    }

    /// True only for a live token issued to `session_id`
    pub fn verify(&self, token: &str, session_id: &str) -> bool {
        self.store
            .get_if_not_expired(token, self.clock.now())
            .map_or(false, |record| record.belongs_to(session_id))
    }

    /// Delete a token; returns whether it existed
    pub fn consume(&self, token: &str) -> bool {
        self.store.delete_if_present(token)
    }

    /// Verify and consume in one atomic step.
    ///
    /// A token presented with the wrong session is left in place so that a
    /// foreign request cannot burn the rightful owner's token.
    pub fn verify_and_consume(&self, token: Option<&str>, session_id: &str) -> Result<()> {
        let token = match token {
            Some(t) if !t.is_empty() => t,
            _ => {
                log_security_event("CSRF_MISSING", &format!("session {}", utils::redact(session_id)));
                return Err(CoreError::CsrfTokenMissing);
            }
        };

        let now = self.clock.now();
        let accepted = self
            .store
            .take_if(token, &|record: &CsrfToken| {
                !record.is_expired(now) && record.belongs_to(session_id)
            })
            .is_some();

        if accepted {
            Ok(())
        } else {
            log_security_event("CSRF_INVALID", &format!("session {}", utils::redact(session_id)));
            Err(CoreError::CsrfTokenInvalid)
        }
    }

    /// Delete every token of a session; returns how many were removed
    pub fn revoke_session(&self, session_id: &str) -> usize {
        self.store
            .remove_where(&|_: &str, record: &CsrfToken| record.session_id == session_id)
            .len()
    }

    /// Drop expired tokens
    pub fn sweep_expired(&self) -> usize {
        self.store.sweep_expired(self.clock.now()).len()
    }

    pub fn token_count(&self) -> usize {
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::utils::ManualClock;

    fn service(clock: Arc<ManualClock>) -> CsrfTokenService {
        CsrfTokenService::new(
            Arc::new(MemoryStore::<CsrfToken>::new("csrf_tokens")),
            clock,
            Duration::from_secs(3600),
        )
    }

    #[test]
    fn test_verify_then_consume() {
        let svc = service(Arc::new(ManualClock::new()));
        let token = svc.issue("session-s");

        assert!(svc.verify(&token, "session-s"));
        assert!(svc.consume(&token));
        assert!(!svc.verify(&token, "session-s"));
        assert!(!svc.consume(&token));
    }

    #[test]
    fn test_other_session_never_verifies() {
        let svc = service(Arc::new(ManualClock::new()));
        let token = svc.issue("session-s");

        assert!(!svc.verify(&token, "session-t"));
        assert!(matches!(
            svc.verify_and_consume(Some(&token), "session-t"),
            Err(CoreError::CsrfTokenInvalid)
        ));
        // Still usable by its owner
        assert!(svc.verify_and_consume(Some(&token), "session-s").is_ok());
    }

    #[test]
    fn test_verify_and_consume_is_single_use() {
        let svc = service(Arc::new(ManualClock::new()));
        let token = svc.issue("s");

        assert!(svc.verify_and_consume(Some(&token), "s").is_ok());
        assert!(matches!(
            svc.verify_and_consume(Some(&token), "s"),
            Err(CoreError::CsrfTokenInvalid)
        ));
    }

    #[test]
    fn test_missing_token() {
        let svc = service(Arc::new(ManualClock::new()));
        assert!(matches!(svc.verify_and_consume(None, "s"), Err(CoreError::CsrfTokenMissing)));
        assert!(matches!(svc.verify_and_consume(Some(""), "s"), Err(CoreError::CsrfTokenMissing)));
    }

    #[test]
    fn test_expired_token_fails_closed() {
        let clock = Arc::new(ManualClock::new());
        let svc = service(clock.clone());
        let token = svc.issue("s");

        clock.advance(Duration::from_secs(3601));
        assert!(!svc.verify(&token, "s"));
        assert!(svc.verify_and_consume(Some(&token), "s").is_err());
        assert_eq!(svc.sweep_expired(), 1);
        assert_eq!(svc.token_count(), 0);
    }

    #[test]
    fn test_revoke_session() {
        let svc = service(Arc::new(ManualClock::new()));
        svc.issue("a");
        svc.issue("a");
        let keep = svc.issue("b");

        assert_eq!(svc.revoke_session("a"), 2);
        assert_eq!(svc.token_count(), 1);
        assert!(svc.verify(&keep, "b"));
    }

    #[test]
    fn test_concurrent_consume_has_single_winner() {
        let svc = Arc::new(service(Arc::new(ManualClock::new())));
        let token = svc.issue("s");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let svc = svc.clone();
                let token = token.clone();
                std::thread::spawn(move || svc.verify_and_consume(Some(&token), "s").is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
    }
}
