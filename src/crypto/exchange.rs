// src/crypto/exchange.rs
//! Ephemeral Diffie-Hellman key exchange.
//!
//! Each `init_exchange` call creates a fresh server key pair and parks the
//! private scalar under a random exchange id. The first successful
//! `complete_exchange` consumes it; a replay of the same id finds nothing.

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::constants::EXCHANGE_ID_BYTES;
use crate::crypto::dh::{DerivedKey, DhKeyPair, DhParams, DH_PARAMS};
use crate::protocol::KeyExchangeResponse;
use crate::store::{Expiring, RecordStore};
use crate::types::{CoreError, Result};
use crate::utils::{self, clock::add_duration, Clock};

/// Server half of an exchange awaiting the client's public key
#[derive(Clone)]
pub struct PendingExchange {
    pub exchange_id: String,
    pub server_private_key: BigUint,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Expiring for PendingExchange {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    // Valid through the full TTL; stale only once strictly past it
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

impl fmt::Debug for PendingExchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingExchange")
            .field("exchange_id", &utils::redact(&self.exchange_id))
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Issues and completes key exchanges
pub struct KeyExchangeService {
    store: Arc<dyn RecordStore<PendingExchange>>,
    params: DhParams,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    max_pending: usize,
}

impl KeyExchangeService {
    /// Create a service over the RFC 3526 group
    pub fn new(
        store: Arc<dyn RecordStore<PendingExchange>>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        max_pending: usize,
    ) -> Self {
        Self::with_params(store, DH_PARAMS.clone(), clock, ttl, max_pending)
    }

    pub fn with_params(
        store: Arc<dyn RecordStore<PendingExchange>>,
        params: DhParams,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        max_pending: usize,
    ) -> Self {
        Self {
            store,
            params,
            clock,
            ttl,
            max_pending,
        }
    }

    pub fn params(&self) -> &DhParams {
        &self.params
    }

    /// Start a new exchange and return the public parameters
    pub fn init_exchange(&self) -> Result<KeyExchangeResponse> {
        if self.store.len() >= self.max_pending {
            // Reclaim expired entries before refusing
            self.cleanup_expired();

            if self.store.len() >= self.max_pending {
                warn!("Pending key exchange limit reached ({})", self.max_pending);
                return Err(CoreError::Internal("too many pending key exchanges".to_string()));
            }
        }

        let key_pair = DhKeyPair::generate(&self.params);
        let exchange_id = utils::random_token_hex(EXCHANGE_ID_BYTES);
        let now = self.clock.now();

        let response = KeyExchangeResponse {
            exchange_id: exchange_id.clone(),
            server_public_key: key_pair.public_key_hex(),
            p: self.params.p_hex(),
            g: self.params.g_decimal(),
        };

        self.store.put(
            &exchange_id,
            PendingExchange {
                exchange_id: exchange_id.clone(),
                server_private_key: key_pair.private_key,
                created_at: now,
                expires_at: add_duration(now, self.ttl),
            },
        );

        debug!("Initiated key exchange {}", utils::redact(&exchange_id));
        Ok(response)
    }

    /// Consume a pending exchange and derive the shared key.
    ///
    /// A malformed client key is rejected before the exchange is touched,
    /// so the client may retry with the same id. An expired exchange is
    /// evicted by the lookup itself.
    pub fn complete_exchange(&self, exchange_id: &str, client_public_key_hex: &str) -> Result<DerivedKey> {
        let client_public = self.params.parse_public_key_hex(client_public_key_hex)?;

        let pending = self
            .store
            .take_if(exchange_id, &|_: &PendingExchange| true)
            .ok_or_else(|| {
                debug!("Key exchange {} not found", utils::redact(exchange_id));
                CoreError::ExchangeNotFound
            })?;

        let now = self.clock.now();
        if pending.is_expired(now) {
            warn!("Key exchange {} expired", utils::redact(exchange_id));
            return Err(CoreError::ExchangeExpired);
        }

        let shared = self.params.shared_secret(&client_public, &pending.server_private_key);
        let key = self.params.derive_key(&shared);

        info!("Completed key exchange {}", utils::redact(exchange_id));
        Ok(key)
    }

    /// Number of stored exchanges, expired or not
    pub fn pending_count(&self) -> usize {
        self.store.len()
    }

    /// Drop expired exchanges
    pub fn cleanup_expired(&self) -> usize {
        let removed = self.store.sweep_expired(self.clock.now()).len();
        if removed > 0 {
            debug!("Cleaned up {} expired key exchanges", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::constants::test::TEST_EXCHANGE_TTL;
    use crate::store::MemoryStore;
    use crate::utils::ManualClock;

    fn service(clock: Arc<ManualClock>, max_pending: usize) -> KeyExchangeService {
        KeyExchangeService::new(
            Arc::new(MemoryStore::<PendingExchange>::new("key_exchanges")),
            clock,
            TEST_EXCHANGE_TTL,
            max_pending,
        )
    }

    #[test]
    fn test_agreement_between_services() {
        let clock = Arc::new(ManualClock::new());
        let a = service(clock.clone(), 10);
        let b = service(clock, 10);

        let init_a = a.init_exchange().unwrap();
        let init_b = b.init_exchange().unwrap();

        let key_a = a.complete_exchange(&init_a.exchange_id, &init_b.server_public_key).unwrap();
        let key_b = b.complete_exchange(&init_b.exchange_id, &init_a.server_public_key).unwrap();
        assert_eq!(key_a, key_b);
    }

    #[test]
    fn test_client_agreement() {
        let clock = Arc::new(ManualClock::new());
        let svc = service(clock, 10);
        let init = svc.init_exchange().unwrap();

        let params = svc.params().clone();
        let client = DhKeyPair::generate(&params);
        let server_public = params.parse_public_key_hex(&init.server_public_key).unwrap();
        let client_key = params.derive_key(&params.shared_secret(&server_public, &client.private_key));

        let server_key = svc.complete_exchange(&init.exchange_id, &client.public_key_hex()).unwrap();
        assert_eq!(client_key, server_key);
    }

    #[test]
    fn test_response_shape() {
        let svc = service(Arc::new(ManualClock::new()), 10);
        let init = svc.init_exchange().unwrap();

        assert_eq!(init.exchange_id.len(), EXCHANGE_ID_BYTES * 2);
        assert_eq!(init.g, "2");
        assert_eq!(init.p, DH_PARAMS.p_hex());
        assert!(!init.server_public_key.starts_with("0x"));
        assert_eq!(svc.pending_count(), 1);
    }

    #[test]
    fn test_replay_fails() {
        let svc = service(Arc::new(ManualClock::new()), 10);
        let init = svc.init_exchange().unwrap();
        let client = DhKeyPair::generate(svc.params());

        svc.complete_exchange(&init.exchange_id, &client.public_key_hex()).unwrap();
        let replay = svc.complete_exchange(&init.exchange_id, &client.public_key_hex());
        assert!(matches!(replay, Err(CoreError::ExchangeNotFound)));
    }

    #[test]
    fn test_unknown_exchange() {
        let svc = service(Arc::new(ManualClock::new()), 10);
        let client = DhKeyPair::generate(svc.params());
        let result = svc.complete_exchange("deadbeef", &client.public_key_hex());
        assert!(matches!(result, Err(CoreError::ExchangeNotFound)));
    }

    #[test]
    fn test_expired_exchange_is_evicted() {
        let clock = Arc::new(ManualClock::new());
        let svc = service(clock.clone(), 10);
        let init = svc.init_exchange().unwrap();
        let client = DhKeyPair::generate(svc.params());

        clock.advance(TEST_EXCHANGE_TTL + Duration::from_secs(1));
        let result = svc.complete_exchange(&init.exchange_id, &client.public_key_hex());
        assert!(matches!(result, Err(CoreError::ExchangeExpired)));
        assert_eq!(svc.pending_count(), 0);

        let again = svc.complete_exchange(&init.exchange_id, &client.public_key_hex());
        assert!(matches!(again, Err(CoreError::ExchangeNotFound)));
    }

    #[test]
    fn test_valid_at_exact_ttl() {
        let clock = Arc::new(ManualClock::new());
        let svc = service(clock.clone(), 10);
        let init = svc.init_exchange().unwrap();
        let client = DhKeyPair::generate(svc.params());

        clock.advance(TEST_EXCHANGE_TTL);
        assert!(svc.complete_exchange(&init.exchange_id, &client.public_key_hex()).is_ok());
    }

    #[test]
    fn test_malformed_key_does_not_consume() {
        let svc = service(Arc::new(ManualClock::new()), 10);
        let init = svc.init_exchange().unwrap();

        let bad = svc.complete_exchange(&init.exchange_id, "1");
        assert!(matches!(bad, Err(CoreError::MalformedExchange(_))));
        assert_eq!(svc.pending_count(), 1);
    }

    #[test]
    fn test_pending_limit() {
        let clock = Arc::new(ManualClock::new());
        let svc = service(clock.clone(), 2);
        svc.init_exchange().unwrap();
        svc.init_exchange().unwrap();
        assert!(matches!(svc.init_exchange(), Err(CoreError::Internal(_))));

        // Expired entries are reclaimed before refusing
        clock.advance(TEST_EXCHANGE_TTL + Duration::from_secs(1));
        assert!(svc.init_exchange().is_ok());
        assert_eq!(svc.pending_count(), 1);
    }

    #[test]
    fn test_cleanup_expired() {
        let clock = Arc::new(ManualClock::new());
        let svc = service(clock.clone(), 10);
        svc.init_exchange().unwrap();
        clock.advance(Duration::from_secs(2));
        svc.init_exchange().unwrap();

        clock.advance(TEST_EXCHANGE_TTL - Duration::from_secs(1));
        assert_eq!(svc.cleanup_expired(), 1);
        assert_eq!(svc.pending_count(), 1);
    }
}
