// src/client.rs
//! Client side of the secure channel.
//!
//! Mirrors what the browser does with an exchange response: pick a private
//! scalar, derive the shared key from the server's public value, and seal
//! a JSON body for the server. Used by the self-check command and tests.

use serde::Serialize;
use std::fmt;
use zeroize::Zeroizing;

use crate::crypto::dh::parse_digits;
use crate::crypto::{DerivedKey, DhKeyPair, DhParams, EncryptedEnvelope, EnvelopeCipher};
use crate::protocol::{Credentials, EncryptedPayload, KeyExchangeResponse, SealedCredentials};
use crate::types::{CoreError, Result};

/// Client state after receiving exchange parameters
pub struct ClientHandshake {
    exchange_id: String,
    client_public_key: String,
    cipher: EnvelopeCipher,
}

impl ClientHandshake {
    /// Generate a client key pair against the server's parameters
    pub fn from_response(response: &KeyExchangeResponse) -> Result<Self> {
        let p = parse_digits(&response.p, 16)
            .ok_or_else(|| CoreError::MalformedExchange("p is not hex".to_string()))?;
        let g = parse_digits(&response.g, 10)
            .ok_or_else(|| CoreError::MalformedExchange("g is not decimal".to_string()))?;
        if p.bits() < 3 {
            return Err(CoreError::MalformedExchange("p is too small".to_string()));
        }

        let params = DhParams::new(p, g);
        let server_public = params.parse_public_key_hex(&response.server_public_key)?;

        let key_pair = DhKeyPair::generate(&params);
        let key: DerivedKey = params.derive_key(&params.shared_secret(&server_public, &key_pair.private_key));

        Ok(Self {
            exchange_id: response.exchange_id.clone(),
            client_public_key: key_pair.public_key_hex(),
            cipher: EnvelopeCipher::new(&key),
        })
    }

    /// Seal any JSON-serializable body
    pub fn seal_json<T: Serialize>(&self, body: &T) -> Result<SealedCredentials> {
        let plaintext = Zeroizing::new(serde_json::to_vec(body)?);
        let envelope = self.cipher.seal(&plaintext)?;

        Ok(SealedCredentials {
            exchange_id: self.exchange_id.clone(),
            client_public_key: self.client_public_key.clone(),
            encrypted_data: envelope.to_payload(),
        })
    }

    pub fn seal_credentials(&self, credentials: &Credentials) -> Result<SealedCredentials> {
        self.seal_json(credentials)
    }

    /// Decrypt a payload the server sealed back under the exchange key
    pub fn open_response(&self, payload: &EncryptedPayload) -> Result<Vec<u8>> {
        let envelope = EncryptedEnvelope::from_payload(payload)?;
        self.cipher.open(&envelope)
    }

    pub fn exchange_id(&self) -> &str {
        &self.exchange_id
    }
}

impl fmt::Debug for ClientHandshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandshake")
            .field("exchange_id", &self.exchange_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{KeyExchangeService, PendingExchange};
    use crate::store::MemoryStore;
    use crate::utils::ManualClock;
    use std::sync::Arc;
    use std::time::Duration;

    fn service() -> KeyExchangeService {
        KeyExchangeService::new(
            Arc::new(MemoryStore::<PendingExchange>::new("key_exchanges")),
            Arc::new(ManualClock::new()),
            Duration::from_secs(300),
            10,
        )
    }

    #[test]
    fn test_sealed_json_recovered_by_server() {
        let svc = service();
        let init = svc.init_exchange().unwrap();
        let handshake = ClientHandshake::from_response(&init).unwrap();

        let sealed = handshake
            .seal_credentials(&Credentials::new("alice", "secret1"))
            .unwrap();
        assert_eq!(sealed.exchange_id, init.exchange_id);

        let key = svc
            .complete_exchange(&sealed.exchange_id, &sealed.client_public_key)
            .unwrap();
        let envelope = EncryptedEnvelope::from_payload(&sealed.encrypted_data).unwrap();
        let plaintext = EnvelopeCipher::new(&key).open(&envelope).unwrap();
        assert_eq!(plaintext, br#"{"username":"alice","password":"secret1"}"#.to_vec());
    }

    #[test]
    fn test_server_response_opened_by_client() {
        let svc = service();
        let init = svc.init_exchange().unwrap();
        let handshake = ClientHandshake::from_response(&init).unwrap();
        let sealed = handshake.seal_json(&serde_json::json!({"ping": 1})).unwrap();

        let key = svc
            .complete_exchange(&sealed.exchange_id, &sealed.client_public_key)
            .unwrap();
        let reply = EnvelopeCipher::new(&key).seal(b"pong").unwrap();
        assert_eq!(handshake.open_response(&reply.to_payload()).unwrap(), b"pong".to_vec());
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let init = service().init_exchange().unwrap();

        let mut bad_p = init.clone();
        bad_p.p = "not-hex".to_string();
        assert!(ClientHandshake::from_response(&bad_p).is_err());

        let mut signed_p = init.clone();
        signed_p.p = format!("+{}", init.p);
        assert!(matches!(
            ClientHandshake::from_response(&signed_p),
            Err(CoreError::MalformedExchange(_))
        ));

        let mut spaced_g = init.clone();
        spaced_g.g = " 2".to_string();
        assert!(ClientHandshake::from_response(&spaced_g).is_err());

        let mut bad_key = init;
        bad_key.server_public_key = "1".to_string();
        assert!(matches!(
            ClientHandshake::from_response(&bad_key),
            Err(CoreError::MalformedExchange(_))
        ));
    }
}
