// src/crypto/envelope.rs
//! AES-256-GCM envelope keyed by a completed key exchange.
//!
//! The tag is kept separate from the ciphertext because browser clients
//! split WebCrypto output into `encrypted` and `authTag` fields before
//! sending it. No associated data is bound.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use generic_array::GenericArray;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::debug;
use zeroize::Zeroize;

use crate::config::constants::{NONCE_SIZE, TAG_SIZE};
use crate::crypto::dh::DerivedKey;
use crate::protocol::EncryptedPayload;
use crate::types::{CoreError, Result};

/// One AEAD output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    pub ciphertext: Vec<u8>,
    pub iv: [u8; NONCE_SIZE],
    pub tag: [u8; TAG_SIZE],
}

impl EncryptedEnvelope {
    /// Decode the hex wire form, checking nonce and tag sizes
    pub fn from_payload(payload: &EncryptedPayload) -> Result<Self> {
        let ciphertext = decode_field("encrypted", &payload.encrypted)?;
        let iv = decode_field("iv", &payload.iv)?;
        let tag = decode_field("authTag", &payload.auth_tag)?;

        let iv: [u8; NONCE_SIZE] = iv.as_slice().try_into().map_err(|_| {
            CoreError::MalformedExchange(format!("iv length {} (expected {})", iv.len(), NONCE_SIZE))
        })?;
        let tag: [u8; TAG_SIZE] = tag.as_slice().try_into().map_err(|_| {
            CoreError::MalformedExchange(format!("tag length {} (expected {})", tag.len(), TAG_SIZE))
        })?;

        Ok(Self { ciphertext, iv, tag })
    }

    /// Encode to the hex wire form
    pub fn to_payload(&self) -> EncryptedPayload {
        EncryptedPayload {
            encrypted: hex::encode(&self.ciphertext),
            iv: hex::encode(self.iv),
            auth_tag: hex::encode(self.tag),
        }
    }
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value).map_err(|e| CoreError::MalformedExchange(format!("{} is not hex: {}", name, e)))
}

/// AES-256-GCM bound to one derived key
pub struct EnvelopeCipher {
    cipher: Aes256Gcm,
}

impl EnvelopeCipher {
    pub fn new(key: &DerivedKey) -> Self {
        let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
        Self { cipher }
    }

    /// Encrypt under a fresh random nonce
    pub fn seal(&self, plaintext: &[u8]) -> Result<EncryptedEnvelope> {
        let mut iv = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut iv);

        let mut buffer = plaintext.to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut buffer)
            .map_err(|e| CoreError::Internal(format!("AES-GCM encryption failed: {}", e)))?;

        let mut tag_bytes = [0u8; TAG_SIZE];
        tag_bytes.copy_from_slice(&tag);

        Ok(EncryptedEnvelope {
            ciphertext: buffer,
            iv,
            tag: tag_bytes,
        })
    }

    /// Verify and decrypt. Nothing is returned unless the tag verifies.
    pub fn open(&self, envelope: &EncryptedEnvelope) -> Result<Vec<u8>> {
        let mut buffer = envelope.ciphertext.clone();
        let result = self.cipher.decrypt_in_place_detached(
            Nonce::from_slice(&envelope.iv),
            b"",
            &mut buffer,
            GenericArray::from_slice(&envelope.tag),
        );

        match result {
            Ok(()) => Ok(buffer),
            Err(_) => {
                buffer.zeroize();
                debug!("AES-GCM tag verification failed");
                Err(CoreError::AuthenticationFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::constants::DERIVED_KEY_SIZE;
    use quickcheck::quickcheck;

    fn test_key(fill: u8) -> DerivedKey {
        DerivedKey::from_bytes([fill; DERIVED_KEY_SIZE])
    }

    #[test]
    fn test_key_schedule_wiped_on_drop() {
        fn wiped_on_drop<T: zeroize::ZeroizeOnDrop>() {}
        wiped_on_drop::<aes_gcm::aes::Aes256>();
    }

    #[test]
    fn test_seal_open_empty() {
        let cipher = EnvelopeCipher::new(&test_key(7));
        let envelope = cipher.seal(b"").unwrap();
        assert!(envelope.ciphertext.is_empty());
        assert_eq!(cipher.open(&envelope).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let cipher = EnvelopeCipher::new(&test_key(7));
        let a = cipher.seal(b"same").unwrap();
        let b = cipher.seal(b"same").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_wrong_key_fails() {
        let envelope = EnvelopeCipher::new(&test_key(1)).seal(b"hello").unwrap();
        let result = EnvelopeCipher::new(&test_key(2)).open(&envelope);
        assert!(matches!(result, Err(CoreError::AuthenticationFailed)));
    }

    #[test]
    fn test_any_flipped_bit_fails() {
        let cipher = EnvelopeCipher::new(&test_key(9));
        let envelope = cipher.seal(b"{\"username\":\"alice\"}").unwrap();

        for byte in 0..envelope.ciphertext.len() {
            for bit in 0..8 {
                let mut tampered = envelope.clone();
                tampered.ciphertext[byte] ^= 1 << bit;
                assert!(matches!(cipher.open(&tampered), Err(CoreError::AuthenticationFailed)));
            }
        }
        for byte in 0..NONCE_SIZE {
            for bit in 0..8 {
                let mut tampered = envelope.clone();
                tampered.iv[byte] ^= 1 << bit;
                assert!(matches!(cipher.open(&tampered), Err(CoreError::AuthenticationFailed)));
            }
        }
        for byte in 0..TAG_SIZE {
            for bit in 0..8 {
                let mut tampered = envelope.clone();
                tampered.tag[byte] ^= 1 << bit;
                assert!(matches!(cipher.open(&tampered), Err(CoreError::AuthenticationFailed)));
            }
        }
    }

    #[test]
    fn test_payload_wire_form() {
        let cipher = EnvelopeCipher::new(&test_key(3));
        let envelope = cipher.seal(b"payload").unwrap();
        let payload = envelope.to_payload();

        assert_eq!(payload.iv.len(), NONCE_SIZE * 2);
        assert_eq!(payload.auth_tag.len(), TAG_SIZE * 2);
        assert_eq!(EncryptedEnvelope::from_payload(&payload).unwrap(), envelope);
    }

    #[test]
    fn test_payload_rejects_bad_fields() {
        let good = EnvelopeCipher::new(&test_key(3)).seal(b"x").unwrap().to_payload();

        let mut short_iv = good.clone();
        short_iv.iv = "00".repeat(8);
        assert!(matches!(
            EncryptedEnvelope::from_payload(&short_iv),
            Err(CoreError::MalformedExchange(_))
        ));

        let mut long_tag = good.clone();
        long_tag.auth_tag = "00".repeat(17);
        assert!(EncryptedEnvelope::from_payload(&long_tag).is_err());

        let mut not_hex = good;
        not_hex.encrypted = "xyz".to_string();
        assert!(EncryptedEnvelope::from_payload(&not_hex).is_err());
    }

    quickcheck! {
        fn prop_seal_open(data: Vec<u8>, fill: u8) -> bool {
            let cipher = EnvelopeCipher::new(&test_key(fill));
            let envelope = cipher.seal(&data).unwrap();
            cipher.open(&envelope).unwrap() == data
        }
    }
}
