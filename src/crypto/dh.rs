// src/crypto/dh.rs
//! Finite-field Diffie-Hellman over the RFC 3526 group 14.
//!
//! Public values travel as lowercase hex. The derived key is SHA-256 over
//! the shared secret encoded big-endian and left-padded with zeros to the
//! byte length of the prime, so browsers computing the same secret with
//! their own bigint code arrive at identical key bytes.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::constants::{DERIVED_KEY_SIZE, DH_GENERATOR, DH_PRIME_HEX, PRIVATE_KEY_BYTES};
use crate::crypto::modpow::mod_pow;
use crate::types::{CoreError, Result};

/// Process-wide group parameters
pub static DH_PARAMS: Lazy<DhParams> = Lazy::new(DhParams::rfc3526_group14);

/// Prime modulus and generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhParams {
    pub p: BigUint,
    pub g: BigUint,
}

impl DhParams {
    fn rfc3526_group14() -> Self {
        let p = BigUint::parse_bytes(DH_PRIME_HEX.as_bytes(), 16).unwrap_or_default();
        Self {
            p,
            g: BigUint::from(DH_GENERATOR),
        }
    }

    /// Build parameters from explicit values
    pub fn new(p: BigUint, g: BigUint) -> Self {
        Self { p, g }
    }

    /// Byte length of the prime
    pub fn modulus_len(&self) -> usize {
        ((self.p.bits() + 7) / 8) as usize
    }

    /// Prime as sent to clients
    pub fn p_hex(&self) -> String {
        self.p.to_str_radix(16)
    }

    /// Generator as sent to clients
    pub fn g_decimal(&self) -> String {
        self.g.to_str_radix(10)
    }

    /// Reject public values outside `1 < y < p - 1`.
    ///
    /// 0, 1 and p-1 would force the shared secret into a subgroup of at
    /// most two elements.
    pub fn validate_public_key(&self, y: &BigUint) -> Result<()> {
        let upper = &self.p - BigUint::one();
        if y <= &BigUint::one() || y >= &upper {
            return Err(CoreError::MalformedExchange(
                "public key out of range".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse a hex public value and range-check it
    pub fn parse_public_key_hex(&self, hex_value: &str) -> Result<BigUint> {
        if hex_value.is_empty() || hex_value.len() > self.modulus_len() * 2 {
            return Err(CoreError::MalformedExchange(format!(
                "public key hex length {}",
                hex_value.len()
            )));
        }
        let y = parse_digits(hex_value, 16).ok_or_else(|| {
            CoreError::MalformedExchange("public key is not hex".to_string())
        })?;
        self.validate_public_key(&y)?;
        Ok(y)
    }

    /// Fresh 256-bit private scalar from the OS CSPRNG
    pub fn generate_private_key(&self) -> BigUint {
        let mut bytes = [0u8; PRIVATE_KEY_BYTES];
        loop {
            OsRng.fill_bytes(&mut bytes);
            let x = BigUint::from_bytes_be(&bytes);
            if !x.is_zero() {
                bytes.zeroize();
                return x;
            }
        }
    }

    /// `g^x mod p`
    pub fn public_key(&self, private_key: &BigUint) -> BigUint {
        mod_pow(&self.g, private_key, &self.p)
    }

    /// `y^x mod p`
    pub fn shared_secret(&self, peer_public: &BigUint, private_key: &BigUint) -> BigUint {
        mod_pow(peer_public, private_key, &self.p)
    }

    /// Hash the zero-padded shared secret into a symmetric key
    pub fn derive_key(&self, shared_secret: &BigUint) -> DerivedKey {
        let width = self.modulus_len();
        let raw = shared_secret.to_bytes_be();
        let mut padded = vec![0u8; width.saturating_sub(raw.len())];
        padded.extend_from_slice(&raw);

        let digest = Sha256::digest(&padded);
        padded.zeroize();

        let mut key = [0u8; DERIVED_KEY_SIZE];
        key.copy_from_slice(&digest);
        DerivedKey(key)
    }
}

/// Parse a non-empty string made only of `radix` digits.
///
/// `BigUint::parse_bytes` on its own also takes a leading `+` and `_`
/// separators, which are not valid on the wire.
pub fn parse_digits(text: &str, radix: u32) -> Option<BigUint> {
    if text.is_empty() || !text.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    BigUint::parse_bytes(text.as_bytes(), radix)
}

/// Ephemeral key pair
pub struct DhKeyPair {
    pub private_key: BigUint,
    pub public_key: BigUint,
}

impl DhKeyPair {
    pub fn generate(params: &DhParams) -> Self {
        let private_key = params.generate_private_key();
        let public_key = params.public_key(&private_key);
        Self {
            private_key,
            public_key,
        }
    }

    pub fn public_key_hex(&self) -> String {
        self.public_key.to_str_radix(16)
    }
}

impl fmt::Debug for DhKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DhKeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// 256-bit symmetric key produced by a completed exchange
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; DERIVED_KEY_SIZE]);

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; DERIVED_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DERIVED_KEY_SIZE] {
        &self.0
    }
}

impl PartialEq for DerivedKey {
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for DerivedKey {}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey(<redacted>)")
    }
}
