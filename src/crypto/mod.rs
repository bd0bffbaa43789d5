// src/crypto/mod.rs
//! Cryptography module for the secure-session core.
//!
//! This module provides the Diffie-Hellman key exchange, the AES-GCM
//! envelope keyed by it, and the modular exponentiation underneath.

pub mod dh;
pub mod envelope;
pub mod exchange;
pub mod modpow;

// Re-export commonly used items
pub use dh::{DerivedKey, DhKeyPair, DhParams, DH_PARAMS};
pub use envelope::{EncryptedEnvelope, EnvelopeCipher};
pub use exchange::{KeyExchangeService, PendingExchange};
pub use modpow::mod_pow;
