// src/config/constants.rs
//! Protocol constants and fixed security parameters.
//!
//! These values are part of the wire contract with clients (group
//! parameters, nonce and tag sizes) or are reference policy values used
//! when no override is configured.

use std::time::Duration;

/// RFC 3526 2048-bit MODP group (group 14) prime, big-endian hex.
pub const DH_PRIME_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74",
    "020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437",
    "4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05",
    "98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB",
    "9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B",
    "E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718",
    "3995497CEA956AE515D2261898FA051015728E5A8AACAA68FFFFFFFFFFFFFFFF",
);

/// Group generator
pub const DH_GENERATOR: u32 = 2;

/// Cryptographic sizes
pub const PRIVATE_KEY_BYTES: usize = 32; // 256-bit ephemeral scalar
pub const DERIVED_KEY_SIZE: usize = 32; // AES-256
pub const NONCE_SIZE: usize = 12; // AES-GCM IV
pub const TAG_SIZE: usize = 16; // AES-GCM tag
pub const COOKIE_SECRET_SIZE: usize = 32;

/// Identifier entropy (bytes before hex encoding)
pub const EXCHANGE_ID_BYTES: usize = 16;
pub const SESSION_ID_BYTES: usize = 32;
pub const CSRF_TOKEN_BYTES: usize = 32;

/// Lifetimes
pub const EXCHANGE_TTL: Duration = Duration::from_secs(5 * 60);
pub const SESSION_DURATION: Duration = Duration::from_secs(30 * 60);
pub const CSRF_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Transport names
pub const SESSION_COOKIE_NAME: &str = "session";
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";

/// Credential policy
pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 20;
pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 100;

/// Environment variable holding the hex cookie-signing secret
pub const COOKIE_SECRET_ENV: &str = "SEALED_SESSION_COOKIE_SECRET";
