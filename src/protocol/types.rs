// src/protocol/types.rs
//! Wire shapes exchanged with clients.
//!
//! Field names follow the browser client: camelCase for the key-exchange
//! and sealed-request bodies, `csrf_token` for responses carrying a token.
//! Big integers travel as bare lowercase hex without a `0x` prefix, the
//! generator as a decimal string.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Response to a key-exchange initiation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyExchangeResponse {
    pub exchange_id: String,
    /// `g^x mod p`, hex
    pub server_public_key: String,
    /// Group prime, hex
    pub p: String,
    /// Generator, decimal
    pub g: String,
}

/// AES-GCM output split the way WebCrypto clients send it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPayload {
    /// Ciphertext without the tag, hex
    pub encrypted: String,
    /// 12-byte nonce, hex
    pub iv: String,
    /// 16-byte tag, hex
    pub auth_tag: String,
}

/// Credentials sealed under a key derived from a pending exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedCredentials {
    pub exchange_id: String,
    /// Client `g^y mod p`, hex
    pub client_public_key: String,
    pub encrypted_data: EncryptedPayload,
}

/// Username and password as carried inside the sealed payload
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body of a register or login request.
///
/// A body carrying all three exchange fields is sealed; anything else is
/// read as plain credentials, which the core refuses unless configured
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CredentialsRequest {
    Sealed(SealedCredentials),
    Plain(Credentials),
}

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// Public view of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub id: u64,
    pub username: String,
    pub role: Role,
}

/// Successful register or login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub message: String,
    pub user: UserView,
    pub csrf_token: String,
}

/// Freshly issued CSRF token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}

/// Rejected request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<&crate::types::CoreError> for ErrorResponse {
    fn from(error: &crate::types::CoreError) -> Self {
        Self {
            error: error.public_message(),
        }
    }
}
