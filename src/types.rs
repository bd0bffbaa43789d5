// src/types.rs
//! Crate-wide error taxonomy and result alias.
//!
//! Every variant is recoverable at the request boundary. The transport
//! layer maps errors with [`CoreError::status_code`] and shows clients only
//! [`CoreError::public_message`], which never distinguishes between the
//! individual decryption, signature or lookup checks.

use crate::config::ConfigError;

/// Error types for secure-session operations
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("Key exchange not found")]
    ExchangeNotFound,

    #[error("Key exchange expired")]
    ExchangeExpired,

    #[error("Malformed exchange data: {0}")]
    MalformedExchange(String),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Session expired")]
    SessionExpired,

    #[error("Session invalid")]
    SessionInvalid,

    #[error("CSRF token missing")]
    CsrfTokenMissing,

    #[error("CSRF token invalid")]
    CsrfTokenInvalid,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("User already exists")]
    UserExists,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Credentials must be sent through a key exchange")]
    PlaintextCredentialsRejected,

    #[error("Password hashing error: {0}")]
    Hashing(String),

    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Transport status for this error
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::ExchangeNotFound
            | CoreError::ExchangeExpired
            | CoreError::MalformedExchange(_)
            | CoreError::AuthenticationFailed
            | CoreError::Validation(_)
            | CoreError::PlaintextCredentialsRejected => 400,
            CoreError::SessionExpired
            | CoreError::SessionInvalid
            | CoreError::InvalidCredentials => 401,
            CoreError::CsrfTokenMissing | CoreError::CsrfTokenInvalid | CoreError::Forbidden => 403,
            CoreError::UserExists => 409,
            CoreError::Hashing(_)
            | CoreError::Serialization(_)
            | CoreError::Config(_)
            | CoreError::Internal(_) => 500,
        }
    }

    /// Client-visible message.
    ///
    /// Exchange and envelope failures share one message, as do all session
    /// failures, so the response reveals nothing about which check failed.
    pub fn public_message(&self) -> String {
        match self {
            CoreError::ExchangeNotFound
            | CoreError::ExchangeExpired
            | CoreError::MalformedExchange(_)
            | CoreError::AuthenticationFailed => "Unable to decrypt request".to_string(),
            CoreError::SessionExpired | CoreError::SessionInvalid => {
                "Authentication required".to_string()
            }
            CoreError::InvalidCredentials => "Invalid username or password".to_string(),
            CoreError::CsrfTokenMissing => "CSRF token missing".to_string(),
            CoreError::CsrfTokenInvalid => "Invalid CSRF token".to_string(),
            CoreError::Validation(msg) => msg.clone(),
            CoreError::UserExists => "A user with this name already exists".to_string(),
            CoreError::Forbidden => "Insufficient permissions".to_string(),
            CoreError::PlaintextCredentialsRejected => {
                "Credentials must be sent through a key exchange".to_string()
            }
            CoreError::Hashing(_)
            | CoreError::Serialization(_)
            | CoreError::Config(_)
            | CoreError::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// Errors after which the transport should clear the session cookie
    pub fn clears_session(&self) -> bool {
        matches!(self, CoreError::SessionExpired | CoreError::SessionInvalid)
    }
}

/// Result type for secure-session operations
pub type Result<T> = std::result::Result<T, CoreError>;
