// src/auth/mod.rs
//! Authentication module for the secure-session core.
//!
//! This module provides sessions, signed session cookies, CSRF tokens,
//! credential handling, and the manager that ties them together.

pub mod cookie;
pub mod credentials;
pub mod csrf;
pub mod manager;
pub mod session;
pub mod validation;

// Re-export commonly used items
pub use cookie::SignedCookieCodec;
pub use credentials::{
    Argon2Hasher, CredentialHasher, CredentialStore, MemoryCredentialStore, UserRecord,
};
pub use csrf::{CsrfToken, CsrfTokenService};
pub use manager::{AuthManager, AuthOutcome, AuthenticatedUser, OpenedRequest};
pub use session::{Session, SessionStore};
pub use validation::CredentialValidator;
