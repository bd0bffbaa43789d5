// src/protocol/mod.rs
//! Protocol module for the secure-session core.
//!
//! This module defines the JSON bodies exchanged between the browser
//! client and the transport layer that calls into this crate.

pub mod types;

pub use types::{
    AuthResponse, Credentials, CredentialsRequest, CsrfTokenResponse, EncryptedPayload,
    ErrorResponse, KeyExchangeResponse, Role, SealedCredentials, UserView,
};
