// src/config/defaults.rs
//! Default configurations for the secure-session core.
//!
//! This module provides the values used when a setting is not explicitly
//! specified on the command line or in the configuration file.

use crate::config::constants::{CSRF_TOKEN_TTL, EXCHANGE_TTL, SESSION_DURATION, SWEEP_INTERVAL};

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default key-exchange lifetime in seconds
pub const DEFAULT_EXCHANGE_TTL: u64 = EXCHANGE_TTL.as_secs();

/// Default session lifetime in seconds (sliding)
pub const DEFAULT_SESSION_DURATION: u64 = SESSION_DURATION.as_secs();

/// Default CSRF token lifetime in seconds
pub const DEFAULT_CSRF_TTL: u64 = CSRF_TOKEN_TTL.as_secs();

/// Default interval between expiry sweeps in seconds
pub const DEFAULT_SWEEP_INTERVAL: u64 = SWEEP_INTERVAL.as_secs();

/// Default cap on simultaneously pending key exchanges
pub const DEFAULT_MAX_PENDING_EXCHANGES: usize = 10_000;

/// Plain (non-sealed) credentials are refused unless explicitly enabled
pub const DEFAULT_ALLOW_PLAINTEXT_CREDENTIALS: bool = false;
