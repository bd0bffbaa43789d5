// src/utils/mod.rs
//! Utility functions and helpers.
//!
//! This module contains general-purpose utilities used across
//! the crate.

pub mod clock;
pub mod logging;

use rand::rngs::OsRng;
use rand::RngCore;

pub use clock::{Clock, ManualClock, SystemClock};

/// Generate `bytes` bytes from the operating system CSPRNG, hex encoded
pub fn random_token_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Shorten an identifier for log output
pub fn redact(id: &str) -> String {
    let prefix: String = id.chars().take(8).collect();
    if prefix.len() < id.len() {
        format!("{}…", prefix)
    } else {
        prefix
    }
}

/// Sanitize a log message to prevent log injection
pub fn sanitize_log(input: &str) -> String {
    input.replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_token_hex() {
        let t1 = random_token_hex(32);
        let t2 = random_token_hex(32);

        assert_eq!(t1.len(), 64);
        assert!(t1.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(t1, t2);
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("0123456789abcdef"), "01234567…");
        assert_eq!(redact("short"), "short");
    }

    #[test]
    fn test_sanitize_log() {
        assert_eq!(sanitize_log("alice\nadmin"), "alice\\nadmin");
        assert_eq!(sanitize_log("tab\there"), "tab\\there");
    }
}
