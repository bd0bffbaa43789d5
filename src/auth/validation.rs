// src/auth/validation.rs
//! Credential validation.

use crate::config::constants::{PASSWORD_MAX_LEN, PASSWORD_MIN_LEN, USERNAME_MAX_LEN, USERNAME_MIN_LEN};
use crate::types::{CoreError, Result};

/// Credential policy checks
pub struct CredentialValidator;

impl CredentialValidator {
    /// Trim and check a username, returning the trimmed form
    pub fn username(raw: &str) -> Result<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::Validation("Username is required".to_string()));
        }

        let len = trimmed.chars().count();
        if len < USERNAME_MIN_LEN || len > USERNAME_MAX_LEN {
            return Err(CoreError::Validation(format!(
                "Username must be between {} and {} characters",
                USERNAME_MIN_LEN, USERNAME_MAX_LEN
            )));
        }

        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(CoreError::Validation(
                "Username may contain only letters, digits and underscores".to_string(),
            ));
        }

        Ok(trimmed.to_string())
    }

    /// Check a password; it is used exactly as given
    pub fn password(raw: &str) -> Result<()> {
        if raw.is_empty() {
            return Err(CoreError::Validation("Password is required".to_string()));
        }

        let len = raw.chars().count();
        if len < PASSWORD_MIN_LEN {
            return Err(CoreError::Validation(format!(
                "Password must be at least {} characters",
                PASSWORD_MIN_LEN
            )));
        }
        if len > PASSWORD_MAX_LEN {
            return Err(CoreError::Validation("Password is too long".to_string()));
        }

        Ok(())
    }
}
