// src/auth/credentials.rs
//! User records and password hashing.
//!
//! Both concerns sit behind traits so that a database-backed user table
//! or a different slow hash can be supplied by the embedding service.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Argon2, Params};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::protocol::{Role, UserView};
use crate::types::{CoreError, Result};

/// Stored user
#[derive(Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: u64,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

impl UserRecord {
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            username: self.username.clone(),
            role: self.role,
        }
    }
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// User table
#[cfg_attr(test, mockall::automock)]
pub trait CredentialStore: Send + Sync {
    fn find_user_by_username(&self, username: &str) -> Option<UserRecord>;

    fn find_user_by_id(&self, id: u64) -> Option<UserRecord>;

    /// Insert a user and return its id; `UserExists` on a taken name
    fn insert_user(&self, username: &str, password_hash: &str, role: Role) -> Result<u64>;
}

#[derive(Default)]
struct UserTable {
    by_name: HashMap<String, UserRecord>,
    next_id: u64,
}

/// Process-local user table
#[derive(Default)]
pub struct MemoryCredentialStore {
    users: Mutex<UserTable>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().by_name.len()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn find_user_by_username(&self, username: &str) -> Option<UserRecord> {
        self.users.lock().by_name.get(username).cloned()
    }

    fn find_user_by_id(&self, id: u64) -> Option<UserRecord> {
        self.users
            .lock()
            .by_name
            .values()
            .find(|user| user.id == id)
            .cloned()
    }

    fn insert_user(&self, username: &str, password_hash: &str, role: Role) -> Result<u64> {
        let mut users = self.users.lock();
        if users.by_name.contains_key(username) {
            return Err(CoreError::UserExists);
        }

        users.next_id += 1;
        let id = users.next_id;
        users.by_name.insert(
            username.to_string(),
            UserRecord {
                id,
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                role,
            },
        );

        debug!("Inserted user {} with id {}", username, id);
        Ok(id)
    }
}

/// Slow salted password hash
#[cfg_attr(test, mockall::automock)]
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String>;

    /// Whether `password` matches `hash`; a malformed hash is an error
    fn verify(&self, password: &str, hash: &str) -> Result<bool>;

    /// Spend one verification's worth of work on a throwaway hash
    fn burn(&self, password: &str);
}

/// Argon2id hasher
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
    dummy_hash: String,
}

impl Argon2Hasher {
    /// Default Argon2id parameters
    pub fn new() -> Result<Self> {
        Self::with_argon2(Argon2::default())
    }

    /// Custom cost parameters, e.g. cheaper ones for tests
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| CoreError::Hashing(e.to_string()))?;
        Self::with_argon2(Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            params,
        ))
    }

    fn with_argon2(argon2: Argon2<'static>) -> Result<Self> {
        let salt = SaltString::generate(&mut OsRng);
        let dummy_hash = argon2
            .hash_password(salt.as_str().as_bytes(), &salt)
            .map_err(|e| CoreError::Hashing(e.to_string()))?
            .to_string();
        Ok(Self { argon2, dummy_hash })
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Ok(self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CoreError::Hashing(e.to_string()))?
            .to_string())
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| CoreError::Hashing(e.to_string()))?;
        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    fn burn(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash);
    }
}

impl fmt::Debug for Argon2Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Argon2Hasher").finish_non_exhaustive()
    }
}
