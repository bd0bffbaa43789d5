// src/store/mod.rs
//! Record storage for pending exchanges, sessions and CSRF tokens.
//!
//! The services never hold records across calls; they go through this
//! narrow interface, which an external key-value or relational store can
//! implement. Each store instance plays the role of one table.

pub mod memory;

use chrono::{DateTime, Utc};

pub use memory::MemoryStore;

/// A record that carries its own expiration
pub trait Expiring {
    fn expires_at(&self) -> DateTime<Utc>;

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at() <= now
    }
}

/// Keyed record table.
///
/// Implementations must make each method atomic with respect to concurrent
/// callers. In particular [`RecordStore::take_if`] is the consume
/// primitive: at most one of several concurrent callers may receive the
/// record, all others observe `None`.
pub trait RecordStore<R>: Send + Sync {
    /// Table name, for logging
    fn table(&self) -> &str;

    /// Insert or replace a record. The lifetime is the record's own
    /// `expires_at`.
    fn put(&self, key: &str, record: R);

    /// Return the record only if it exists and has not expired at `now`
    fn get_if_not_expired(&self, key: &str, now: DateTime<Utc>) -> Option<R>;

    /// Remove a record; returns whether one was present
    fn delete_if_present(&self, key: &str) -> bool;

    /// Remove and return the record if it exists and `predicate` accepts it.
    /// A rejected record stays in place.
    fn take_if(&self, key: &str, predicate: &dyn Fn(&R) -> bool) -> Option<R>;

    /// Apply `mutate` to the record if it exists and has not expired at `now`
    fn update_if_not_expired(
        &self,
        key: &str,
        now: DateTime<Utc>,
        mutate: &mut dyn FnMut(&mut R),
    ) -> bool;

    /// Remove every record matching `predicate`, returning the removed keys
    fn remove_where(&self, predicate: &dyn Fn(&str, &R) -> bool) -> Vec<String>;

    /// Remove every record expired at `now`, returning the removed keys
    fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<String>;

    /// Number of stored records, expired or not
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
