// src/store/memory.rs
//! In-memory record store.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

use super::{Expiring, RecordStore};

/// Process-local table backed by a mutex-guarded map.
///
/// Every operation takes the lock exactly once, so lookup-then-delete
/// sequences inside a single call are atomic.
#[derive(Debug)]
pub struct MemoryStore<R> {
    table: String,
    records: Mutex<HashMap<String, R>>,
}

impl<R> MemoryStore<R> {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            records: Mutex::new(HashMap::new()),
        }
    }
}

impl<R> RecordStore<R> for MemoryStore<R>
where
    R: Expiring + Clone + Send + Sync,
{
    fn table(&self) -> &str {
        &self.table
    }

    fn put(&self, key: &str, record: R) {
        self.records.lock().insert(key.to_string(), record);
    }

    fn get_if_not_expired(&self, key: &str, now: DateTime<Utc>) -> Option<R> {
        let records = self.records.lock();
        records
            .get(key)
            .filter(|record| !record.is_expired(now))
            .cloned()
    }

    fn delete_if_present(&self, key: &str) -> bool {
        self.records.lock().remove(key).is_some()
    }

    fn take_if(&self, key: &str, predicate: &dyn Fn(&R) -> bool) -> Option<R> {
        let mut records = self.records.lock();
        let accepted = records.get(key).map_or(false, |record| predicate(record));
        if accepted {
            records.remove(key)
        } else {
            None
        }
    }

    fn update_if_not_expired(
        &self,
        key: &str,
        now: DateTime<Utc>,
        mutate: &mut dyn FnMut(&mut R),
    ) -> bool {
        let mut records = self.records.lock();
        match records.get_mut(key) {
            Some(record) if !record.is_expired(now) => {
                mutate(record);
                true
            }
            _ => false,
        }
    }

    fn remove_where(&self, predicate: &dyn Fn(&str, &R) -> bool) -> Vec<String> {
        let mut records = self.records.lock();
        let mut removed = Vec::new();
        records.retain(|key, record| {
            let remove = predicate(key, record);
            if remove {
                removed.push(key.clone());
            }
            !remove
        });
        removed
    }

    fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<String> {
        let removed = self.remove_where(&|_: &str, record: &R| record.is_expired(now));
        if !removed.is_empty() {
            debug!("Swept {} expired records from {}", removed.len(), self.table);
        }
        removed
    }

    fn len(&self) -> usize {
        self.records.lock().len()
    }
}
