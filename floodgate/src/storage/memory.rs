//! In-process storage backend.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use crate::error::Error;
use super::AtomicStorage;

/// An in-memory [`AtomicStorage`] backend.
///
/// Clones share the same underlying map, so several governor instances
/// constructed from clones of one `MemoryStorage` behave as a fleet
/// sharing a single store. Used by tests and by single-process
/// deployments that only need process-global limiting.
///
/// Every operation goes through the map's entry API, which holds the
/// key's shard guard for the whole read-modify-write — including the
/// absent-key create branch of `compare_and_swap`, which is therefore a
/// single load-or-store step as the contract requires.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: Arc<DashMap<String, u128>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no keys.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl AtomicStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<u128>, Error> {
        Ok(self.entries.get(key).map(|entry| *entry.value()))
    }

    async fn compare_and_swap(&self, key: &str, old: u128, new: u128) -> Result<bool, Error> {
        match self.entries.entry(key.to_owned()) {
            Entry::Occupied(mut entry) => {
                if *entry.get() == old {
                    entry.insert(new);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(entry) => {
                if old == 0 {
                    let _ = entry.insert(new);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    async fn atomic_increment(&self, key: &str, delta: i64) -> Result<u128, Error> {
        let mut entry = self.entries.entry(key.to_owned()).or_insert(0);
        let value = entry.value_mut();
        *value = value.saturating_add_signed(delta as i128);
        Ok(*value)
    }
}
