//! The atomic storage contract shared by a governor fleet.
//!
//! Tenant bucket state lives behind this contract, not in the governor:
//! that is what lets any number of governor instances — across threads,
//! processes, or hosts — enforce a single global quota. The backend can be
//! a networked atomic key-value store, a Redis-like service, or the
//! in-process [`MemoryStorage`] used by tests and single-node deployments.
//!
//! ## Contract
//!
//! All three operations must be linearizable with respect to other calls
//! on the same key. In particular the create branch of
//! [`compare_and_swap`](AtomicStorage::compare_and_swap) — absent key with
//! `old == 0` — must be a single load-or-store step; a backend that checks
//! presence and inserts in two steps can admit two "first" writers and
//! break exactly-once accounting.
//!
//! Transient backend failures are surfaced through [`Error::storage`]
//! unchanged; the governor never retries them.

use std::sync::Arc;
use async_trait::async_trait;
use crate::error::Error;

pub use memory::MemoryStorage;

mod memory;

/// Capability set required of a storage backend.
#[async_trait]
pub trait AtomicStorage: Send + Sync + 'static {
    /// Linearizable read. Absent keys return `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<u128>, Error>;

    /// Atomic conditional write: stores `new` and returns `true` iff the
    /// key currently holds `old`. When `old == 0` and the key is absent,
    /// the swap succeeds and creates the key.
    async fn compare_and_swap(&self, key: &str, old: u128, new: u128) -> Result<bool, Error>;

    /// Atomic read-modify-write for auxiliary counters, returning the new
    /// value. Absent keys are created at `0` before the delta is applied;
    /// negative deltas saturate at `0`.
    async fn atomic_increment(&self, key: &str, delta: i64) -> Result<u128, Error>;
}

#[async_trait]
impl<S: AtomicStorage + ?Sized> AtomicStorage for Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<u128>, Error> {
        (**self).get(key).await
    }

    async fn compare_and_swap(&self, key: &str, old: u128, new: u128) -> Result<bool, Error> {
        (**self).compare_and_swap(key, old, new).await
    }

    async fn atomic_increment(&self, key: &str, delta: i64) -> Result<u128, Error> {
        (**self).atomic_increment(key, delta).await
    }
}
