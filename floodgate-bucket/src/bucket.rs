//! Core token-bucket abstractions and shared utilities.
//!
//! The two building blocks here are [`BucketState`], the packed per-tenant
//! record a storage backend holds, and [`TokenBucket`], the pure refill and
//! cooldown arithmetic applied to that record.
//!
//! ## Design principles
//!
//! - **Integer-only accounting** - tokens are tracked in millitokens
//!   (1/1000 of a token) so fractional refill rates never put a float in
//!   storage.
//! - **Time abstraction** - all time-dependent logic is driven by a
//!   pluggable [`TimeSource`] to allow deterministic testing.
//! - **Caller-owned state** - this crate never holds tenant state; it maps
//!   an observed state plus a timestamp to a new state and leaves the
//!   atomic publication of that state to the caller.
//!
//! ## Fleet timebase
//!
//! Bucket timestamps are shared between processes through storage, so the
//! default [`SystemTimeSource`] reads the wall clock (UNIX epoch) rather
//! than a process-local monotonic anchor. A process-wide atomic floor keeps
//! the reading monotone within a process even if the wall clock steps
//! backwards; refill arithmetic additionally clamps negative elapsed time
//! to zero.

use std::{
    sync::{Arc, atomic::{AtomicU64, Ordering::*}},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

pub use state::BucketState;
pub use token_bucket::TokenBucket;

mod state;
mod token_bucket;

/// Integer unit of account: one token is a thousand millitokens.
pub const MILLITOKENS_PER_TOKEN: u64 = 1_000;

pub(crate) const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Fixed-point scaling factor for fractional refill rates
/// (scale units per token per second).
pub(crate) const RATE_SCALE: u64 = 1_000_000;

/// A source of time used by the bucket arithmetic.
///
/// This abstraction decouples refill math from the system clock, enabling
/// deterministic and fast unit tests.
///
/// Time is expressed in **nanoseconds** and must be **monotone**
/// (non-decreasing) within a process. Implementations backing a fleet of
/// processes sharing one storage must also agree on the epoch; the wall
/// clock is the usual choice.
pub trait TimeSource: Send + Sync {
    /// Returns the current timestamp in nanoseconds.
    fn now_nanos(&self) -> u64;
}

/// Wall-clock time source with a process-wide monotone guard.
///
/// Returns nanoseconds since [`UNIX_EPOCH`], clamped through a shared
/// atomic floor so two consecutive readings in one process never go
/// backwards even when the wall clock does (NTP, manual adjustments).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl SystemTimeSource {
    #[inline]
    fn floor() -> &'static AtomicU64 {
        // A process-wide high-water mark shared by every instance.
        static FLOOR: AtomicU64 = AtomicU64::new(0);
        &FLOOR
    }
}

impl TimeSource for SystemTimeSource {
    #[inline]
    fn now_nanos(&self) -> u64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX));

        let seen = Self::floor().fetch_max(wall, AcqRel);
        wall.max(seen)
    }
}

/// A manually driven time source for deterministic tests.
///
/// Clones share the same underlying clock, so several governor instances
/// can be stepped in lockstep.
///
/// Start the clock above zero: a zero timestamp packs into the absent-key
/// sentinel value of the storage encoding.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use floodgate_bucket::{ManualTimeSource, TimeSource};
///
/// let time = ManualTimeSource::new(Duration::from_secs(100));
/// time.advance(Duration::from_millis(250));
///
/// assert_eq!(time.now_nanos(), 100_250_000_000);
/// ```
#[derive(Debug, Clone)]
pub struct ManualTimeSource {
    now_ns: Arc<AtomicU64>,
}

impl ManualTimeSource {
    /// Creates a manual time source starting at `start` past its epoch.
    #[inline]
    pub fn new(start: Duration) -> Self {
        Self {
            now_ns: Arc::new(AtomicU64::new(duration_to_nanos(start))),
        }
    }

    /// Moves the clock forward by `delta`.
    #[inline]
    pub fn advance(&self, delta: Duration) {
        self.now_ns.fetch_add(duration_to_nanos(delta), AcqRel);
    }
}

impl TimeSource for ManualTimeSource {
    #[inline]
    fn now_nanos(&self) -> u64 {
        self.now_ns.load(Acquire)
    }
}

#[inline]
fn duration_to_nanos(value: Duration) -> u64 {
    u64::try_from(value.as_nanos()).unwrap_or(u64::MAX)
}
