//! The admission hot path.
//!
//! One decision is one run of the loop below: read the packed state,
//! apply lazy refill, and either deduct the cost with a compare-and-swap
//! or deny with a cooldown estimate. Deduction happens only inside a
//! successful CAS, so no two decisions — on any governor instance sharing
//! the backend — can spend the same tokens: the losing caller observes a
//! conflict and retries against the fresh state.
//!
//! The loop never sleeps between attempts; under conflict the next read
//! observes the winner's write. A bounded attempt budget caps worst-case
//! latency under heavy contention, surfacing as the distinguished
//! [`Error::Contention`] the caller treats as retryable.

use floodgate_bucket::{BucketState, TimeSource};
use crate::{error::Error, storage::AtomicStorage};
use super::{Decision, Governor};

impl<S: AtomicStorage, T: TimeSource> Governor<S, T> {
    /// Charges `cost_mt` millitokens against the bucket at `key`.
    pub(super) async fn admit(&self, key: &str, cost_mt: u64) -> Result<Decision, Error> {
        for attempt in 1..=self.max_cas_attempts {
            let now_ns = self.time_source.now_nanos();

            // An absent key materializes as a full bucket; publishing it
            // goes through the CAS create branch (old == 0) so only one
            // first writer can win.
            let (state, old_packed) = match self.storage.get(key).await? {
                Some(packed) => (BucketState::unpack(packed), packed),
                None => (self.bucket.fresh(now_ns), 0),
            };

            let state = self.bucket.refill(state, now_ns);

            if state.tokens_mt >= cost_mt {
                let next = BucketState::new(state.tokens_mt - cost_mt, state.last_refill_ns);
                if self.storage.compare_and_swap(key, old_packed, next.pack()).await? {
                    return Ok(Decision::allow(next.tokens_mt));
                }
                tracing::trace!("cas conflict on {key}, attempt {attempt}");
            } else {
                // Persist the refill-only update so peers observe the
                // advanced timestamp. Best-effort: the denial was decided
                // from the refreshed local state, so neither a conflict
                // nor a backend failure changes the verdict.
                let refilled = state.pack();
                if refilled != old_packed {
                    let _ = self.storage.compare_and_swap(key, old_packed, refilled).await;
                }

                let wait = self.bucket.cooldown(state.tokens_mt, cost_mt);
                return Ok(Decision::deny(state.tokens_mt, wait));
            }
        }

        tracing::warn!(
            "cas contention on {key} exhausted after {} attempts",
            self.max_cas_attempts,
        );
        Err(Error::contention(self.max_cas_attempts))
    }
}
