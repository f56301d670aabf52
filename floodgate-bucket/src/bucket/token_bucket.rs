//! Refill and cooldown arithmetic for a token bucket.

use std::time::Duration;
use super::{BucketState, MILLITOKENS_PER_TOKEN, NANOS_PER_SEC, RATE_SCALE};

/// Nanosecond-scale-units credited per millitoken:
/// `NANOS_PER_SEC * RATE_SCALE / MILLITOKENS_PER_TOKEN`.
const NANOS_SCALE_PER_MILLITOKEN: u128 =
    NANOS_PER_SEC as u128 * (RATE_SCALE / MILLITOKENS_PER_TOKEN) as u128;

/// Pure token-bucket arithmetic over [`BucketState`] values.
///
/// A bucket accrues tokens at a steady rate up to a burst capacity and
/// pays them out per admitted request. This type holds only the
/// configuration; the state itself lives wherever the caller keeps it
/// (for the governor: behind an atomic storage backend).
///
/// ## Characteristics
///
/// - **Allows short bursts** up to the bucket capacity.
/// - **Enforces average rate** through lazy refill on access.
/// - **Integer-only** - balances are millitokens, rates are fixed-point,
///   so no float ever reaches storage.
///
/// ## Algorithm
///
/// On refill at time `now`:
///
/// 1. `credit = floor(elapsed * rate)` in millitokens.
/// 2. `tokens = min(capacity, tokens + credit)`.
/// 3. The timestamp advances only by the time `credit` actually covers,
///    so fractional progress toward the next millitoken is never lost
///    and re-applying the refill at the same instant changes nothing.
///
/// Step 3 runs on the uncapped credit: a bucket that sat full still
/// consumes the elapsed interval, otherwise a spend would be followed by
/// an instant second burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBucket {
    /// Refill rate in fixed-point scale units per second.
    rate_scaled: u64,

    /// Burst capacity in millitokens.
    burst_mt: u64,
}

impl TokenBucket {
    /// Creates a token bucket from a refill rate in tokens per second and
    /// a burst capacity in whole tokens.
    ///
    /// # Panics
    ///
    /// Panics if:
    ///
    /// - `refill_rate` is not finite (`NaN` or ±∞).
    /// - `refill_rate` is not positive (`<= 0.0`).
    /// - `refill_rate * scale` exceeds `u64::MAX` or rounds to zero.
    /// - `burst_capacity` is `0` (must be at least `1`).
    /// - `burst_capacity * scale` overflows `u64` when computing the
    ///   internal millitoken capacity.
    #[inline]
    pub fn new(refill_rate: f64, burst_capacity: u64) -> Self {
        match Self::try_new(refill_rate, burst_capacity) {
            Ok(bucket) => bucket,
            Err(reason) => panic!("{reason}"),
        }
    }

    /// Fallible counterpart of [`TokenBucket::new`] for callers that
    /// construct buckets from untrusted configuration. The returned
    /// message names the offending parameter.
    pub fn try_new(refill_rate: f64, burst_capacity: u64) -> Result<Self, &'static str> {
        if !refill_rate.is_finite() {
            return Err("refill_rate must be finite");
        }
        if refill_rate <= 0.0 {
            return Err("refill_rate must be > 0");
        }

        let scaled_f = refill_rate * RATE_SCALE as f64;
        if scaled_f > u64::MAX as f64 {
            return Err("refill_rate too large");
        }

        let rate_scaled = scaled_f.round() as u64;
        if rate_scaled == 0 {
            return Err("refill_rate too small");
        }

        if burst_capacity == 0 {
            return Err("burst_capacity must be >= 1");
        }
        let Some(burst_mt) = burst_capacity.checked_mul(MILLITOKENS_PER_TOKEN) else {
            return Err("burst_capacity * scale overflow");
        };

        Ok(Self { rate_scaled, burst_mt })
    }

    /// Tokens added per second.
    #[inline(always)]
    pub fn refill_rate(&self) -> f64 {
        self.rate_scaled as f64 / RATE_SCALE as f64
    }

    /// Bucket capacity in whole tokens.
    #[inline(always)]
    pub fn burst_capacity(&self) -> u64 {
        self.burst_mt / MILLITOKENS_PER_TOKEN
    }

    /// Bucket capacity in millitokens.
    #[inline(always)]
    pub fn burst_millitokens(&self) -> u64 {
        self.burst_mt
    }

    /// The state a tenant materializes with on first access: a full
    /// bucket stamped at `now_ns`.
    #[inline]
    pub fn fresh(&self, now_ns: u64) -> BucketState {
        BucketState::new(self.burst_mt, now_ns)
    }

    /// Applies lazy refill to an observed state at time `now_ns`.
    ///
    /// Negative elapsed time (a timestamp from a peer whose clock runs
    /// ahead) credits nothing and leaves the state untouched.
    pub fn refill(&self, state: BucketState, now_ns: u64) -> BucketState {
        let elapsed_ns = now_ns.saturating_sub(state.last_refill_ns);
        if elapsed_ns == 0 {
            return state;
        }

        let credit = (elapsed_ns as u128 * self.rate_scaled as u128) / NANOS_SCALE_PER_MILLITOKEN;
        let credit_mt = u64::try_from(credit).unwrap_or(u64::MAX);
        if credit_mt == 0 {
            return state;
        }

        // Advance the timestamp only by the interval the credit covers,
        // rounded up: leftover fractional time may under-credit by less
        // than one millitoken but can never over-credit.
        let spent = (credit_mt as u128 * NANOS_SCALE_PER_MILLITOKEN).div_ceil(self.rate_scaled as u128);
        let spent_ns = spent.min(elapsed_ns as u128) as u64;

        BucketState {
            tokens_mt: state.tokens_mt.saturating_add(credit_mt).min(self.burst_mt),
            last_refill_ns: state.last_refill_ns + spent_ns,
        }
    }

    /// Estimates how long a caller must wait until a balance of
    /// `tokens_mt` millitokens has grown to cover `cost_mt`.
    ///
    /// The estimate is exact to refill granularity: the division rounds
    /// up to whole nanoseconds so the wait is always sufficient at the
    /// configured rate. A zero deficit yields [`Duration::ZERO`].
    pub fn cooldown(&self, tokens_mt: u64, cost_mt: u64) -> Duration {
        let deficit_mt = cost_mt.saturating_sub(tokens_mt);
        if deficit_mt == 0 {
            return Duration::ZERO;
        }

        let wait_ns = (deficit_mt as u128 * NANOS_SCALE_PER_MILLITOKEN)
            .div_ceil(self.rate_scaled as u128);

        Duration::from_nanos(u64::try_from(wait_ns).unwrap_or(u64::MAX))
    }
}
