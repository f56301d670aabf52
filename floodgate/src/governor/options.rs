//! Governor configuration.

/// Default compare-and-swap retry budget of a single admission decision.
pub const DEFAULT_MAX_CAS_ATTEMPTS: u32 = 8;

/// Configuration of a [`Governor`](super::Governor) instance.
///
/// The pair `(refill_rate, burst_capacity)` is process-wide: a single
/// governor applies the same quota shape to every tenant it sees. All
/// fields are validated at governor construction, never on the hot path.
///
/// With the `serde` feature enabled the struct derives `Deserialize`, so
/// deployments can read it straight from their config files; the CAS
/// budget defaults when omitted.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GovernorOptions {
    /// Tokens added per second; may be fractional.
    pub refill_rate: f64,

    /// Maximum token count a bucket may hold.
    pub burst_capacity: u64,

    /// How many CAS conflicts a single decision absorbs before giving up
    /// with the distinguished contention error.
    #[cfg_attr(feature = "serde", serde(default = "default_max_cas_attempts"))]
    pub max_cas_attempts: u32,
}

impl GovernorOptions {
    /// Creates options with the default CAS retry budget.
    #[inline]
    pub fn new(refill_rate: f64, burst_capacity: u64) -> Self {
        Self {
            refill_rate,
            burst_capacity,
            max_cas_attempts: DEFAULT_MAX_CAS_ATTEMPTS,
        }
    }

    /// Overrides the CAS retry budget.
    #[inline]
    pub fn with_max_cas_attempts(mut self, attempts: u32) -> Self {
        self.max_cas_attempts = attempts;
        self
    }
}

#[cfg(feature = "serde")]
fn default_max_cas_attempts() -> u32 {
    DEFAULT_MAX_CAS_ATTEMPTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_defaults_the_cas_budget() {
        let options = GovernorOptions::new(100.0, 500);

        assert_eq!(options.refill_rate, 100.0);
        assert_eq!(options.burst_capacity, 500);
        assert_eq!(options.max_cas_attempts, DEFAULT_MAX_CAS_ATTEMPTS);
    }

    #[test]
    fn it_overrides_the_cas_budget() {
        let options = GovernorOptions::new(1.0, 1).with_max_cas_attempts(3);

        assert_eq!(options.max_cas_attempts, 3);
    }
}
