//! The governor facade.
//!
//! A [`Governor`] composes cost resolution, the admission CAS loop, and
//! cooldown estimation behind a single [`allow`](Governor::allow) call. It
//! is stateless beyond its configuration and rule table: every tenant
//! bucket lives in the storage backend, which is exactly what lets any
//! number of facade instances sharing one backend behave as a single
//! distributed governor.

use std::{
    sync::RwLock,
    time::Duration,
};

use http::{HeaderMap, Method};
use smallvec::SmallVec;
use floodgate_bucket::{
    MILLITOKENS_PER_TOKEN,
    SystemTimeSource,
    TimeSource,
    TokenBucket,
};

use crate::{
    error::Error,
    routing::{Rule, RuleTable},
    routing::pattern::{DEFAULT_DEPTH, PATH_SEPARATOR},
    storage::AtomicStorage,
    utils::str::memchr_split_nonempty,
};

pub use options::{GovernorOptions, DEFAULT_MAX_CAS_ATTEMPTS};

mod admission;
mod options;

/// Key namespace under which tenant buckets are stored, versioned so
/// heterogeneous fleet members agree on the layout.
pub const BUCKET_KEY_PREFIX: &str = "dwrg:tb:v1:";

/// Derives the storage key of a tenant's bucket.
///
/// Tenant identifiers must not contain `:`; [`Governor::allow`] rejects
/// such tenants before touching storage.
#[inline]
pub fn bucket_key(tenant: &str) -> String {
    let mut key = String::with_capacity(BUCKET_KEY_PREFIX.len() + tenant.len());
    key.push_str(BUCKET_KEY_PREFIX);
    key.push_str(tenant);
    key
}

/// The outcome of an admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Decision {
    allowed: bool,
    remaining: u64,
    retry_after: Duration,
}

impl Decision {
    #[inline]
    pub(crate) fn allow(remaining_mt: u64) -> Self {
        Self {
            allowed: true,
            remaining: remaining_mt / MILLITOKENS_PER_TOKEN,
            retry_after: Duration::ZERO,
        }
    }

    #[inline]
    pub(crate) fn deny(remaining_mt: u64, retry_after: Duration) -> Self {
        Self {
            allowed: false,
            remaining: remaining_mt / MILLITOKENS_PER_TOKEN,
            retry_after,
        }
    }

    /// Whether the request was admitted and its cost deducted.
    #[inline]
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Whether the request was denied.
    #[inline]
    pub fn is_denied(&self) -> bool {
        !self.allowed
    }

    /// Whole tokens left in the tenant's bucket after this decision.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// How long the caller should wait before retrying. Zero for allowed
    /// decisions; for denials, the time until enough tokens will have
    /// refilled for the rejected cost to succeed.
    #[inline]
    pub fn retry_after(&self) -> Duration {
        self.retry_after
    }
}

/// A distributed weighted admission governor.
///
/// Each incoming request is priced through the rule table and charged
/// against its tenant's token bucket with a compare-and-swap loop on the
/// shared storage backend, guaranteeing a global no-overshoot bound across
/// every governor instance using that backend.
///
/// # Examples
///
/// ```
/// use floodgate::{Governor, GovernorOptions, MemoryStorage, Rule};
/// use http::{HeaderMap, Method};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), floodgate::Error> {
/// let governor = Governor::new(
///     MemoryStorage::new(),
///     GovernorOptions::new(100.0, 500),
/// )?;
///
/// governor.register(Rule::get("/api/search").cost(5))?;
///
/// let decision = governor
///     .allow("tenant-1", &Method::GET, "/api/search", &HeaderMap::new())
///     .await?;
///
/// assert!(decision.is_allowed());
/// assert_eq!(decision.remaining(), 495);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Governor<S, T: TimeSource = SystemTimeSource> {
    storage: S,
    table: RwLock<RuleTable>,
    bucket: TokenBucket,
    max_cas_attempts: u32,
    time_source: T,
}

impl<S: AtomicStorage> Governor<S> {
    /// Creates a governor over `storage` using the system clock.
    ///
    /// Fails with [`Error::Config`] when the options are invalid; nothing
    /// is ever rejected for configuration reasons at
    /// [`allow`](Governor::allow) time.
    #[inline]
    pub fn new(storage: S, options: GovernorOptions) -> Result<Self, Error> {
        Self::with_time_source(storage, options, SystemTimeSource)
    }
}

impl<S: AtomicStorage, T: TimeSource> Governor<S, T> {
    /// Creates a governor with a custom [`TimeSource`].
    ///
    /// This is primarily useful for deterministic tests; fleet members
    /// sharing one backend must use time sources agreeing on the epoch.
    pub fn with_time_source(storage: S, options: GovernorOptions, time_source: T) -> Result<Self, Error> {
        if options.max_cas_attempts == 0 {
            return Err(Error::config("max_cas_attempts must be >= 1"));
        }

        let bucket = TokenBucket::try_new(options.refill_rate, options.burst_capacity)
            .map_err(Error::config)?;

        Ok(Self {
            storage,
            table: RwLock::new(RuleTable::default()),
            bucket,
            max_cas_attempts: options.max_cas_attempts,
            time_source,
        })
    }

    /// Validates and registers a cost rule.
    ///
    /// Registering identical rules is permitted; duplicates only matter
    /// through the registration-order tiebreak. Writers serialize on the
    /// table lock; concurrent cost lookups never block each other.
    pub fn register(&self, rule: Rule) -> Result<(), Error> {
        let mut table = self.table.write().expect("rule table lock poisoned");
        table.insert(rule)?;
        tracing::debug!("rule registered, table holds {} rules", table.len());
        Ok(())
    }

    /// Registers a group of rules combined by a shared path prefix.
    ///
    /// # Examples
    ///
    /// ```
    /// use floodgate::{Governor, GovernorOptions, MemoryStorage, Rule};
    ///
    /// # fn main() -> Result<(), floodgate::Error> {
    /// let governor = Governor::new(
    ///     MemoryStorage::new(),
    ///     GovernorOptions::new(10.0, 100),
    /// )?;
    ///
    /// governor.group("/api/v1")
    ///     .register(Rule::get("/users").cost(2))?
    ///     .register(Rule::get("/users/{id}").cost(3))?
    ///     .register(Rule::post("/users").cost(5))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn group(&self, prefix: impl Into<String>) -> RuleGroup<'_, S, T> {
        RuleGroup {
            governor: self,
            prefix: prefix.into(),
        }
    }

    /// Prices a request without touching storage: the cost of the most
    /// specific matching rule, or `1` when no rule matches.
    pub fn resolve_cost(&self, method: &Method, path: &str, headers: &HeaderMap) -> u32 {
        let segments: SmallVec<[&str; DEFAULT_DEPTH]> =
            memchr_split_nonempty(PATH_SEPARATOR, path).collect();

        self.table
            .read()
            .expect("rule table lock poisoned")
            .resolve(method, &segments, headers)
    }

    /// Decides whether a tenant's request is admitted.
    ///
    /// On admission the resolved cost has been durably deducted from the
    /// tenant's bucket before the call returns. On denial the decision
    /// carries the estimated wait until the same request could succeed.
    ///
    /// # Errors
    ///
    /// - [`Error::Tenant`] / [`Error::Path`] for malformed input, checked
    ///   before any storage call.
    /// - [`Error::Storage`] when the backend fails; the decision was not
    ///   made and no cost was deducted.
    /// - [`Error::Contention`] when the CAS budget is exhausted; transient,
    ///   the caller may retry.
    ///
    /// Dropping the returned future between storage operations abandons
    /// the decision without deducting anything.
    pub async fn allow(
        &self,
        tenant: &str,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
    ) -> Result<Decision, Error> {
        if tenant.is_empty() {
            return Err(Error::tenant("must not be empty"));
        }
        if tenant.contains(':') {
            return Err(Error::tenant("must not contain ':'"));
        }
        if path.is_empty() || !path.starts_with('/') {
            return Err(Error::path("must start with '/'"));
        }

        let cost = self.resolve_cost(method, path, headers);
        let cost_mt = u64::from(cost) * MILLITOKENS_PER_TOKEN;

        self.admit(&bucket_key(tenant), cost_mt).await
    }

    /// Tokens added per second.
    #[inline]
    pub fn refill_rate(&self) -> f64 {
        self.bucket.refill_rate()
    }

    /// Maximum token count a bucket may hold.
    #[inline]
    pub fn burst_capacity(&self) -> u64 {
        self.bucket.burst_capacity()
    }

    /// The storage backend this governor decides against.
    #[inline]
    pub fn storage(&self) -> &S {
        &self.storage
    }
}

/// Registers rules under a shared path prefix.
///
/// Created by [`Governor::group`]; each [`register`](RuleGroup::register)
/// call prepends the group prefix to the rule's pattern before normal
/// validation and registration.
pub struct RuleGroup<'a, S, T: TimeSource = SystemTimeSource> {
    governor: &'a Governor<S, T>,
    prefix: String,
}

impl<S: AtomicStorage, T: TimeSource> RuleGroup<'_, S, T> {
    /// Registers a rule with the group prefix applied to its pattern.
    pub fn register(self, mut rule: Rule) -> Result<Self, Error> {
        rule.pattern = [self.prefix.as_str(), rule.pattern.as_str()].concat();
        self.governor.register(rule)?;
        Ok(self)
    }
}

impl<S, T: TimeSource> std::fmt::Debug for RuleGroup<'_, S, T> {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleGroup")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn options() -> GovernorOptions {
        GovernorOptions::new(10.0, 100)
    }

    #[test]
    fn it_derives_the_bucket_key() {
        assert_eq!(bucket_key("acme"), "dwrg:tb:v1:acme");
    }

    #[test]
    fn it_rejects_invalid_configuration_at_construction() {
        for bad in [
            GovernorOptions::new(0.0, 100),
            GovernorOptions::new(-1.0, 100),
            GovernorOptions::new(f64::NAN, 100),
            GovernorOptions::new(10.0, 0),
            options().with_max_cas_attempts(0),
        ] {
            let err = Governor::new(MemoryStorage::new(), bad).unwrap_err();
            assert!(matches!(err, Error::Config(_)));
        }
    }

    #[test]
    fn it_exposes_the_validated_configuration() {
        let governor = Governor::new(MemoryStorage::new(), options()).unwrap();

        assert_eq!(governor.refill_rate(), 10.0);
        assert_eq!(governor.burst_capacity(), 100);
        assert!(governor.storage().is_empty());
    }

    #[test]
    fn it_registers_grouped_rules_under_the_prefix() {
        let governor = Governor::new(MemoryStorage::new(), options()).unwrap();

        governor
            .group("/api/v1")
            .register(Rule::get("/users").cost(2))
            .unwrap()
            .register(Rule::get("/users/{id}").cost(3))
            .unwrap();

        let headers = HeaderMap::new();
        assert_eq!(governor.resolve_cost(&Method::GET, "/api/v1/users", &headers), 2);
        assert_eq!(governor.resolve_cost(&Method::GET, "/api/v1/users/7", &headers), 3);
        assert_eq!(governor.resolve_cost(&Method::GET, "/users", &headers), 1);
    }

    #[test]
    fn it_validates_grouped_rules_like_direct_ones() {
        let governor = Governor::new(MemoryStorage::new(), options()).unwrap();

        let err = governor
            .group("/api")
            .register(Rule::get("/x").cost(0))
            .unwrap_err();

        assert!(matches!(err, Error::Rule(_)));
    }

    #[tokio::test]
    async fn it_rejects_malformed_input_before_storage() {
        let governor = Governor::new(MemoryStorage::new(), options()).unwrap();
        let headers = HeaderMap::new();

        let err = governor.allow("", &Method::GET, "/x", &headers).await.unwrap_err();
        assert!(matches!(err, Error::Tenant(_)));

        let err = governor.allow("a:b", &Method::GET, "/x", &headers).await.unwrap_err();
        assert!(matches!(err, Error::Tenant(_)));

        let err = governor.allow("a", &Method::GET, "x", &headers).await.unwrap_err();
        assert!(matches!(err, Error::Path(_)));

        let err = governor.allow("a", &Method::GET, "", &headers).await.unwrap_err();
        assert!(matches!(err, Error::Path(_)));

        assert!(governor.storage().is_empty());
    }
}
