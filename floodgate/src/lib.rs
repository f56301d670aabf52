//! # Floodgate
//!
//! > Distributed weighted admission control for request-handling fleets
//! > sharing one atomic key-value store.
//!
//! Floodgate decides, for each incoming request from a tenant, whether
//! the request is permitted — and when it is not, how long the caller
//! should wait before retrying. Requests are priced through a
//! specificity-ordered rule table and charged against a per-tenant token
//! bucket held in the shared store, so a whole fleet of embedding nodes
//! enforces one global quota with a strict no-overshoot guarantee.
//!
//! ## Features
//! * Weighted costs per route: literal, `{param}`, wildcard, and prefix
//!   patterns plus header constraints, most specific rule wins
//! * Global per-tenant token buckets over any linearizable CAS-capable
//!   backend; an in-memory backend ships for tests and single nodes
//! * Exactly-once accounting under concurrency from any number of nodes
//! * Cooldown estimates on denial, accurate to refill granularity
//! * Runtime-agnostic async: the only awaits are on the storage backend
//!
//! ## Example
//! ```
//! use floodgate::{Governor, GovernorOptions, MemoryStorage, Rule};
//! use http::{HeaderMap, Method};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), floodgate::Error> {
//! // 100 tokens/s refill, bursts up to 500 tokens, shared by all tenants.
//! let governor = Governor::new(
//!     MemoryStorage::new(),
//!     GovernorOptions::new(100.0, 500),
//! )?;
//!
//! governor.register(Rule::get("/api/search").cost(5))?;
//! governor.register(Rule::any("/api/admin/*").cost(100))?;
//!
//! let decision = governor
//!     .allow("tenant-1", &Method::GET, "/api/search", &HeaderMap::new())
//!     .await?;
//!
//! if decision.is_denied() {
//!     // Surface decision.retry_after() to the client, e.g. as Retry-After.
//! }
//! # Ok(())
//! # }
//! ```

pub(crate) mod utils;

pub mod error;
pub mod governor;
pub mod routing;
pub mod storage;

pub use crate::{
    error::Error,
    governor::{
        bucket_key,
        Decision,
        Governor,
        GovernorOptions,
        RuleGroup,
        BUCKET_KEY_PREFIX,
        DEFAULT_MAX_CAS_ATTEMPTS,
    },
    routing::Rule,
    storage::{AtomicStorage, MemoryStorage},
};

pub use floodgate_bucket::{ManualTimeSource, SystemTimeSource, TimeSource};
