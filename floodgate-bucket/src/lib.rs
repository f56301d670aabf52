//! Floodgate Token Bucket
//!
//! Token-bucket state machine primitives shared by the Floodgate governor:
//! packed per-tenant state, lazy refill arithmetic, cooldown estimation,
//! and a pluggable time source.
//!
//! Everything in this crate is synchronous, integer-only math. The governor
//! crate drives these primitives through a compare-and-swap loop against an
//! atomic storage backend; nothing here touches storage, clocks the caller
//! did not provide, or floating point outside of configuration parsing.

mod bucket;

pub use bucket::{
    BucketState,
    TokenBucket,
    TimeSource,
    SystemTimeSource,
    ManualTimeSource,
    MILLITOKENS_PER_TOKEN,
};
