//! Route patterns, rules, and cost resolution.
//!
//! A [`Rule`] binds an HTTP method, a path pattern, and an optional set of
//! header equality constraints to an integer request cost. Rules are kept
//! in a flat table sorted by specificity; resolution scans it in order and
//! takes the first match.
//!
//! ## Why a sorted scan and not a prefix tree
//!
//! Rule tables hold tens to low hundreds of entries and are read-dominated:
//! a contiguous, specificity-sorted `Vec` keeps entries hot in cache, makes
//! the "most specific match wins" semantics a one-line scan, and costs a
//! single sort on the rare registration path. A tree buys nothing at this
//! scale and would obscure the ordering rules.

pub use rule::Rule;
pub(crate) use table::RuleTable;

pub(crate) mod pattern;
pub(crate) mod table;
mod rule;
