//! The specificity-ordered rule table.

use std::cmp::Ordering;
use http::{HeaderMap, Method};
use crate::error::Error;
use crate::routing::Rule;
use crate::routing::pattern::RoutePattern;

/// Cost charged when no registered rule matches a request.
pub(crate) const DEFAULT_COST: u32 = 1;

/// A rule compiled and stamped with its registration sequence number.
#[derive(Debug)]
struct CompiledRule {
    method: Option<Method>,
    pattern: RoutePattern,
    headers: Vec<HeaderConstraint>,
    cost: u32,
    seq: u64,
}

#[derive(Debug)]
struct HeaderConstraint {
    /// Lower-cased header name.
    name: String,
    value: String,
}

/// An ordered sequence of rules kept in specificity-descending order.
///
/// Ordering keys, most significant first: number of header constraints,
/// method concreteness (a specific method beats any-method), path score
/// with longer literal prefixes breaking ties, and finally registration
/// order (earlier wins). Insertion is append-then-sort; the total order
/// makes the sort deterministic.
#[derive(Debug, Default)]
pub(crate) struct RuleTable {
    rules: Vec<CompiledRule>,
    next_seq: u64,
}

impl RuleTable {
    /// Validates and inserts a rule.
    pub(crate) fn insert(&mut self, rule: Rule) -> Result<(), Error> {
        if rule.cost == 0 {
            return Err(Error::rule("cost must be >= 1"));
        }

        let pattern = RoutePattern::parse(&rule.pattern)?;

        let mut headers = Vec::with_capacity(rule.headers.len());
        for (name, value) in rule.headers {
            if name.is_empty() {
                return Err(Error::rule("header name must not be empty"));
            }
            headers.push(HeaderConstraint {
                name: name.to_ascii_lowercase(),
                value,
            });
        }

        self.rules.push(CompiledRule {
            method: rule.method,
            pattern,
            headers,
            cost: rule.cost,
            seq: self.next_seq,
        });
        self.next_seq += 1;
        self.rules.sort_unstable_by(CompiledRule::cmp_specificity);

        Ok(())
    }

    /// Returns the cost of the most specific rule matching the request,
    /// or [`DEFAULT_COST`] when none matches.
    #[inline]
    pub(crate) fn resolve(&self, method: &Method, path: &[&str], headers: &HeaderMap) -> u32 {
        self.rules
            .iter()
            .find(|rule| rule.matches(method, path, headers))
            .map_or(DEFAULT_COST, |rule| rule.cost)
    }

    /// Number of registered rules.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.rules.len()
    }
}

impl CompiledRule {
    #[inline]
    fn matches(&self, method: &Method, path: &[&str], headers: &HeaderMap) -> bool {
        if self.method.as_ref().is_some_and(|m| m != method) {
            return false;
        }

        self.pattern.matches(path) && self.headers.iter().all(|constraint| {
            headers
                .get(constraint.name.as_str())
                .is_some_and(|value| value.as_bytes() == constraint.value.as_bytes())
        })
    }

    /// Specificity-descending comparator; registration order is the final,
    /// total tiebreak.
    fn cmp_specificity(a: &Self, b: &Self) -> Ordering {
        b.headers.len().cmp(&a.headers.len())
            .then_with(|| b.method_rank().cmp(&a.method_rank()))
            .then_with(|| b.pattern.score().cmp(&a.pattern.score()))
            .then_with(|| b.pattern.literal_prefix().cmp(&a.pattern.literal_prefix()))
            .then_with(|| a.seq.cmp(&b.seq))
    }

    #[inline(always)]
    fn method_rank(&self) -> u8 {
        self.method.is_some() as u8
    }
}
