//! The fluent rule builder.

use http::Method;

const DEFAULT_COST: u32 = 1;

/// A cost rule to be registered on a governor.
///
/// A rule binds an optional HTTP method, a path pattern, and any number of
/// header equality constraints to a strictly positive request cost.
/// Construction is infallible; the pattern, cost, and headers are
/// validated when the rule is registered.
///
/// # Examples
///
/// ```
/// use floodgate::Rule;
///
/// // Every write to the search index costs 5 tokens.
/// Rule::post("/search/index").cost(5);
///
/// // Bulk exports cost 100 tokens regardless of method, but only for
/// // callers that opted into the batch tier.
/// Rule::any("/export/*")
///     .cost(100)
///     .header("x-service-tier", "batch");
/// ```
#[derive(Debug, Clone)]
pub struct Rule {
    pub(crate) method: Option<Method>,
    pub(crate) pattern: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) cost: u32,
}

impl Rule {
    /// Creates a rule matching any HTTP method, with the default cost of 1.
    pub fn any(pattern: impl Into<String>) -> Self {
        Self {
            method: None,
            pattern: pattern.into(),
            headers: Vec::new(),
            cost: DEFAULT_COST,
        }
    }

    /// Creates a rule matching HTTP GET requests for the given pattern.
    pub fn get(pattern: impl Into<String>) -> Self {
        Self::any(pattern).with_method(Method::GET)
    }

    /// Creates a rule matching HTTP POST requests for the given pattern.
    pub fn post(pattern: impl Into<String>) -> Self {
        Self::any(pattern).with_method(Method::POST)
    }

    /// Creates a rule matching HTTP PUT requests for the given pattern.
    pub fn put(pattern: impl Into<String>) -> Self {
        Self::any(pattern).with_method(Method::PUT)
    }

    /// Creates a rule matching HTTP PATCH requests for the given pattern.
    pub fn patch(pattern: impl Into<String>) -> Self {
        Self::any(pattern).with_method(Method::PATCH)
    }

    /// Creates a rule matching HTTP DELETE requests for the given pattern.
    pub fn delete(pattern: impl Into<String>) -> Self {
        Self::any(pattern).with_method(Method::DELETE)
    }

    /// Creates a rule matching HTTP HEAD requests for the given pattern.
    pub fn head(pattern: impl Into<String>) -> Self {
        Self::any(pattern).with_method(Method::HEAD)
    }

    /// Restricts the rule to a specific HTTP method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets the cost deducted for each admitted match.
    pub fn cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    /// Adds a required header equality constraint.
    ///
    /// Names are case-insensitive (canonicalized to lower-case at
    /// registration); values are compared case-sensitively. A request
    /// matches when every constrained header is present with an equal
    /// value; unconstrained request headers are ignored.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}
