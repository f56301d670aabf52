//! Error handling tools

use std::{
    borrow::Cow,
    fmt,
    error::Error as StdError,
};

pub(crate) type BoxError = Box<
    dyn StdError
    + Send
    + Sync
>;

/// Errors produced by the governor and its storage backends.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The storage backend failed; the underlying error is surfaced
    /// unchanged for the caller to classify.
    Storage(BoxError),

    /// The compare-and-swap retry budget was exhausted without either a
    /// successful deduction or a definitive denial. Transient: the caller
    /// may retry the request.
    Contention {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// Governor configuration rejected at construction time.
    Config(Cow<'static, str>),

    /// Rule rejected at registration time.
    Rule(Cow<'static, str>),

    /// Tenant identifier rejected before touching storage.
    Tenant(Cow<'static, str>),

    /// Request path rejected before touching storage.
    Path(Cow<'static, str>),
}

impl Error {
    /// Wraps a storage backend failure.
    #[inline]
    pub fn storage(err: impl Into<BoxError>) -> Self {
        Self::Storage(err.into())
    }

    /// Creates the distinguished CAS-contention error.
    #[inline]
    pub fn contention(attempts: u32) -> Self {
        Self::Contention { attempts }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::Config(reason.into())
    }

    /// Creates a rule registration error.
    #[inline]
    pub fn rule(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::Rule(reason.into())
    }

    /// Creates a tenant validation error.
    #[inline]
    pub fn tenant(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::Tenant(reason.into())
    }

    /// Creates a request path validation error.
    #[inline]
    pub fn path(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::Path(reason.into())
    }

    /// Whether this error is the CAS-contention condition.
    #[inline]
    pub fn is_contention(&self) -> bool {
        matches!(self, Self::Contention { .. })
    }

    /// Whether retrying the same call may succeed without any change on
    /// the caller's side: contention and storage failures qualify,
    /// validation and configuration errors do not.
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Contention { .. } | Self::Storage(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "storage error: {err}"),
            Self::Contention { attempts } => {
                write!(f, "cas contention exceeded after {attempts} attempts")
            }
            Self::Config(reason) => write!(f, "invalid configuration: {reason}"),
            Self::Rule(reason) => write!(f, "invalid rule: {reason}"),
            Self::Tenant(reason) => write!(f, "invalid tenant: {reason}"),
            Self::Path(reason) => write!(f, "invalid path: {reason}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Storage(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}
