//! Path pattern compilation and matching.

use std::fmt;
use smallvec::SmallVec;
use crate::error::Error;
use crate::utils::str::memchr_split_nonempty;

const OPEN_BRACKET: char = '{';
const CLOSE_BRACKET: char = '}';
const WILDCARD: &str = "*";

pub(crate) const PATH_SEPARATOR: u8 = b'/';
pub(crate) const DEFAULT_DEPTH: usize = 8;

const LITERAL_SCORE: u32 = 2;
const PARAM_SCORE: u32 = 1;

/// One compiled pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    /// Matches a path segment byte-for-byte (case-sensitive).
    Literal(Box<str>),

    /// `{name}`: matches any single non-empty path segment.
    Param(Box<str>),
}

/// How the pattern treats path segments beyond its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tail {
    /// The path must end where the pattern does.
    Exact,

    /// Trailing `/`: any path beginning with these segments matches.
    Prefix,

    /// Trailing `*`: one or more further segments must follow.
    Wildcard,
}

/// A compiled path template: literal segments, `{name}` parameter
/// segments, and an optional trailing wildcard or prefix marker.
#[derive(Debug, Clone)]
pub(crate) struct RoutePattern {
    segments: SmallVec<[Segment; DEFAULT_DEPTH]>,
    tail: Tail,
    score: u32,
    literal_prefix: u32,
}

impl RoutePattern {
    /// Compiles a pattern.
    ///
    /// Rejected shapes: patterns not starting with `/`, a wildcard
    /// anywhere but the final segment, unnamed `{}` parameters, and
    /// patterns mixing parameter segments with a wildcard tail.
    pub(crate) fn parse(pattern: &str) -> Result<Self, Error> {
        if !pattern.starts_with('/') {
            return Err(Error::rule("pattern must start with '/'"));
        }

        let parts: SmallVec<[&str; DEFAULT_DEPTH]> =
            memchr_split_nonempty(PATH_SEPARATOR, pattern).collect();

        let mut segments = SmallVec::new();
        let mut tail = if pattern.ends_with('/') { Tail::Prefix } else { Tail::Exact };

        for (i, &part) in parts.iter().enumerate() {
            if part == WILDCARD {
                if i + 1 != parts.len() {
                    return Err(Error::rule("wildcard must be the final segment"));
                }
                tail = Tail::Wildcard;
            } else if is_param_segment(part) {
                let name = &part[1..part.len() - 1];
                if name.is_empty() {
                    return Err(Error::rule("parameter segment must be named"));
                }
                segments.push(Segment::Param(name.into()));
            } else {
                segments.push(Segment::Literal(part.into()));
            }
        }

        if tail == Tail::Wildcard && segments.iter().any(|s| matches!(s, Segment::Param(_))) {
            return Err(Error::rule("parameter segments cannot be combined with a wildcard tail"));
        }

        let score = segments.iter().map(|s| match s {
            Segment::Literal(_) => LITERAL_SCORE,
            Segment::Param(_) => PARAM_SCORE,
        }).sum();

        let literal_prefix = segments.iter()
            .take_while(|s| matches!(s, Segment::Literal(_)))
            .count() as u32;

        Ok(Self { segments, tail, score, literal_prefix })
    }

    /// Tests the pattern against an already-split request path.
    #[inline]
    pub(crate) fn matches(&self, path: &[&str]) -> bool {
        let matched = match self.tail {
            Tail::Exact => path.len() == self.segments.len(),
            Tail::Prefix => path.len() >= self.segments.len(),
            Tail::Wildcard => path.len() > self.segments.len(),
        };

        matched && self.segments.iter().zip(path).all(|(segment, part)| match segment {
            Segment::Literal(literal) => literal.as_ref() == *part,
            Segment::Param(_) => true,
        })
    }

    /// Path score: literal segments count 2, parameters 1, the wildcard
    /// tail 0.
    #[inline(always)]
    pub(crate) fn score(&self) -> u32 {
        self.score
    }

    /// Number of leading literal segments, used to break score ties.
    #[inline(always)]
    pub(crate) fn literal_prefix(&self) -> u32 {
        self.literal_prefix
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() && self.tail != Tail::Wildcard {
            return f.write_str("/");
        }

        for segment in self.segments.iter() {
            match segment {
                Segment::Literal(literal) => write!(f, "/{literal}")?,
                Segment::Param(name) => write!(f, "/{{{name}}}")?,
            }
        }

        match self.tail {
            Tail::Exact => Ok(()),
            Tail::Prefix => f.write_str("/"),
            Tail::Wildcard => f.write_str("/*"),
        }
    }
}

#[inline(always)]
fn is_param_segment(segment: &str) -> bool {
    segment.starts_with(OPEN_BRACKET) &&
    segment.ends_with(CLOSE_BRACKET)
}
