//! Half-open character spans.
//!
//! A [`Span`] is the only positional information stand-off annotations
//! carry. Everything the enclosure forest knows about nesting is derived
//! from the three relations defined here: [`Span::encloses`],
//! [`Span::overlaps`] and [`Span::merge`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned when a pair of offsets cannot form a [`Span`].
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SpanError {
    #[error("span start {start} is after its end {end}")]
    Inverted { start: i64, end: i64 },

    #[error("span offsets must not be negative, got ({start}, {end})")]
    Negative { start: i64, end: i64 },
}

/// A half-open `[start, end)` range of character offsets.
///
/// The invariant `start <= end` is enforced at construction, so every
/// `Span` in the system is well formed. Zero-length spans are legal.
///
/// Serialises as a two-element array `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "(i64, i64)", into = "(usize, usize)")]
pub struct Span {
    start: usize,
    end: usize,
}

impl Span {
    /// Build a span from raw record offsets.
    pub fn new(start: i64, end: i64) -> Result<Self, SpanError> {
        if start < 0 || end < 0 {
            return Err(SpanError::Negative { start, end });
        }
        if start > end {
            return Err(SpanError::Inverted { start, end });
        }
        Ok(Self {
            start: start as usize,
            end: end as usize,
        })
    }

    /// Build a span from offsets already known to be ordered.
    ///
    /// The arguments are swapped if given the wrong way round.
    pub fn from_range(a: usize, b: usize) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of characters covered.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True for zero-length (degenerate) spans.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// `self` covers all of `other`. Every span encloses itself.
    pub fn encloses(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// The two spans share at least one character but neither encloses
    /// the other.
    pub fn overlaps(&self, other: &Span) -> bool {
        let intersect = self.start < other.end && other.start < self.end;
        intersect && !self.encloses(other) && !other.encloses(self)
    }

    /// Smallest span covering both.
    pub fn merge(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Merge a sequence of spans; `None` when the sequence is empty.
    pub fn merge_all<'a>(spans: impl IntoIterator<Item = &'a Span>) -> Option<Span> {
        spans.into_iter().fold(None, |acc: Option<Span>, s| match acc {
            Some(a) => Some(a.merge(s)),
            None => Some(*s),
        })
    }

    /// Sort key placing earlier spans first and, on a tie, the widest first.
    pub fn first_widest_key(&self) -> (usize, std::cmp::Reverse<usize>) {
        (self.start, std::cmp::Reverse(self.end))
    }
}

impl TryFrom<(i64, i64)> for Span {
    type Error = SpanError;

    fn try_from((start, end): (i64, i64)) -> Result<Self, Self::Error> {
        Span::new(start, end)
    }
}

impl From<Span> for (usize, usize) {
    fn from(span: Span) -> Self {
        (span.start, span.end)
    }
}

/// Formats as `[start,end)`.
impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{})", self.start, self.end)
    }
}

// --- tests -------------------------------------------------------------------
