//! Structured events raised while building and merging observation sets.
//!
//! None of these stop a run. The core hands them to a [`DiagnosticSink`] and
//! carries on; what happens to them (logging, counting, collecting for a test)
//! is up to the sink.

use std::fmt;
use tracing::{debug, info, warn};

use crate::entity::EntityId;
use crate::{TARGET_GEOCODE, TARGET_MERGE};

/// Which side of a merge is missing a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The accumulator (first seen) had no value and took the other one.
    Accumulator,
    /// The incoming set had no value; the accumulator kept its own.
    Incoming,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Accumulator => write!(f, "a"),
            Side::Incoming => write!(f, "b"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Both sides hold a value for `field` and they differ; `kept` wins.
    Conflict {
        id: EntityId,
        field: &'static str,
        kept: String,
        discarded: String,
    },
    /// Only one side holds a value for `field`.
    MissingValue {
        id: EntityId,
        field: &'static str,
        missing_on: Side,
    },
    /// The same identifier appeared twice on a single page.
    DuplicateOnPage { id: EntityId, name: String },
    /// No cache entry, the geocoder was queried.
    CacheMiss { id: EntityId, query: String },
    CacheHit { id: EntityId },
    /// The geocoder failed; the entry is stored as not found.
    GeocodeFailed { id: EntityId, error: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Conflict {
                id,
                field,
                kept,
                discarded,
            } => write!(
                f,
                "Inconsistent values in id {} on key {}: \"{}\" != \"{}\" (keeping the first one)",
                id, field, kept, discarded
            ),
            Diagnostic::MissingValue {
                id,
                field,
                missing_on,
            } => write!(
                f,
                "Inconsistent values in id {} on key {}: {} has no value",
                id, field, missing_on
            ),
            Diagnostic::DuplicateOnPage { id, name } => {
                write!(f, "Duplicate entry for {} ({}) on one page, keeping the last", name, id)
            }
            Diagnostic::CacheMiss { id, query } => {
                write!(f, "Getting coords for {} from address: {}", id, query)
            }
            Diagnostic::CacheHit { id } => write!(f, "Cached coords for {}", id),
            Diagnostic::GeocodeFailed { id, error } => {
                write!(f, "Geocoding failed for {}: {}", id, error)
            }
        }
    }
}

pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Collects everything, mostly useful in tests.
impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Running totals of what went through a [`LogSink`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticCounts {
    pub conflicts: usize,
    pub missing_values: usize,
    pub duplicates: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub geocode_failures: usize,
}

/// Emits every diagnostic as a tracing event and keeps counts for the run summary.
#[derive(Debug, Default)]
pub struct LogSink {
    counts: DiagnosticCounts,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> DiagnosticCounts {
        self.counts
    }
}

impl DiagnosticSink for LogSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::Conflict { .. } => {
                self.counts.conflicts += 1;
                warn!(target: TARGET_MERGE, "{}", diagnostic);
            }
            Diagnostic::MissingValue { .. } => {
                self.counts.missing_values += 1;
                warn!(target: TARGET_MERGE, "{}", diagnostic);
            }
            Diagnostic::DuplicateOnPage { .. } => {
                self.counts.duplicates += 1;
                warn!(target: TARGET_MERGE, "{}", diagnostic);
            }
            Diagnostic::CacheMiss { .. } => {
                self.counts.cache_misses += 1;
                info!(target: TARGET_GEOCODE, "{}", diagnostic);
            }
            Diagnostic::CacheHit { .. } => {
                self.counts.cache_hits += 1;
                debug!(target: TARGET_GEOCODE, "{}", diagnostic);
            }
            Diagnostic::GeocodeFailed { .. } => {
                self.counts.geocode_failures += 1;
                warn!(target: TARGET_GEOCODE, "{}", diagnostic);
            }
        }
    }
}
