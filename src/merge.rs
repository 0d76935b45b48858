//! Folding observation sets into one another.
//!
//! The accumulator (`a`) always wins: conflicting scalar values are reported
//! and the first-seen value is kept, gaps are filled from the incoming side and
//! opening lists are concatenated without deduplication. Two equal shifts seen
//! on different pages are two observations and both stay in the history.

use std::fmt::Display;

use crate::diagnostics::{Diagnostic, DiagnosticSink, Side};
use crate::entity::{EntityId, ObservationSet, PharmacyRecord};

/// Merges `b` into `a` and returns the accumulator.
pub fn merge(
    mut a: ObservationSet,
    b: ObservationSet,
    sink: &mut dyn DiagnosticSink,
) -> ObservationSet {
    merge_into(&mut a, b, sink);
    a
}

/// In-place form of [`merge`], used when folding many sets into one dataset.
pub fn merge_into(a: &mut ObservationSet, b: ObservationSet, sink: &mut dyn DiagnosticSink) {
    for (id, incoming) in b {
        match a.get_mut(&id) {
            Some(existing) => merge_record(&id, existing, incoming, sink),
            None => {
                a.insert(id, incoming);
            }
        }
    }
}

fn merge_record(
    id: &EntityId,
    a: &mut PharmacyRecord,
    b: PharmacyRecord,
    sink: &mut dyn DiagnosticSink,
) {
    if a.name != b.name {
        sink.report(Diagnostic::Conflict {
            id: id.clone(),
            field: "name",
            kept: a.name.clone(),
            discarded: b.name,
        });
    }

    merge_field(id, "address", &mut a.address, b.address, sink);
    merge_field(id, "fraction", &mut a.fraction, b.fraction, sink);
    merge_field(id, "city", &mut a.city, b.city, sink);
    merge_field(id, "province", &mut a.province, b.province, sink);
    merge_field(id, "latitude", &mut a.latitude, b.latitude, sink);
    merge_field(id, "longitude", &mut a.longitude, b.longitude, sink);

    a.openings.extend(b.openings);
}

fn merge_field<T: PartialEq + Display>(
    id: &EntityId,
    field: &'static str,
    a: &mut Option<T>,
    b: Option<T>,
    sink: &mut dyn DiagnosticSink,
) {
    let Some(other) = b else {
        if a.is_some() {
            sink.report(Diagnostic::MissingValue {
                id: id.clone(),
                field,
                missing_on: Side::Incoming,
            });
        }
        return;
    };

    match a {
        Some(kept) => {
            if *kept != other {
                sink.report(Diagnostic::Conflict {
                    id: id.clone(),
                    field,
                    kept: kept.to_string(),
                    discarded: other.to_string(),
                });
            }
        }
        None => {
            *a = Some(other);
            sink.report(Diagnostic::MissingValue {
                id: id.clone(),
                field,
                missing_on: Side::Accumulator,
            });
        }
    }
}
