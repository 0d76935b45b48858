//! Building an observation set from the entries of one roster page.

use chrono::{NaiveDate, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::directory::RawEntry;
use crate::entity::{derive_id, ObservationSet, PharmacyRecord};
use crate::geocode::{EntityResolver, Geocoder};
use crate::openings::parse_openings;

// "Borgo Po-Torino (TO)"
static FRACTION_CITY_PROVINCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^-]+)-([^(]+)\(([^)]+)\)").expect("fraction pattern"));

// "Torino (TO)"
static CITY_PROVINCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^(]+)\(([^)]+)\)").expect("city pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PostalAddress {
    pub address: String,
    pub fraction: String,
    pub city: String,
    pub province: String,
}

/// Splits the address lines of an entry into street, sub-locality, city and
/// province. Phone lines are ignored; any other line not shaped like
/// `City (PR)` is taken as the street, the last one winning.
pub fn parse_address(lines: &[String]) -> PostalAddress {
    let mut parsed = PostalAddress::default();

    for line in lines {
        if line.contains("Tel.") {
            continue;
        }
        if let Some(c) = FRACTION_CITY_PROVINCE.captures(line) {
            parsed.fraction = c[1].to_string();
            parsed.city = c[2].to_string();
            parsed.province = c[3].to_string();
        } else if let Some(c) = CITY_PROVINCE.captures(line) {
            parsed.city = c[1].to_string();
            parsed.province = c[2].to_string();
        } else {
            parsed.address = line.to_string();
        }
    }

    PostalAddress {
        address: parsed.address.trim().to_string(),
        fraction: parsed.fraction.trim().to_string(),
        city: parsed.city.trim().to_string(),
        province: parsed.province.trim().to_string(),
    }
}

/// Turns the raw entries of one page into records keyed by identifier,
/// resolving each position through `resolver`.
///
/// Shifts are placed on `date` in `tz`. When a page lists the same name twice
/// the later entry replaces the earlier one.
pub async fn build_observation_set<G: Geocoder, Tz: TimeZone>(
    entries: Vec<RawEntry>,
    date: NaiveDate,
    tz: &Tz,
    resolver: &mut EntityResolver<G>,
    sink: &mut dyn DiagnosticSink,
) -> ObservationSet {
    let mut observations = ObservationSet::new();

    for entry in entries {
        let address = parse_address(&entry.address_lines);
        let record = PharmacyRecord {
            address: Some(address.address),
            fraction: Some(address.fraction),
            city: Some(address.city),
            province: Some(address.province),
            ..PharmacyRecord::new(&entry.name)
        };
        let id = derive_id(&record.name);

        let position = resolver.resolve(&id, &record, sink).await;
        let record = record
            .with_position(position)
            .with_openings(parse_openings(&entry.shift_lines, date, tz));

        if observations.insert(id.clone(), record).is_some() {
            sink.report(Diagnostic::DuplicateOnPage {
                id,
                name: entry.name,
            });
        }
    }

    observations
}
