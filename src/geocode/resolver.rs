use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::entity::{Coordinate, CoordinatePair, EntityId, PharmacyRecord, NOT_FOUND};

use super::{GeocodeCache, Geocoder};

/// Builds the free-text query sent to the geocoder: the non-empty address
/// parts, street first, separated by single spaces.
pub fn geocode_query(record: &PharmacyRecord) -> String {
    [
        &record.address,
        &record.fraction,
        &record.city,
        &record.province,
    ]
    .into_iter()
    .filter_map(|part| part.as_deref())
    .map(str::trim)
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

/// Looks up positions through the cache, falling back to the geocoder.
///
/// The resolver owns the cache for the duration of a run; the driver takes it
/// back with [`EntityResolver::into_cache`] to persist it.
pub struct EntityResolver<G> {
    geocoder: G,
    cache: GeocodeCache,
}

impl<G: Geocoder> EntityResolver<G> {
    pub fn new(geocoder: G, cache: GeocodeCache) -> Self {
        EntityResolver { geocoder, cache }
    }

    pub fn cache(&self) -> &GeocodeCache {
        &self.cache
    }

    pub fn into_cache(self) -> GeocodeCache {
        self.cache
    }

    /// Returns the position of `record`, querying the geocoder at most once per
    /// identifier across runs. Whatever the outcome, it is in the cache when
    /// this returns.
    pub async fn resolve(
        &mut self,
        id: &EntityId,
        record: &PharmacyRecord,
        sink: &mut dyn DiagnosticSink,
    ) -> CoordinatePair {
        if let Some(position) = self.cache.lookup(id) {
            sink.report(Diagnostic::CacheHit { id: id.clone() });
            return position;
        }

        let query = geocode_query(record);
        sink.report(Diagnostic::CacheMiss {
            id: id.clone(),
            query: query.clone(),
        });

        let position = match self.geocoder.geocode(&query).await {
            Ok(Some((latitude, longitude))) => {
                (Coordinate::Known(latitude), Coordinate::Known(longitude))
            }
            Ok(None) => NOT_FOUND,
            Err(err) => {
                sink.report(Diagnostic::GeocodeFailed {
                    id: id.clone(),
                    error: format!("{:#}", err),
                });
                NOT_FOUND
            }
        };

        self.cache.store(id.clone(), position);
        position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::derive_id;
    use anyhow::{anyhow, Result};
    use std::cell::RefCell;

    /// Answers from a fixed table and remembers every query.
    struct ScriptedGeocoder {
        answers: Vec<(&'static str, (f64, f64))>,
        fail: bool,
        queries: RefCell<Vec<String>>,
    }

    impl ScriptedGeocoder {
        fn new(answers: Vec<(&'static str, (f64, f64))>) -> Self {
            ScriptedGeocoder {
                answers,
                fail: false,
                queries: RefCell::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            ScriptedGeocoder {
                fail: true,
                ..Self::new(Vec::new())
            }
        }

        fn calls(&self) -> usize {
            self.queries.borrow().len()
        }
    }

    impl Geocoder for &ScriptedGeocoder {
        async fn geocode(&self, query: &str) -> Result<Option<(f64, f64)>> {
            self.queries.borrow_mut().push(query.to_string());
            if self.fail {
                return Err(anyhow!("timed out"));
            }
            Ok(self
                .answers
                .iter()
                .find(|(q, _)| *q == query)
                .map(|(_, position)| *position))
        }
    }

    fn pharmacy(name: &str) -> PharmacyRecord {
        PharmacyRecord {
            address: Some("Via Roma 1".to_string()),
            fraction: Some(String::new()),
            city: Some("Torino".to_string()),
            province: Some("TO".to_string()),
            ..PharmacyRecord::new(name)
        }
    }

    #[test]
    fn test_query_skips_empty_parts() {
        assert_eq!(geocode_query(&pharmacy("Farmacia A")), "Via Roma 1 Torino TO");

        let mut record = pharmacy("Farmacia A");
        record.fraction = Some("Borgo Po".to_string());
        record.address = None;
        assert_eq!(geocode_query(&record), "Borgo Po Torino TO");
    }

    #[tokio::test]
    async fn test_miss_queries_once_then_hits() {
        let geocoder = ScriptedGeocoder::new(vec![("Via Roma 1 Torino TO", (45.07, 7.68))]);
        let mut resolver = EntityResolver::new(&geocoder, GeocodeCache::new());
        let record = pharmacy("Farmacia A");
        let id = derive_id(&record.name);
        let mut diagnostics = Vec::new();

        let first = resolver.resolve(&id, &record, &mut diagnostics).await;
        let second = resolver.resolve(&id, &record, &mut diagnostics).await;

        assert_eq!(first, (Coordinate::Known(45.07), Coordinate::Known(7.68)));
        assert_eq!(second, first);
        assert_eq!(geocoder.calls(), 1);
        assert!(matches!(diagnostics[0], Diagnostic::CacheMiss { .. }));
        assert!(matches!(diagnostics[1], Diagnostic::CacheHit { .. }));
    }

    #[tokio::test]
    async fn test_cached_not_found_is_never_requeried() {
        let geocoder = ScriptedGeocoder::new(vec![("Via Roma 1 Torino TO", (45.07, 7.68))]);
        let record = pharmacy("Farmacia A");
        let id = derive_id(&record.name);
        let mut cache = GeocodeCache::new();
        cache.store(id.clone(), NOT_FOUND);
        let mut resolver = EntityResolver::new(&geocoder, cache);

        let position = resolver.resolve(&id, &record, &mut Vec::new()).await;

        assert_eq!(position, NOT_FOUND);
        assert_eq!(geocoder.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_match_is_cached_as_not_found() {
        let geocoder = ScriptedGeocoder::new(Vec::new());
        let mut resolver = EntityResolver::new(&geocoder, GeocodeCache::new());
        let record = pharmacy("Farmacia A");
        let id = derive_id(&record.name);

        assert_eq!(resolver.resolve(&id, &record, &mut Vec::new()).await, NOT_FOUND);
        assert_eq!(resolver.cache().lookup(&id), Some(NOT_FOUND));
    }

    #[tokio::test]
    async fn test_provider_error_is_swallowed() {
        let geocoder = ScriptedGeocoder::failing();
        let mut resolver = EntityResolver::new(&geocoder, GeocodeCache::new());
        let record = pharmacy("Farmacia A");
        let id = derive_id(&record.name);
        let mut diagnostics = Vec::new();

        let position = resolver.resolve(&id, &record, &mut diagnostics).await;
        resolver.resolve(&id, &record, &mut diagnostics).await;

        assert_eq!(position, NOT_FOUND);
        assert_eq!(geocoder.calls(), 1);
        assert!(diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::GeocodeFailed { error, .. } if error.contains("timed out"))));
        assert_eq!(resolver.into_cache().lookup(&id), Some(NOT_FOUND));
    }
}
