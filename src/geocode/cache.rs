use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::entity::{CoordinatePair, EntityId};
use crate::store::{self, Layout};
use crate::TARGET_GEOCODE;

/// Identifier to position mapping, kept between runs.
///
/// An entry means the identifier was looked up once; its components may be
/// [`crate::Coordinate::NotFound`]. Entries are never re-resolved while they
/// exist, so a corrected upstream address is only picked up after the entry is
/// removed from the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeocodeCache {
    entries: BTreeMap<EntityId, CoordinatePair>,
}

impl GeocodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(entries: BTreeMap<EntityId, CoordinatePair>) -> Self {
        GeocodeCache { entries }
    }

    pub fn lookup(&self, id: &EntityId) -> Option<CoordinatePair> {
        self.entries.get(id).copied()
    }

    pub fn store(&mut self, id: EntityId, position: CoordinatePair) {
        self.entries.insert(id, position);
    }

    pub fn snapshot(&self) -> &BTreeMap<EntityId, CoordinatePair> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Loads the snapshot written by a previous run.
    ///
    /// A missing or unreadable snapshot gives an empty cache: the only cost is
    /// that every pharmacy gets geocoded again.
    pub async fn load(path: &Path) -> Self {
        match store::read_json::<BTreeMap<EntityId, CoordinatePair>>(path).await {
            Ok(Some(entries)) => {
                info!(target: TARGET_GEOCODE, "Loaded {} cached positions from {}", entries.len(), path.display());
                GeocodeCache { entries }
            }
            Ok(None) => {
                info!(target: TARGET_GEOCODE, "No geocode cache at {}, starting empty", path.display());
                GeocodeCache::new()
            }
            Err(err) => {
                warn!(target: TARGET_GEOCODE, "Ignoring unreadable geocode cache: {:#}", err);
                GeocodeCache::new()
            }
        }
    }

    /// Overwrites the snapshot at `path` with the current entries.
    pub async fn persist(&self, path: &Path) -> Result<()> {
        store::write_json(path, &self.entries, Layout::Compact).await?;
        info!(target: TARGET_GEOCODE, "Saved {} cached positions to {}", self.entries.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{derive_id, Coordinate, NOT_FOUND};
    use std::path::PathBuf;

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("farmacie_cache_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn test_store_overwrites() {
        let mut cache = GeocodeCache::new();
        let id = derive_id("Farmacia A");
        assert_eq!(cache.lookup(&id), None);

        cache.store(id.clone(), NOT_FOUND);
        assert_eq!(cache.lookup(&id), Some(NOT_FOUND));

        let found = (Coordinate::Known(45.0), Coordinate::Known(7.6));
        cache.store(id.clone(), found);
        cache.store(id.clone(), found);
        assert_eq!(cache.lookup(&id), Some(found));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_persist_and_reload() {
        let path = tmp_path("roundtrip.json");
        let mut cache = GeocodeCache::new();
        cache.store(
            derive_id("Farmacia A"),
            (Coordinate::Known(45.0703), Coordinate::Known(7.6869)),
        );
        cache.store(derive_id("Farmacia B"), NOT_FOUND);

        cache.persist(&path).await.unwrap();
        let reloaded = GeocodeCache::load(&path).await;

        assert_eq!(reloaded, cache);
        assert_eq!(reloaded.lookup(&derive_id("Farmacia B")), Some(NOT_FOUND));
    }

    #[tokio::test]
    async fn test_missing_or_corrupt_snapshot_gives_empty_cache() {
        let missing = tmp_path("missing.json");
        assert!(GeocodeCache::load(&missing).await.is_empty());

        let corrupt = tmp_path("corrupt.json");
        std::fs::write(&corrupt, "[1, 2").unwrap();
        assert!(GeocodeCache::load(&corrupt).await.is_empty());

        let wrong_shape = tmp_path("wrong_shape.json");
        std::fs::write(&wrong_shape, r#"{"abc": "not a pair"}"#).unwrap();
        assert!(GeocodeCache::load(&wrong_shape).await.is_empty());
    }

    #[tokio::test]
    async fn test_loads_legacy_snapshot() {
        let path = tmp_path("legacy.json");
        std::fs::write(
            &path,
            r#"{"dd869ab417a56e376d2b0b2d727e6be147a2b731": [45.07, 7.68], "d2d5ebb08c025b5d0fd3a51b3ebad946662921eb": ["", ""]}"#,
        )
        .unwrap();

        let cache = GeocodeCache::load(&path).await;
        assert_eq!(
            cache.lookup(&derive_id("Farmacia A")),
            Some((Coordinate::Known(45.07), Coordinate::Known(7.68)))
        );
        assert_eq!(cache.lookup(&derive_id("Farmacia B")), Some(NOT_FOUND));
    }
}
