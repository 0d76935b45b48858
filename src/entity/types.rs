use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

/// Content-derived key of a pharmacy, see [`crate::entity::derive_id`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        EntityId(s)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId(s.to_string())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One component of a geocoded position.
///
/// `NotFound` records that the provider was asked and had no answer, which is
/// different from a position that was never looked up (no cache entry at all).
/// It is written as `""` on disk; `null` and numeric strings are accepted when
/// reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coordinate {
    Known(f64),
    NotFound,
}

impl Coordinate {
    pub fn value(&self) -> Option<f64> {
        match self {
            Coordinate::Known(v) => Some(*v),
            Coordinate::NotFound => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Coordinate::Known(_))
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coordinate::Known(v) => write!(f, "{}", v),
            Coordinate::NotFound => Ok(()),
        }
    }
}

impl Serialize for Coordinate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Coordinate::Known(v) => serializer.serialize_f64(*v),
            Coordinate::NotFound => serializer.serialize_str(""),
        }
    }
}

struct CoordinateVisitor;

impl<'de> Visitor<'de> for CoordinateVisitor {
    type Value = Coordinate;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number, a numeric string, an empty string or null")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Coordinate, E> {
        Ok(Coordinate::Known(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Coordinate, E> {
        Ok(Coordinate::Known(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Coordinate, E> {
        Ok(Coordinate::Known(v as f64))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Coordinate, E> {
        let v = v.trim();
        if v.is_empty() {
            return Ok(Coordinate::NotFound);
        }
        v.parse::<f64>()
            .map(Coordinate::Known)
            .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Coordinate, E> {
        Ok(Coordinate::NotFound)
    }

    fn visit_none<E: de::Error>(self) -> Result<Coordinate, E> {
        Ok(Coordinate::NotFound)
    }
}

impl<'de> Deserialize<'de> for Coordinate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(CoordinateVisitor)
    }
}

/// `(latitude, longitude)` as stored in the geocode cache.
pub type CoordinatePair = (Coordinate, Coordinate);

pub const NOT_FOUND: CoordinatePair = (Coordinate::NotFound, Coordinate::NotFound);

/// One duty shift, `[open, close]` in Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Opening(pub i64, pub i64);

impl Opening {
    pub fn open(&self) -> i64 {
        self.0
    }

    pub fn close(&self) -> i64 {
        self.1
    }
}

/// A pharmacy on the duty roster as it appears in the final dataset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PharmacyRecord {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    // Sub-locality of the municipality
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraction: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<Coordinate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<Coordinate>,

    #[serde(default)]
    pub openings: Vec<Opening>,
}

impl PharmacyRecord {
    pub fn new(name: &str) -> Self {
        PharmacyRecord {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_openings(mut self, openings: Vec<Opening>) -> Self {
        self.openings = openings;
        self
    }

    pub fn with_position(mut self, (latitude, longitude): CoordinatePair) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }
}

/// Pharmacies keyed by identifier, as produced by one fetch or accumulated
/// across many of them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObservationSet(BTreeMap<EntityId, PharmacyRecord>);

impl ObservationSet {
    pub fn new() -> Self {
        ObservationSet(BTreeMap::new())
    }

    /// Inserts a record, returning the one previously held under `id`.
    pub fn insert(&mut self, id: EntityId, record: PharmacyRecord) -> Option<PharmacyRecord> {
        self.0.insert(id, record)
    }

    pub fn get(&self, id: &EntityId) -> Option<&PharmacyRecord> {
        self.0.get(id)
    }

    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut PharmacyRecord> {
        self.0.get_mut(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, EntityId, PharmacyRecord> {
        self.0.iter()
    }

    pub fn opening_count(&self) -> usize {
        self.0.values().map(|r| r.openings.len()).sum()
    }
}

impl IntoIterator for ObservationSet {
    type Item = (EntityId, PharmacyRecord);
    type IntoIter = btree_map::IntoIter<EntityId, PharmacyRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(EntityId, PharmacyRecord)> for ObservationSet {
    fn from_iter<I: IntoIterator<Item = (EntityId, PharmacyRecord)>>(iter: I) -> Self {
        ObservationSet(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_accepts_legacy_forms() {
        let pair: CoordinatePair = serde_json::from_str(r#"["", null]"#).unwrap();
        assert_eq!(pair, NOT_FOUND);

        let pair: CoordinatePair = serde_json::from_str(r#"[45.07, "7.68"]"#).unwrap();
        assert_eq!(pair, (Coordinate::Known(45.07), Coordinate::Known(7.68)));

        assert!(serde_json::from_str::<Coordinate>(r#""north""#).is_err());
    }

    #[test]
    fn test_coordinate_not_found_written_as_empty_string() {
        let json = serde_json::to_string(&(Coordinate::Known(1.5), Coordinate::NotFound)).unwrap();
        assert_eq!(json, r#"[1.5,""]"#);
    }

    #[test]
    fn test_coordinate_display() {
        assert_eq!(Coordinate::Known(45.07).to_string(), "45.07");
        assert_eq!(Coordinate::NotFound.to_string(), "");
    }

    #[test]
    fn test_record_serialization_shape() {
        let record = PharmacyRecord {
            address: Some("Via Roma 1".to_string()),
            fraction: Some(String::new()),
            city: Some("Torino".to_string()),
            province: Some("TO".to_string()),
            ..PharmacyRecord::new("Farmacia A")
        }
        .with_position(NOT_FOUND)
        .with_openings(vec![Opening(100, 200)]);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["name"], "Farmacia A");
        assert_eq!(value["fraction"], "");
        assert_eq!(value["latitude"], "");
        assert_eq!(value["openings"], serde_json::json!([[100, 200]]));

        let back: PharmacyRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_missing_fields_deserialize_as_absent() {
        let record: PharmacyRecord = serde_json::from_str(r#"{"name": "X"}"#).unwrap();
        assert_eq!(record, PharmacyRecord::new("X"));
        assert!(record.latitude.is_none());
    }
}
