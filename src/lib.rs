pub mod aggregate;
pub mod diagnostics;
pub mod directory;
pub mod entity;
pub mod environment;
pub mod geocode;
pub mod logging;
pub mod merge;
pub mod openings;
pub mod roster;
pub mod store;

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_GEOCODE: &str = "geocode";
pub const TARGET_MERGE: &str = "merge";

pub use aggregate::{aggregate, run, RunSummary};
pub use entity::{derive_id, Coordinate, EntityId, ObservationSet, Opening, PharmacyRecord};
pub use geocode::{EntityResolver, GeocodeCache, Geocoder};
pub use merge::merge;
