//! Positions for pharmacies: the persistent cache, the resolver in front of it
//! and the geocoding provider behind it.

mod cache;
mod nominatim;
mod resolver;

pub use self::cache::GeocodeCache;
pub use self::nominatim::{Nominatim, DEFAULT_NOMINATIM_URL, DEFAULT_USER_AGENT};
pub use self::resolver::{geocode_query, EntityResolver};

use anyhow::Result;

/// A provider turning a free-text address into `(latitude, longitude)`.
///
/// `Ok(None)` means the provider had no match. Errors are never fatal to a
/// run; the resolver records them as "not found".
#[allow(async_fn_in_trait)]
pub trait Geocoder {
    async fn geocode(&self, query: &str) -> Result<Option<(f64, f64)>>;
}
