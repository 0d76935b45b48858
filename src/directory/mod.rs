//! The published directory: a tree of region and province pages leading to
//! one roster page per municipality and day.
//!
//! Everything network- or markup-specific sits behind [`DirectorySource`] so
//! the traversal and the aggregation can run against an in-memory directory.

mod client;
mod parser;
mod traversal;
mod types;

pub use self::types::*;

pub use self::client::{create_http_client, HttpDirectory, Retrying};
pub use self::parser::{parse_directory_links, parse_roster};
pub use self::traversal::{classify, enumerate_municipalities};

use anyhow::Result;

#[allow(async_fn_in_trait)]
pub trait DirectorySource {
    /// Links listed on a region or province page.
    async fn node_links(&self, url: &str) -> Result<Vec<DirectoryLink>>;

    /// Pharmacies on duty in `code` for `window`.
    async fn roster(&self, code: &MunicipalityCode, window: DayWindow) -> Result<Vec<RawEntry>>;
}
