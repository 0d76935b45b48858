//! Type definitions for the directory module.

use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::fmt;
use tokio::time::Duration;

/// A link found on a region or province page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryLink {
    pub link: String,
    pub name: String,
}

/// Numeric code of a municipality, as it appears in `comune.asp?cod=`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct MunicipalityCode(String);

impl MunicipalityCode {
    pub fn new(code: &str) -> Self {
        MunicipalityCode(code.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MunicipalityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A node of the region → province → municipality tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryNode {
    /// A page listing further links.
    Intermediate(String),
    /// A municipality, the unit the duty roster is published for.
    Municipality(MunicipalityCode),
}

/// Which day of the two-day roster a page covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayWindow {
    Today,
    Tomorrow,
}

impl DayWindow {
    /// Value of the `domani` query parameter.
    pub fn query_flag(self) -> u8 {
        match self {
            DayWindow::Today => 0,
            DayWindow::Tomorrow => 1,
        }
    }

    /// The calendar day the window covers, given today's date.
    pub fn date(self, today: NaiveDate) -> NaiveDate {
        match self {
            DayWindow::Today => today,
            DayWindow::Tomorrow => today.checked_add_days(Days::new(1)).unwrap_or(today),
        }
    }
}

impl fmt::Display for DayWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayWindow::Today => write!(f, "today"),
            DayWindow::Tomorrow => write!(f, "tomorrow"),
        }
    }
}

/// One pharmacy as extracted from a municipality page, before any enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawEntry {
    pub name: String,
    /// Text fragments of the address block, name excluded.
    pub address_lines: Vec<String>,
    /// Text fragments of the matching shift cell.
    pub shift_lines: Vec<String>,
}

// Constants
pub const DEFAULT_BASE_URL: &str = "https://www.farmaciediturno.org";
pub const DEFAULT_ROOT_URL: &str = "https://www.farmaciediturno.org/regione.asp?cod=42";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
