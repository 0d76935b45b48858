use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

use crate::directory::{DEFAULT_BASE_URL, DEFAULT_ROOT_URL};
use crate::geocode::{DEFAULT_NOMINATIM_URL, DEFAULT_USER_AGENT};

pub const ROOT_URL_ENV: &str = "FARMACIE_ROOT_URL";
pub const BASE_URL_ENV: &str = "FARMACIE_BASE_URL";
pub const CACHE_PATH_ENV: &str = "FARMACIE_CACHE_PATH";
pub const RESULTS_PATH_ENV: &str = "FARMACIE_RESULTS_PATH";
pub const GEOCODER_URL_ENV: &str = "FARMACIE_GEOCODER_URL";
pub const USER_AGENT_ENV: &str = "FARMACIE_USER_AGENT";
pub const FETCH_RETRIES_ENV: &str = "FARMACIE_FETCH_RETRIES";
pub const RETRY_DELAY_ENV: &str = "FARMACIE_RETRY_DELAY_SECS";
pub const GEOCODE_INTERVAL_ENV: &str = "FARMACIE_GEOCODE_INTERVAL_MS";

/// Settings of an aggregation run.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Region or province page the traversal starts from.
    pub root_url: String,
    /// Site root that municipality pages are resolved against.
    pub base_url: String,
    pub cache_path: PathBuf,
    pub results_path: PathBuf,
    pub geocoder_url: String,
    pub user_agent: String,
    /// Extra attempts per page; 0 keeps the first failure fatal.
    pub fetch_retries: usize,
    pub retry_delay_secs: u64,
    pub geocode_interval_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            root_url: DEFAULT_ROOT_URL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_path: PathBuf::from("cache.json"),
            results_path: PathBuf::from("results.json"),
            geocoder_url: DEFAULT_NOMINATIM_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fetch_retries: 0,
            retry_delay_secs: 5,
            geocode_interval_ms: 1000,
        }
    }
}

impl AppConfig {
    /// Defaults overridden by whatever `FARMACIE_*` variables are set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`AppConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get(ROOT_URL_ENV) {
            config.root_url = v;
        }
        if let Some(v) = get(BASE_URL_ENV) {
            config.base_url = v;
        }
        if let Some(v) = get(CACHE_PATH_ENV) {
            config.cache_path = PathBuf::from(v);
        }
        if let Some(v) = get(RESULTS_PATH_ENV) {
            config.results_path = PathBuf::from(v);
        }
        if let Some(v) = get(GEOCODER_URL_ENV) {
            config.geocoder_url = v;
        }
        if let Some(v) = get(USER_AGENT_ENV) {
            config.user_agent = v;
        }
        parse_into(&get, FETCH_RETRIES_ENV, &mut config.fetch_retries);
        parse_into(&get, RETRY_DELAY_ENV, &mut config.retry_delay_secs);
        parse_into(&get, GEOCODE_INTERVAL_ENV, &mut config.geocode_interval_ms);

        config
    }
}

fn parse_into<T: FromStr>(get: &dyn Fn(&str) -> Option<String>, key: &str, target: &mut T) {
    if let Some(raw) = get(key) {
        match raw.parse() {
            Ok(value) => *target = value,
            Err(_) => warn!("Ignoring {}={:?}, not a valid number", key, raw),
        }
    }
}
