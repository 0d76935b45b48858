//! The aggregation run: traverse the directory, fetch both days of every
//! municipality, fold everything into one dataset and persist it together
//! with the geocode cache.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, TimeZone};
use std::path::{Path, PathBuf};
use tokio::time::Duration;
use tracing::info;

use crate::diagnostics::{DiagnosticCounts, DiagnosticSink, LogSink};
use crate::directory::{
    enumerate_municipalities, DayWindow, DirectorySource, HttpDirectory, MunicipalityCode, Retrying,
};
use crate::entity::ObservationSet;
use crate::environment::AppConfig;
use crate::geocode::{EntityResolver, GeocodeCache, Geocoder, Nominatim};
use crate::merge::{merge, merge_into};
use crate::roster::build_observation_set;
use crate::store::{self, Layout};
use crate::TARGET_WEB_REQUEST;

/// Where a run reads and writes its files.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub cache: PathBuf,
    pub results: PathBuf,
}

/// What a completed run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub municipalities: usize,
    pub pharmacies: usize,
    pub openings: usize,
    pub cached_positions: usize,
    pub diagnostics: DiagnosticCounts,
}

/// Fetches both day windows of one municipality and merges them.
pub async fn fetch_municipality<S, G, Tz>(
    source: &S,
    code: &MunicipalityCode,
    today: NaiveDate,
    tz: &Tz,
    resolver: &mut EntityResolver<G>,
    sink: &mut dyn DiagnosticSink,
) -> Result<ObservationSet>
where
    S: DirectorySource,
    G: Geocoder,
    Tz: TimeZone,
{
    info!(target: TARGET_WEB_REQUEST, "Getting today results for {}", code);
    let entries = source.roster(code, DayWindow::Today).await?;
    let today_set = build_observation_set(
        entries,
        DayWindow::Today.date(today),
        tz,
        resolver,
        sink,
    )
    .await;

    info!(target: TARGET_WEB_REQUEST, "Getting tomorrow results for {}", code);
    let entries = source.roster(code, DayWindow::Tomorrow).await?;
    let tomorrow_set = build_observation_set(
        entries,
        DayWindow::Tomorrow.date(today),
        tz,
        resolver,
        sink,
    )
    .await;

    Ok(merge(today_set, tomorrow_set, sink))
}

/// Builds the merged dataset for every municipality under `root_url`.
///
/// Returns the dataset and the number of municipalities visited. The first
/// page that cannot be loaded aborts the whole aggregation.
pub async fn aggregate<S, G, Tz>(
    source: &S,
    resolver: &mut EntityResolver<G>,
    root_url: &str,
    today: NaiveDate,
    tz: &Tz,
    sink: &mut dyn DiagnosticSink,
) -> Result<(ObservationSet, usize)>
where
    S: DirectorySource,
    G: Geocoder,
    Tz: TimeZone,
{
    let codes = enumerate_municipalities(source, root_url).await?;
    let mut dataset = ObservationSet::new();

    for (i, code) in codes.iter().enumerate() {
        let municipality = fetch_municipality(source, code, today, tz, resolver, sink)
            .await
            .with_context(|| format!("Failed to load municipality {}", code))?;
        info!(
            target: TARGET_WEB_REQUEST,
            "Municipality {} ({}/{}): {} pharmacies",
            code,
            i + 1,
            codes.len(),
            municipality.len()
        );
        merge_into(&mut dataset, municipality, sink);
    }

    Ok((dataset, codes.len()))
}

/// A full run against the given collaborators.
///
/// The cache is loaded from `paths.cache` first. Only after the aggregation
/// succeeds are the results and then the cache written; on failure neither
/// file is touched.
pub async fn run_with<S, G, Tz>(
    source: &S,
    geocoder: G,
    paths: &OutputPaths,
    root_url: &str,
    today: NaiveDate,
    tz: &Tz,
) -> Result<RunSummary>
where
    S: DirectorySource,
    G: Geocoder,
    Tz: TimeZone,
{
    let cache = GeocodeCache::load(&paths.cache).await;
    let mut resolver = EntityResolver::new(geocoder, cache);
    let mut sink = LogSink::new();

    let (dataset, municipalities) =
        aggregate(source, &mut resolver, root_url, today, tz, &mut sink).await?;

    store::write_json(&paths.results, &dataset, Layout::Pretty)
        .await
        .context("Failed to save results")?;
    info!("Saved {} pharmacies to {}", dataset.len(), paths.results.display());

    let cache = resolver.into_cache();
    cache.persist(&paths.cache).await.context("Failed to save geocode cache")?;

    Ok(RunSummary {
        municipalities,
        pharmacies: dataset.len(),
        openings: dataset.opening_count(),
        cached_positions: cache.len(),
        diagnostics: sink.counts(),
    })
}

/// A full run against the live directory and geocoder described by `config`.
pub async fn run(config: &AppConfig) -> Result<RunSummary> {
    let directory = HttpDirectory::new(&config.base_url, &config.user_agent)?;
    let source = Retrying::new(
        directory,
        config.fetch_retries,
        Duration::from_secs(config.retry_delay_secs),
    );
    let geocoder = Nominatim::new(
        &config.geocoder_url,
        &config.user_agent,
        Duration::from_millis(config.geocode_interval_ms),
    )?;

    let paths = OutputPaths {
        cache: config.cache_path.clone(),
        results: config.results_path.clone(),
    };
    let today = Local::now().date_naive();
    info!("Aggregating duty rosters under {} for {}", config.root_url, today);

    run_with(&source, geocoder, &paths, &config.root_url, today, &Local).await
}

/// Reads back a dataset written by a previous run.
pub async fn load_results(path: &Path) -> Result<Option<ObservationSet>> {
    store::read_json(path).await
}
