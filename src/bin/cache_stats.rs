use anyhow::{Context, Result};
use clap::Parser;
use prettytable::{Cell, Row, Table};
use std::collections::BTreeMap;
use std::path::PathBuf;

use farmacie::entity::{Coordinate, CoordinatePair, EntityId};
use farmacie::environment::AppConfig;
use farmacie::store;

#[derive(Parser)]
#[clap(name = "cache_stats", about = "Summarize a geocode cache file")]
struct Cli {
    /// Cache file, defaults to the configured cache path
    path: Option<PathBuf>,

    /// Also list the identifiers that have no position
    #[clap(short, long)]
    missing: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let path = args.path.unwrap_or_else(|| AppConfig::from_env().cache_path);

    let entries: BTreeMap<EntityId, CoordinatePair> = store::read_json(&path)
        .await?
        .with_context(|| format!("No cache file at {}", path.display()))?;

    let found = entries
        .values()
        .filter(|(lat, lng)| lat.is_known() && lng.is_known())
        .count();
    let not_found = entries.len() - found;

    let mut table = Table::new();
    table.add_row(Row::new(vec![Cell::new("Cache"), Cell::new(&path.display().to_string())]));
    table.add_row(Row::new(vec![Cell::new("Entries"), Cell::new(&entries.len().to_string())]));
    table.add_row(Row::new(vec![Cell::new("Found"), Cell::new(&found.to_string())]));
    table.add_row(Row::new(vec![Cell::new("Not found"), Cell::new(&not_found.to_string())]));
    table.printstd();

    if args.missing && not_found > 0 {
        let mut missing = Table::new();
        missing.add_row(Row::new(vec![Cell::new("Identifier"), Cell::new("Latitude"), Cell::new("Longitude")]));
        for (id, (lat, lng)) in entries.iter().filter(|(_, (lat, lng))| !(lat.is_known() && lng.is_known())) {
            missing.add_row(Row::new(vec![
                Cell::new(id.as_str()),
                Cell::new(&describe(lat)),
                Cell::new(&describe(lng)),
            ]));
        }
        missing.printstd();
    }

    Ok(())
}

fn describe(coordinate: &Coordinate) -> String {
    match coordinate {
        Coordinate::Known(value) => value.to_string(),
        Coordinate::NotFound => "not found".to_string(),
    }
}
