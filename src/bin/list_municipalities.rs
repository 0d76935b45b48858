use anyhow::Result;
use colored::Colorize;
use std::env;
use std::time::Duration;

use farmacie::directory::{enumerate_municipalities, HttpDirectory, Retrying};
use farmacie::environment::AppConfig;
use farmacie::logging;

#[tokio::main]
async fn main() -> Result<()> {
    logging::configure_logging();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_usage(&args[0]);
        return Ok(());
    }

    let config = AppConfig::from_env();
    let root_url = args.get(1).cloned().unwrap_or_else(|| config.root_url.clone());

    let directory = HttpDirectory::new(&config.base_url, &config.user_agent)?;
    let source = Retrying::new(
        directory,
        config.fetch_retries,
        Duration::from_secs(config.retry_delay_secs),
    );

    println!("Walking directory from {}", root_url.bright_yellow());
    let codes = match enumerate_municipalities(&source, &root_url).await {
        Ok(codes) => codes,
        Err(e) => {
            println!("{}: {:#}", "Traversal failed".bright_red(), e);
            return Err(e);
        }
    };

    println!("\n{}", "═".repeat(60).bright_blue());
    println!(
        "{}  {}",
        "MUNICIPALITIES".bright_blue(),
        codes.len().to_string().bright_green()
    );
    println!("{}", "═".repeat(60).bright_blue());

    let mut seen = std::collections::HashSet::new();
    for (i, code) in codes.iter().enumerate() {
        if seen.insert(code.as_str()) {
            println!("{:>5}. {}", i + 1, code.as_str().bright_white());
        } else {
            println!(
                "{:>5}. {} {}",
                i + 1,
                code.as_str().bright_white(),
                "(listed again)".dimmed()
            );
        }
    }

    Ok(())
}

fn print_usage(program: &str) {
    println!("Usage: {} [ROOT_URL]", program);
    println!();
    println!("Lists every municipality code reachable from ROOT_URL.");
    println!("Defaults to $FARMACIE_ROOT_URL or the Piemonte region page.");
}
