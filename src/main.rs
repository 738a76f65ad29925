//! geolookup - Geo resolution CLI with Hexagonal Architecture
//!
//! This is the composition root that wires together all the components.

use clap::Parser;
use geolookup::cli::Cli;
use geolookup::domain::ports::BackingStore;
use geolookup::{load_config, GeoResolver, GeoResolverService};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from environment
    let mut cfg = load_config()?;
    cfg.rebuild |= cli.rebuild;

    // Setup logging (stderr, stdout carries the result)
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(
        "starting geolookup dataset={} db_dir={}",
        cli.dataset,
        cfg.db_dir.display()
    );

    // ===== COMPOSITION ROOT =====

    let criteria = cli.criteria()?;

    std::fs::create_dir_all(&cfg.db_dir)?;
    let spec = cfg.dataset_spec(cli.dataset);
    let resolver = GeoResolverService::<dyn BackingStore>::open(&spec)?;

    let resolution = resolver.resolve(&criteria);
    println!("{}", serde_json::to_string_pretty(&resolution.record())?);

    Ok(())
}
