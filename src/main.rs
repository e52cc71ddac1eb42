//! # Lokalnytt
//!
//! A feed ingestion pipeline that pulls news-style syndication feeds from a
//! configured set of sources, enriches each entry with extracted page
//! metadata, generates resized image renditions, classifies entries into
//! categories and geographic regions, deduplicates against everything seen
//! before, and merges the survivors into a persistent article store sorted by
//! publication time.
//!
//! ## Usage
//!
//! ```sh
//! lokalnytt --site-root /srv/lokalnytt/site
//! ```
//!
//! ## Architecture
//!
//! One idempotent batch run, invoked repeatedly by an external scheduler:
//! 1. **Fetch**: one concurrent task per source downloads and parses its feed
//! 2. **Enrich**: each entry's page is fetched for metadata and a lead image
//! 3. **Classify**: keyword categories plus gazetteer/domain geo tags
//! 4. **Deduplicate**: exact keys and fuzzy title similarity, first seen wins
//! 5. **Merge**: survivors join the store, which is rewritten atomically

use clap::Parser;
use std::error::Error;
use tracing::{error, info};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod classify;
mod cli;
mod config;
mod dedup;
mod extract;
mod fetch;
mod images;
mod models;
mod outputs;
mod pipeline;
mod utils;

use classify::Classifier;
use cli::Cli;
use config::{load_json_or_default, PipelineConfig};
use models::{Gazetteer, Source};
use outputs::store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("feed ingestion starting up");

    let args = Cli::parse();
    let cfg = PipelineConfig::from_cli(&args);

    // Early check: the merge at the end of the run must not be the first
    // moment we learn the store cannot be written.
    if let Err(e) = cfg.prepare_dirs().await {
        error!(
            path = %cfg.data_dir.display(),
            error = %e,
            "Data directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Configuration ----
    let sources: Vec<Source> = load_json_or_default(&cfg.sources_path, "source list").await;
    let keywords = load_json_or_default(&cfg.keywords_path, "category keywords").await;
    let gazetteer: Gazetteer = load_json_or_default(&cfg.gazetteer_path, "gazetteer").await;
    let domain_regions = load_json_or_default(&cfg.domain_map_path, "domain region map").await;
    info!(sources = sources.len(), "Configuration loaded");
    let classifier = Classifier::new(keywords, gazetteer, domain_regions);

    // ---- Ingest ----
    let existing = store::load_store(&cfg.store_path).await;
    let outcome = pipeline::run(&cfg, &sources, &classifier, &existing).await;

    // ---- Merge & persist ----
    let new_count = outcome.accepted.len();
    let merged = store::merge(existing, outcome.accepted);
    let total = merged.len();
    if let Err(e) = store::write_store(&cfg.store_path, &merged).await {
        error!(path = %cfg.store_path.display(), error = %e, "Failed to rewrite article store");
        return Err(e);
    }

    info!(
        new = new_count,
        total,
        sources_failed = outcome.stats.sources_failed,
        pages_failed = outcome.stats.pages_failed,
        duplicates = outcome.stats.duplicates_suppressed,
        images = outcome.stats.images_written,
        "Run complete"
    );
    utils::log_elapsed(start_time);
    println!(
        "Updated {} with {} new articles (total: {}, {} sources failed).",
        cfg.store_path.display(),
        new_count,
        total,
        outcome.stats.sources_failed
    );
    Ok(())
}
