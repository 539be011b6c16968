//! Full catalog run
//!
//! Downloads the category list and catalog index, enriches the products in the
//! configured categories with their detail fields and writes `catalog.json`
//! and `categories.json`.
//!
//! Credentials come from `ICECAT_USERNAME` / `ICECAT_PASSWORD`. An optional
//! JSON configuration file can be passed as the first argument. Set
//! `ICECAT_FULL_INDEX=1` to use the full index instead of the daily one.
//!
//! ```text
//! ICECAT_USERNAME=me ICECAT_PASSWORD=secret RUST_LOG=icecat_dl=info \
//!     cargo run --example full_catalog -- config.json
//! ```

use icecat_dl::{AuthConfig, CatalogClient, Config, Event, IndexKind};
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("icecat_dl=info")),
        )
        .init();

    let mut config = match std::env::args().nth(1) {
        Some(path) => Config::from_json_file(Path::new(&path))?,
        None => Config::default(),
    };

    if let Ok(username) = std::env::var("ICECAT_USERNAME") {
        config.auth = Some(AuthConfig {
            username,
            password: std::env::var("ICECAT_PASSWORD").ok(),
        });
    }
    if std::env::var("ICECAT_FULL_INDEX").is_ok_and(|v| v == "1") {
        config.catalog.index = IndexKind::Full;
    }

    let client = CatalogClient::new(config).await?;

    let mut events = client.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::CategoriesLoaded { count } => println!("Loaded {} categories", count),
                Event::IndexParsed { records } => println!("Index lists {} products", records),
                Event::EnrichmentStarted {
                    total,
                    skipped,
                    concurrency,
                } => println!(
                    "Fetching details for {} products ({} skipped, {} connections)",
                    total, skipped, concurrency
                ),
                Event::Enriching {
                    processed,
                    total,
                    percent,
                    ..
                } => println!("  {}/{} ({:.1}%)", processed, total, percent),
                Event::RecordFailed { path, error, .. } => println!("  failed {}: {}", path, error),
                Event::OutputWritten { path } => println!("Wrote {}", path.display()),
                _ => {}
            }
        }
    });

    let summary = client.run().await?;
    println!(
        "Done: {} enriched, {} without details, {} products in the index",
        summary.enrichment.enriched, summary.enrichment.failed, summary.index_records
    );
    Ok(())
}
