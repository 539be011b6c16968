//! # icecat-dl
//!
//! Batch client for the Icecat open product catalog.
//!
//! A run downloads the category reference list and the catalog index, turns
//! every index entry into a flat record (category names resolved, EAN/UPC
//! codes flattened, unwanted keys dropped), fetches a detail document for each
//! record in the configured categories with bounded concurrency, merges the
//! selected detail fields into the record and writes the result as JSON.
//!
//! A failed download or unparsable detail document leaves that one record
//! without details; it never aborts the batch.
//!
//! ## Quick Start
//!
//! ```no_run
//! use icecat_dl::{AuthConfig, CatalogClient, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         auth: Some(AuthConfig {
//!             username: "user".to_string(),
//!             password: Some("pass".to_string()),
//!         }),
//!         ..Default::default()
//!     };
//!
//!     let client = CatalogClient::new(config).await?;
//!
//!     let mut events = client.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = client.run().await?;
//!     println!("{} records written to {}", summary.enrichment.total, summary.catalog_path.display());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Catalog client running the whole batch job
pub mod catalog;
/// Configuration types
pub mod config;
/// Concurrent detail enrichment
pub mod enrichment;
/// Error types
pub mod error;
/// Detail field extraction
pub mod extractor;
/// Document retrieval over HTTP
pub mod fetcher;
/// Catalog index parsing
pub mod index;
/// JSON output files
pub mod output;
/// Index record postprocessing
pub mod postprocess;
/// Category and supplier reference tables
pub mod reference;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use catalog::CatalogClient;
pub use config::{AuthConfig, Config, IndexKind};
pub use enrichment::{EnrichOptions, Enricher};
pub use error::{Error, LookupError, Result, UnrollError};
pub use extractor::{DetailExtractor, ExtractedFields, FieldSelector};
pub use fetcher::{DocumentFetcher, HttpFetcher};
pub use index::IndexParser;
pub use postprocess::{PostprocessAction, RecordPostprocessor};
pub use reference::{CategoryTable, SupplierTable};
pub use types::{
    CatalogRecord, DownloadOutcome, EnrichStats, EnrichedCatalog, Event, Fields, RunSummary, Value,
};
