//! Catalog client: wires the reference tables, index parser, enrichment and
//! JSON output into one batch job.

use crate::config::Config;
use crate::enrichment::{EnrichOptions, Enricher};
use crate::error::{Error, Result};
use crate::extractor::DetailExtractor;
use crate::fetcher::{DocumentFetcher, HttpFetcher};
use crate::index::IndexParser;
use crate::output::write_json;
use crate::postprocess::RecordPostprocessor;
use crate::reference::{CategoryTable, SupplierTable};
use crate::types::{CatalogRecord, EnrichedCatalog, Event, RunSummary};
use crate::utils::read_document;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Batch client for the Icecat open catalog
pub struct CatalogClient {
    config: Arc<Config>,
    fetcher: Arc<dyn DocumentFetcher>,
    extractor: Arc<DetailExtractor>,
    event_tx: broadcast::Sender<Event>,
}

impl CatalogClient {
    /// Create a client that talks HTTP to the configured endpoints.
    ///
    /// Validates the configuration and creates the data directory.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let fetcher = HttpFetcher::new(&config)?;
        Self::with_fetcher(config, Arc::new(fetcher)).await
    }

    /// Create a client using a custom document fetcher
    pub async fn with_fetcher(config: Config, fetcher: Arc<dyn DocumentFetcher>) -> Result<Self> {
        let extractor = DetailExtractor::new(config.selectors()?)?;

        tokio::fs::create_dir_all(&config.download.data_dir)
            .await
            .map_err(|e| Error::file(&config.download.data_dir, e))?;

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            extractor: Arc::new(extractor),
            event_tx,
        })
    }

    /// Subscribe to run events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Download a document into the data directory, returning the local path
    async fn download(&self, url: &str, fallback_name: &str) -> Result<PathBuf> {
        let name = file_name_from_url(url).unwrap_or_else(|| fallback_name.to_string());
        let dest = self.config.download.data_dir.join(name);
        tracing::info!(url, path = %dest.display(), "Downloading");
        self.fetcher.fetch(url, &dest).await
    }

    /// Download and parse the category reference list
    pub async fn load_categories(&self) -> Result<CategoryTable> {
        let path = self
            .download(&self.config.endpoints.categories_url, "CategoriesList.xml.gz")
            .await?;
        let language_id = self.config.catalog.language_id.clone();

        let table = tokio::task::spawn_blocking(move || {
            let text = read_document(&path)?;
            CategoryTable::parse_str(&text, &language_id)
        })
        .await??;

        self.emit(Event::CategoriesLoaded { count: table.len() });
        Ok(table)
    }

    /// Download and parse the supplier mapping
    pub async fn load_suppliers(&self) -> Result<SupplierTable> {
        let path = self
            .download(&self.config.endpoints.suppliers_url, "supplier_mapping.xml")
            .await?;

        let table = tokio::task::spawn_blocking(move || {
            let text = read_document(&path)?;
            SupplierTable::parse_str(&text)
        })
        .await??;

        self.emit(Event::SuppliersLoaded { count: table.len() });
        Ok(table)
    }

    /// Download and parse the catalog index into postprocessed records
    pub async fn load_index(
        &self,
        categories: Arc<CategoryTable>,
        suppliers: Option<Arc<SupplierTable>>,
    ) -> Result<Vec<CatalogRecord>> {
        let file_name = self.config.catalog.index.file_name();
        let path = self.download(&self.config.index_url(), file_name).await?;

        let mut postprocessor =
            RecordPostprocessor::new(categories, self.config.catalog.exclude_keys.clone());
        if let Some(suppliers) = suppliers {
            postprocessor = postprocessor.with_suppliers(suppliers);
        }

        let records = tokio::task::spawn_blocking(move || {
            let bytes = std::fs::read(&path).map_err(|e| Error::file(&path, e))?;
            IndexParser::new(&postprocessor).parse_bytes(bytes)
        })
        .await??;

        self.emit(Event::IndexParsed {
            records: records.len(),
        });
        Ok(records)
    }

    /// Add detail fields to the allowed records
    pub async fn enrich(&self, records: Vec<CatalogRecord>) -> Result<EnrichedCatalog> {
        Enricher::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.extractor),
            EnrichOptions::from_config(&self.config),
        )
        .with_events(self.event_tx.clone())
        .enrich(records)
        .await
    }

    /// Write records as a JSON array
    pub async fn write_catalog(&self, records: &[CatalogRecord], path: &Path) -> Result<()> {
        write_json(path, records).await?;
        self.emit(Event::OutputWritten {
            path: path.to_path_buf(),
        });
        Ok(())
    }

    /// Write the category table as a JSON object
    pub async fn write_categories(&self, table: &CategoryTable, path: &Path) -> Result<()> {
        write_json(path, table).await?;
        self.emit(Event::OutputWritten {
            path: path.to_path_buf(),
        });
        Ok(())
    }

    /// Run the whole job: categories, optional suppliers, index, enrichment, output
    pub async fn run(&self) -> Result<RunSummary> {
        let categories = Arc::new(self.load_categories().await?);
        let categories_path = self.config.output.categories_file.clone();
        self.write_categories(&categories, &categories_path).await?;

        let suppliers = if self.config.catalog.resolve_suppliers {
            match self.load_suppliers().await {
                Ok(table) => Some(Arc::new(table)),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to load suppliers, continuing without them");
                    None
                }
            }
        } else {
            None
        };

        let records = self.load_index(Arc::clone(&categories), suppliers).await?;
        let index_records = records.len();

        let enriched = self.enrich(records).await?;
        let catalog_path = self.config.output.output_file.clone();
        self.write_catalog(&enriched.records, &catalog_path).await?;

        Ok(RunSummary {
            index_records,
            enrichment: enriched.stats,
            catalog_path,
            categories_path,
        })
    }
}

/// Last path segment of a URL, if it has a non-empty one
fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .next_back()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
