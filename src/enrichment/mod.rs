//! Concurrent detail enrichment
//!
//! [`Enricher::enrich`] takes the parsed catalog, keeps the records whose
//! category is on the allow-list, downloads one detail document per record
//! with bounded concurrency and merges the extracted fields back into the
//! originating record.
//!
//! Downloads complete in any order. Each completion carries the record's
//! position, so the output always mirrors the filtered input order. A record
//! whose download or extraction fails is logged, reported as
//! [`Event::RecordFailed`] and emitted without detail fields; it never affects
//! other records.

mod fetch;
mod progress;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extractor::DetailExtractor;
use crate::fetcher::DocumentFetcher;
use crate::types::{CatalogRecord, DownloadOutcome, EnrichStats, EnrichedCatalog, Event};
use crate::utils::local_file_name;
use fetch::{DownloadRequest, build_url, parse_base_url, spawn_fetch_stage};
use progress::{PROGRESS_UPDATE_INTERVAL, ProgressCounters, spawn_progress_reporter};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// Upper bound on completed downloads buffered ahead of extraction
const MAX_PENDING_COMPLETIONS: usize = 1024;

/// Settings for one enrichment pass
#[derive(Clone, Debug)]
pub struct EnrichOptions {
    /// Base URL that record paths are resolved against
    pub detail_base_url: String,
    /// Directory receiving downloaded detail documents
    pub work_dir: PathBuf,
    /// Maximum simultaneous downloads (0 is treated as 1)
    pub concurrency: usize,
    /// Category ids whose records are enriched; all others are dropped
    pub allowed_categories: BTreeSet<String>,
    /// Delete each detail document after extraction
    pub cleanup: bool,
    /// Interval between [`Event::Enriching`] emissions
    pub progress_interval: Duration,
}

impl EnrichOptions {
    /// Options taken from a client configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            detail_base_url: config.endpoints.detail_base_url.clone(),
            work_dir: config.download.product_dir(),
            concurrency: config.download.concurrency,
            allowed_categories: config.catalog.allowed_categories.clone(),
            cleanup: config.download.cleanup_data_files,
            progress_interval: PROGRESS_UPDATE_INTERVAL,
        }
    }
}

/// Downloads detail documents and merges their fields into catalog records
pub struct Enricher {
    fetcher: Arc<dyn DocumentFetcher>,
    extractor: Arc<DetailExtractor>,
    options: EnrichOptions,
    event_tx: Option<broadcast::Sender<Event>>,
}

impl Enricher {
    /// Create an enricher
    pub fn new(
        fetcher: Arc<dyn DocumentFetcher>,
        extractor: Arc<DetailExtractor>,
        options: EnrichOptions,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            options,
            event_tx: None,
        }
    }

    /// Publish progress and failure events on `event_tx`
    pub fn with_events(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = &self.event_tx {
            tx.send(event).ok();
        }
    }

    /// Enrich every allowed record, returning them in their original order.
    ///
    /// Per-record failures are reported and counted, never returned. `Err`
    /// means the pass could not start (bad base URL, unusable work directory).
    pub async fn enrich(&self, records: Vec<CatalogRecord>) -> Result<EnrichedCatalog> {
        let input = records.len();
        let mut records: Vec<CatalogRecord> = records
            .into_iter()
            .filter(|r| {
                r.category_id()
                    .is_some_and(|id| self.options.allowed_categories.contains(id))
            })
            .collect();
        let total = records.len();

        let concurrency = if self.options.concurrency == 0 {
            tracing::warn!("Enrichment concurrency of 0 requested, using 1");
            1
        } else {
            self.options.concurrency
        };

        let base = parse_base_url(&self.options.detail_base_url)?;
        tokio::fs::create_dir_all(&self.options.work_dir)
            .await
            .map_err(|e| Error::file(&self.options.work_dir, e))?;

        tracing::info!(
            total,
            skipped = input - total,
            concurrency,
            "Adding product details"
        );
        self.emit(Event::EnrichmentStarted {
            total,
            skipped: input - total,
            concurrency,
        });

        let counters = ProgressCounters::default();
        let mut stats = EnrichStats {
            input,
            total,
            ..EnrichStats::default()
        };
        let paths: Vec<String> = records
            .iter()
            .map(|r| r.path().unwrap_or_default().to_string())
            .collect();

        let mut requests = Vec::with_capacity(total);
        for (index, path) in paths.iter().enumerate() {
            let url = if path.is_empty() {
                Err(Error::InvalidUrl {
                    url: String::new(),
                    reason: "record has no path".to_string(),
                })
            } else {
                build_url(&base, path)
            };
            match url {
                Ok(url) => requests.push(DownloadRequest {
                    index,
                    url,
                    dest: self.options.work_dir.join(local_file_name(index, path)),
                }),
                Err(e) => {
                    self.record_failed(index, path, &e.to_string());
                    counters.record_failure();
                    stats.failed += 1;
                }
            }
        }

        let cancel_token = CancellationToken::new();
        let reporter = self.event_tx.clone().map(|tx| {
            spawn_progress_reporter(
                counters.clone(),
                total as u64,
                self.options.progress_interval,
                tx,
                cancel_token.clone(),
            )
        });

        let pending = requests.len();
        let capacity = concurrency.saturating_mul(2).min(MAX_PENDING_COMPLETIONS);
        let (tx, mut rx) = mpsc::channel(capacity);
        let fetch_stage = spawn_fetch_stage(Arc::clone(&self.fetcher), requests, concurrency, tx);

        let mut received = 0;
        while let Some((index, outcome)) = rx.recv().await {
            received += 1;
            let path = &paths[index];
            let result = match outcome {
                DownloadOutcome::Retrieved { path: local } => self.extract(local).await,
                DownloadOutcome::Failed { cause } => Err(cause),
            };

            match result {
                Ok(fields) => {
                    let written = records[index].merge(fields);
                    tracing::trace!(index, path = %path, fields = written, "Merged product details");
                    counters.record_success();
                    stats.enriched += 1;
                }
                Err(cause) => {
                    self.record_failed(index, path, &cause);
                    counters.record_failure();
                    stats.failed += 1;
                }
            }
        }
        drop(fetch_stage);

        if received < pending {
            // The fetch stage ended without reporting every request
            tracing::error!(
                missing = pending - received,
                "Download stage stopped early, leaving records without details"
            );
            stats.failed += pending - received;
        }

        cancel_token.cancel();
        if let Some(reporter) = reporter
            && let Err(e) = reporter.await
        {
            tracing::warn!(error = %e, "Progress reporter task failed");
        }

        tracing::info!(
            total = stats.total,
            enriched = stats.enriched,
            failed = stats.failed,
            "Finished adding product details"
        );
        self.emit(Event::EnrichmentComplete {
            total: stats.total,
            enriched: stats.enriched,
            failed: stats.failed,
        });

        Ok(EnrichedCatalog { records, stats })
    }

    /// Parse a downloaded document off the async runtime
    async fn extract(
        &self,
        local: PathBuf,
    ) -> std::result::Result<crate::extractor::ExtractedFields, String> {
        let extractor = Arc::clone(&self.extractor);
        let cleanup = self.options.cleanup;
        match tokio::task::spawn_blocking(move || extractor.extract_file(&local, cleanup)).await {
            Ok(Ok(fields)) => Ok(fields),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(Error::from(e).to_string()),
        }
    }

    fn record_failed(&self, index: usize, path: &str, cause: &str) {
        tracing::error!(index, path, error = cause, "Unable to add product details");
        self.emit(Event::RecordFailed {
            index,
            path: path.to_string(),
            error: cause.to_string(),
        });
    }
}
