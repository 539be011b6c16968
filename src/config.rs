//! Configuration types for icecat-dl

use crate::error::{Error, Result};
use crate::extractor::FieldSelector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Above this many simultaneous connections the vendor starts refusing requests
const RECOMMENDED_MAX_CONCURRENCY: usize = 100;

/// Basic-auth credentials for the vendor site
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Account name
    pub username: String,

    /// Account password
    #[serde(default)]
    pub password: Option<String>,
}

/// Remote locations of the catalog documents
///
/// Overridable so tests (and mirrors) can point the client elsewhere.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Directory holding `daily.index.xml` / `files.index.xml`
    #[serde(default = "default_index_base_url")]
    pub index_base_url: String,

    /// Full URL of the categories reference list (gzip-compressed)
    #[serde(default = "default_categories_url")]
    pub categories_url: String,

    /// Full URL of the supplier mapping reference list
    #[serde(default = "default_suppliers_url")]
    pub suppliers_url: String,

    /// Base that per-product `path` values are resolved against
    #[serde(default = "default_detail_base_url")]
    pub detail_base_url: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            index_base_url: default_index_base_url(),
            categories_url: default_categories_url(),
            suppliers_url: default_suppliers_url(),
            detail_base_url: default_detail_base_url(),
        }
    }
}

/// Download behavior configuration (directories, concurrency, timeouts)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory for downloaded reference, index and product files (default: "./_data")
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Simultaneous detail document downloads (default: 10)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Delete each product detail file once its fields are extracted (default: true)
    #[serde(default = "default_true")]
    pub cleanup_data_files: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            concurrency: default_concurrency(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            cleanup_data_files: true,
        }
    }
}

impl DownloadConfig {
    /// Directory holding per-product detail documents while they are processed
    pub fn product_dir(&self) -> PathBuf {
        self.data_dir.join("product_xml")
    }
}

/// Which catalog index to download
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Products changed during the last day (default)
    #[default]
    Daily,
    /// Every product in the catalog (several GB of memory for a full parse)
    Full,
}

impl IndexKind {
    /// Remote file name of the index
    pub fn file_name(&self) -> &'static str {
        match self {
            IndexKind::Daily => "daily.index.xml",
            IndexKind::Full => "files.index.xml",
        }
    }
}

/// What to take from the catalog and how to shape it
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Daily or full index (default: daily)
    #[serde(default)]
    pub index: IndexKind,

    /// Keys dropped from every record (exact match, default: ["Country_Markets"])
    #[serde(default = "default_exclude_keys")]
    pub exclude_keys: Vec<String>,

    /// Category ids whose products are enriched; every other product is dropped
    #[serde(default = "default_allowed_categories")]
    pub allowed_categories: BTreeSet<String>,

    /// Detail field selectors, e.g. `ShortSummaryDescription` or `ProductDescription[@ShortDesc]`
    #[serde(default = "default_detail_fields")]
    pub detail_fields: Vec<String>,

    /// Language id used to pick category names (default: "1", English)
    #[serde(default = "default_language_id")]
    pub language_id: String,

    /// Download the supplier mapping and add a `supplier` field to each record (default: false)
    #[serde(default)]
    pub resolve_suppliers: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            index: IndexKind::default(),
            exclude_keys: default_exclude_keys(),
            allowed_categories: default_allowed_categories(),
            detail_fields: default_detail_fields(),
            language_id: default_language_id(),
            resolve_suppliers: false,
        }
    }
}

/// Output file locations
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Enriched catalog JSON (default: "catalog.json")
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,

    /// Category table JSON (default: "categories.json")
    #[serde(default = "default_categories_file")]
    pub categories_file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_file: default_output_file(),
            categories_file: default_categories_file(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Main configuration for [`CatalogClient`](crate::CatalogClient)
///
/// Fields are organized into logical sub-configs:
/// - [`auth`](AuthConfig): credentials (None = anonymous)
/// - [`endpoints`](EndpointConfig): remote document locations
/// - [`download`](DownloadConfig): data directory, concurrency, timeouts
/// - [`catalog`](CatalogConfig): index selection, filtering, detail fields
/// - [`output`](OutputConfig): JSON output files
/// - [`retry`](RetryConfig): backoff for transient HTTP failures
///
/// `download` and `output` are flattened, so their keys sit at the top level.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Basic-auth credentials
    #[serde(default)]
    pub auth: Option<AuthConfig>,

    /// Remote document locations
    #[serde(default)]
    pub endpoints: EndpointConfig,

    /// Download behavior settings
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Catalog selection and shaping
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Output file locations
    #[serde(flatten)]
    pub output: OutputConfig,

    /// Retry policy for HTTP requests
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Load a JSON configuration file and validate it
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file(path, e))?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that would otherwise fail deep inside a run
    pub fn validate(&self) -> Result<()> {
        if self.download.concurrency == 0 {
            return Err(Error::config(
                "concurrency",
                "concurrency must be at least 1",
            ));
        }
        if self.download.concurrency > RECOMMENDED_MAX_CONCURRENCY {
            tracing::warn!(
                concurrency = self.download.concurrency,
                recommended_max = RECOMMENDED_MAX_CONCURRENCY,
                "Concurrency above the recommended maximum, the server may refuse connections"
            );
        }
        if self.download.request_timeout.is_zero() {
            return Err(Error::config(
                "request_timeout",
                "request timeout must be greater than zero",
            ));
        }
        if let Some(auth) = &self.auth
            && auth.username.trim().is_empty()
        {
            return Err(Error::config("auth.username", "username must not be empty"));
        }

        for (key, url) in [
            ("endpoints.index_base_url", &self.endpoints.index_base_url),
            ("endpoints.categories_url", &self.endpoints.categories_url),
            ("endpoints.suppliers_url", &self.endpoints.suppliers_url),
            ("endpoints.detail_base_url", &self.endpoints.detail_base_url),
        ] {
            if let Err(e) = url::Url::parse(url) {
                return Err(Error::config(key, format!("invalid URL '{}': {}", url, e)));
            }
        }

        self.selectors()
            .map_err(|e| Error::config("catalog.detail_fields", e.to_string()))?;
        Ok(())
    }

    /// Parse the configured detail field selectors
    pub fn selectors(&self) -> Result<Vec<FieldSelector>> {
        self.catalog
            .detail_fields
            .iter()
            .map(|s| s.parse())
            .collect()
    }

    /// Full URL of the configured catalog index
    pub fn index_url(&self) -> String {
        join_base(&self.endpoints.index_base_url, self.catalog.index.file_name())
    }
}

/// Concatenate a directory-like base URL and a file name with exactly one slash
pub(crate) fn join_base(base: &str, file: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        file.trim_start_matches('/')
    )
}

fn default_index_base_url() -> String {
    "https://data.icecat.biz/export/freexml/EN/".to_string()
}

fn default_categories_url() -> String {
    "https://data.icecat.biz/export/freexml/refs/CategoriesList.xml.gz".to_string()
}

fn default_suppliers_url() -> String {
    "https://data.icecat.biz/export/freeurls/supplier_mapping.xml".to_string()
}

fn default_detail_base_url() -> String {
    "https://data.icecat.biz/".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./_data")
}

fn default_concurrency() -> usize {
    10
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("icecat-dl/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_true() -> bool {
    true
}

fn default_exclude_keys() -> Vec<String> {
    vec!["Country_Markets".to_string()]
}

fn default_allowed_categories() -> BTreeSet<String> {
    [
        "588",  // Camera Lenses
        "933",  // Camera Lens Adapters
        "3353", // Mobile Phone Lenses
        "7229", // Camera Lens Docks
        "571",  // Cameras & Camcorders
        "575",  // Digital Cameras
        "1179", // Camera Docks
        "1288", // Camera Kits
        "1918", // Instant Print Cameras
        "2287", // Action Sports Cameras
        "119",  // Mobile Phones
        "1089", // Mobile Phone Starter Kits
        "1893", // Smartphones
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_detail_fields() -> Vec<String> {
    vec![
        "ShortSummaryDescription".to_string(),
        "LongSummaryDescription".to_string(),
        "ProductDescription[@ShortDesc]".to_string(),
        "Product".to_string(),
    ]
}

fn default_language_id() -> String {
    "1".to_string()
}

fn default_output_file() -> PathBuf {
    PathBuf::from("catalog.json")
}

fn default_categories_file() -> PathBuf {
    PathBuf::from("categories.json")
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
