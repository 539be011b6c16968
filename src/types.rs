//! Core types for icecat-dl

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Field holding the relative location of a product's detail document
pub const PATH_FIELD: &str = "path";
/// Field holding the category id of a catalog record
pub const CATEGORY_ID_FIELD: &str = "catid";
/// Field receiving the resolved category name
pub const CATEGORY_FIELD: &str = "category";
/// Primary product identifier
pub const PRODUCT_ID_FIELD: &str = "product_id";
/// Field holding the supplier id of a catalog record
pub const SUPPLIER_ID_FIELD: &str = "supplier_id";
/// Field receiving the resolved supplier name
pub const SUPPLIER_FIELD: &str = "supplier";
/// Multi-value EAN/UPC wrapper
pub const EAN_UPCS_FIELD: &str = "ean_upcs";

/// String-keyed map of tree values
pub type Fields = BTreeMap<String, Value>;

/// Tagged tree value produced by flattening XML
///
/// Serializes to plain JSON: scalars as strings, lists as arrays, maps as objects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Leaf text or attribute value
    Scalar(String),
    /// Repeated values
    List(Vec<Value>),
    /// Nested element
    Map(Fields),
}

impl Value {
    /// Borrow the string if this is a scalar
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the map if this is a nested element
    pub fn as_map(&self) -> Option<&Fields> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow the items if this is a list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short name of the variant, used in log messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(s)
    }
}

impl From<Fields> for Value {
    fn from(m: Fields) -> Self {
        Value::Map(m)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// One catalog item: a flat-ish mapping of lower-case field names to values
///
/// Created while parsing the index, later enriched in place with detail fields.
/// Keys are unique; inserting an existing key overwrites it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogRecord {
    fields: Fields,
}

impl CatalogRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing field map
    pub fn from_fields(fields: Fields) -> Self {
        Self { fields }
    }

    /// Get a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a field if it is a scalar
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Insert a field, returning the previous value under that key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    /// Remove a field
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Whether the record has a field
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Merge extracted detail fields into the record, overwriting on collision.
    ///
    /// Returns the number of fields written.
    pub fn merge<I>(&mut self, extracted: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut written = 0;
        for (key, value) in extracted {
            self.fields.insert(key, Value::Scalar(value));
            written += 1;
        }
        written
    }

    /// Relative path of the product's detail document
    pub fn path(&self) -> Option<&str> {
        self.get_str(PATH_FIELD)
    }

    /// Category id
    pub fn category_id(&self) -> Option<&str> {
        self.get_str(CATEGORY_ID_FIELD)
    }

    /// Primary product id
    pub fn product_id(&self) -> Option<&str> {
        self.get_str(PRODUCT_ID_FIELD)
    }

    /// Field names in key order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Borrow the underlying map
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Consume the record, returning the underlying map
    pub fn into_fields(self) -> Fields {
        self.fields
    }
}

impl From<Fields> for CatalogRecord {
    fn from(fields: Fields) -> Self {
        Self { fields }
    }
}

/// Result of fetching one detail document
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Document saved locally
    Retrieved {
        /// Local file holding the document
        path: PathBuf,
    },
    /// Fetch failed (transport error, HTTP status, timeout, I/O)
    Failed {
        /// Human-readable cause
        cause: String,
    },
}

impl DownloadOutcome {
    /// Whether the document was retrieved
    pub fn is_retrieved(&self) -> bool {
        matches!(self, DownloadOutcome::Retrieved { .. })
    }
}

/// Counters for one enrichment pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichStats {
    /// Records handed to the enricher before filtering
    pub input: usize,
    /// Records that passed the category allow-list
    pub total: usize,
    /// Records that gained detail fields
    pub enriched: usize,
    /// Records left bare because download or extraction failed
    pub failed: usize,
}

/// Records in original (filtered) order together with pass statistics
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnrichedCatalog {
    /// Enriched and bare records, in input order
    pub records: Vec<CatalogRecord>,
    /// Counters for this pass
    pub stats: EnrichStats,
}

impl EnrichedCatalog {
    /// Consume, returning only the records
    pub fn into_records(self) -> Vec<CatalogRecord> {
        self.records
    }
}

/// Outcome of a complete catalog run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    /// Leaf records found in the index
    pub index_records: usize,
    /// Enrichment counters
    pub enrichment: EnrichStats,
    /// Where the catalog JSON was written
    pub catalog_path: PathBuf,
    /// Where the category table JSON was written
    pub categories_path: PathBuf,
}

/// Event emitted while a catalog run progresses
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Category reference list parsed
    CategoriesLoaded {
        /// Number of categories in the table
        count: usize,
    },

    /// Supplier reference list parsed
    SuppliersLoaded {
        /// Number of suppliers in the table
        count: usize,
    },

    /// Catalog index parsed
    IndexParsed {
        /// Number of leaf records found
        records: usize,
    },

    /// Detail enrichment started
    EnrichmentStarted {
        /// Records that passed the allow-list
        total: usize,
        /// Records dropped by the allow-list
        skipped: usize,
        /// Simultaneous downloads
        concurrency: usize,
    },

    /// Periodic enrichment progress
    Enriching {
        /// Records processed so far (enriched or failed)
        processed: u64,
        /// Records to process
        total: u64,
        /// Records that failed so far
        #[serde(skip_serializing_if = "Option::is_none")]
        failed: Option<u64>,
        /// Progress percentage (0.0 to 100.0)
        percent: f32,
    },

    /// A record could not be enriched and was left bare
    RecordFailed {
        /// Position in the filtered sequence
        index: usize,
        /// Detail document path of the record
        path: String,
        /// Error message
        error: String,
    },

    /// Detail enrichment finished
    EnrichmentComplete {
        /// Records in the output
        total: usize,
        /// Records that gained detail fields
        enriched: usize,
        /// Records left bare
        failed: usize,
    },

    /// A JSON output file was written
    OutputWritten {
        /// Output file
        path: PathBuf,
    },
}
