//! Per-key hook applied while the catalog index is converted into records
//!
//! The index parser calls [`RecordPostprocessor::process`] for every attribute
//! and child element it converts, innermost first. Keys are lower-cased on the
//! way up, so by the time a leaf `file` element reaches the hook its own
//! children already carry lower-case names.

use crate::error::{LookupError, UnrollError};
use crate::reference::{CategoryTable, SupplierTable};
use crate::types::{
    CATEGORY_FIELD, CATEGORY_ID_FIELD, EAN_UPCS_FIELD, Fields, PRODUCT_ID_FIELD, SUPPLIER_FIELD,
    SUPPLIER_ID_FIELD, Value,
};
use crate::utils::title_case;
use std::sync::Arc;

/// Element name of a catalog leaf record in the index
pub const LEAF_KEY: &str = "file";

/// Repeated child of the EAN/UPC wrapper
const EAN_UPC_CHILD: &str = "ean_upc";
/// Field holding one EAN/UPC code
const EAN_VALUE_FIELD: &str = "value";

/// Vendor field names whose output name is not simply the lower-cased form
const KEY_ALIASES: &[(&str, &str)] = &[("ReleaseDate", "release_date")];

/// What the index parser should do with one converted key/value pair
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PostprocessAction {
    /// Keep the pair under its original key
    Keep(String, Value),
    /// Drop the pair
    Omit,
    /// Keep the value under a new key
    Rename(String, Value),
}

/// Output name for a vendor field name
pub fn normalize_key(key: &str) -> String {
    KEY_ALIASES
        .iter()
        .find(|(vendor, _)| *vendor == key)
        .map(|(_, alias)| (*alias).to_string())
        .unwrap_or_else(|| key.to_lowercase())
}

/// Normalize the EAN/UPC structure into a flat list of codes.
///
/// Accepted shapes:
/// - `{ean_upc: {value: "1"}}` becomes `["1"]`
/// - `{ean_upc: [{value: "1"}, {value: "2"}]}` becomes `["1", "2"]`
/// - `["1", "2"]` is returned unchanged
/// - `"1"` becomes `["1"]`
/// - an empty element (`""`) becomes `[]`
pub fn unroll_ean_upcs(value: &Value) -> Result<Value, UnrollError> {
    match value {
        Value::Scalar(code) if code.trim().is_empty() => Ok(Value::List(Vec::new())),
        Value::Scalar(code) => Ok(Value::List(vec![Value::Scalar(code.clone())])),
        Value::List(items) => {
            if items.iter().all(|v| matches!(v, Value::Scalar(_))) {
                Ok(value.clone())
            } else {
                Err(UnrollError::UnexpectedShape(
                    "list contains nested values".to_string(),
                ))
            }
        }
        Value::Map(wrapper) => {
            let child = wrapper
                .get(EAN_UPC_CHILD)
                .ok_or(UnrollError::MissingChild(EAN_UPC_CHILD))?;
            match child {
                Value::Map(entry) => Ok(Value::List(vec![entry_code(entry, 0)?])),
                Value::List(entries) => entries
                    .iter()
                    .enumerate()
                    .map(|(index, entry)| match entry {
                        Value::Map(entry) => entry_code(entry, index),
                        _ => Err(UnrollError::NoValue { index }),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List),
                Value::Scalar(_) => Err(UnrollError::UnexpectedShape(format!(
                    "{} is a scalar",
                    EAN_UPC_CHILD
                ))),
            }
        }
    }
}

/// Code of one EAN/UPC entry: its `value` field, else its first scalar field
fn entry_code(entry: &Fields, index: usize) -> Result<Value, UnrollError> {
    entry
        .get(EAN_VALUE_FIELD)
        .and_then(Value::as_str)
        .or_else(|| entry.values().find_map(Value::as_str))
        .map(|code| Value::Scalar(code.to_string()))
        .ok_or(UnrollError::NoValue { index })
}

/// Resolves ids, normalizes identifiers and filters keys of index records
#[derive(Clone, Debug)]
pub struct RecordPostprocessor {
    categories: Arc<CategoryTable>,
    suppliers: Option<Arc<SupplierTable>>,
    exclude_keys: Vec<String>,
}

impl RecordPostprocessor {
    /// Create a postprocessor resolving categories against `categories`
    pub fn new(categories: Arc<CategoryTable>, exclude_keys: Vec<String>) -> Self {
        Self {
            categories,
            suppliers: None,
            exclude_keys,
        }
    }

    /// Also resolve `supplier_id` into a `supplier` name
    pub fn with_suppliers(mut self, suppliers: Arc<SupplierTable>) -> Self {
        self.suppliers = Some(suppliers);
        self
    }

    /// Whether a key is in the exclusion list (exact or lower-cased match)
    pub fn is_excluded(&self, key: &str) -> bool {
        let normalized = normalize_key(key);
        self.exclude_keys
            .iter()
            .any(|ex| ex == key || ex.to_lowercase() == normalized)
    }

    /// Decide what happens to one converted key/value pair.
    ///
    /// `path` lists the ancestor element names of `key`, outermost first.
    pub fn process(&self, path: &[String], key: &str, value: Value) -> PostprocessAction {
        if key == LEAF_KEY
            && let Value::Map(fields) = value
        {
            return PostprocessAction::Keep(key.to_string(), Value::Map(self.finish_record(fields)));
        }

        if self.is_excluded(key) {
            tracing::trace!(key, depth = path.len(), "Dropping excluded key");
            return PostprocessAction::Omit;
        }

        let normalized = normalize_key(key);
        if normalized == key {
            PostprocessAction::Keep(normalized, value)
        } else {
            PostprocessAction::Rename(normalized, value)
        }
    }

    fn category_name(&self, fields: &Fields) -> Result<&str, LookupError> {
        let catid = fields
            .get(CATEGORY_ID_FIELD)
            .and_then(|v| v.as_str())
            .ok_or(LookupError::MissingField {
                field: CATEGORY_ID_FIELD,
            })?;
        self.categories.lookup(catid)
    }

    fn finish_record(&self, mut fields: Fields) -> Fields {
        let product_id = fields
            .get(PRODUCT_ID_FIELD)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        match self.category_name(&fields) {
            Ok(name) => {
                fields.insert(CATEGORY_FIELD.to_string(), Value::Scalar(title_case(name)));
            }
            Err(e) => tracing::warn!(
                product_id = %product_id,
                error = %e,
                "Unable to find category"
            ),
        }

        if let Some(suppliers) = &self.suppliers
            && let Some(supplier_id) = fields.get(SUPPLIER_ID_FIELD).and_then(Value::as_str)
        {
            match suppliers.lookup(supplier_id) {
                Ok(name) => {
                    fields.insert(SUPPLIER_FIELD.to_string(), Value::Scalar(name.to_string()));
                }
                Err(e) => tracing::warn!(supplier_id, error = %e, "Unable to find supplier"),
            }
        }

        if let Some(codes) = fields.get(EAN_UPCS_FIELD) {
            match unroll_ean_upcs(codes) {
                Ok(flat) => {
                    fields.insert(EAN_UPCS_FIELD.to_string(), flat);
                }
                Err(e) => tracing::warn!(
                    product_id = %product_id,
                    shape = codes.kind(),
                    error = %e,
                    "Unable to unroll EAN_UPCS"
                ),
            }
        }

        fields
            .into_iter()
            .filter(|(key, _)| !self.is_excluded(key))
            .map(|(key, value)| (normalize_key(&key), value))
            .collect()
    }
}
