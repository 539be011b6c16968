//! Reference tables: category and supplier id → display name
//!
//! Both tables are parsed once from the vendor's reference documents and then
//! shared read-only (behind an `Arc`) by the postprocessor and enrichment workers.

use crate::error::{Error, LookupError, Result};
use crate::utils::parse_xml;
use serde::Serialize;
use std::collections::BTreeMap;

/// Name used when a reference entry has no usable name
pub const UNKNOWN_NAME: &str = "Unknown";

/// Category id → category name in the configured language
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CategoryTable {
    names: BTreeMap<String, String>,
}

impl CategoryTable {
    /// Build the table from a parsed `CategoriesList` document.
    ///
    /// Each `Category` element contributes its `ID` attribute, named by the
    /// `Value` of the first direct `Name` child whose `langid` equals
    /// `language_id`. Categories without such a name (or with an empty one)
    /// map to [`UNKNOWN_NAME`].
    pub fn parse(doc: &roxmltree::Document<'_>, language_id: &str) -> Result<Self> {
        let mut names = BTreeMap::new();
        for category in doc.descendants().filter(|n| n.has_tag_name("Category")) {
            let Some(id) = category.attribute("ID") else {
                tracing::debug!("Skipping category without ID attribute");
                continue;
            };

            let name = category
                .children()
                .filter(|n| n.has_tag_name("Name"))
                .find(|n| n.attribute("langid") == Some(language_id))
                .and_then(|n| n.attribute("Value"))
                .filter(|v| !v.is_empty())
                .unwrap_or(UNKNOWN_NAME);

            names.insert(id.to_string(), name.to_string());
        }

        if names.is_empty() {
            return Err(Error::InvalidReference {
                name: "categories".to_string(),
                reason: "no Category elements with an ID".to_string(),
            });
        }

        tracing::info!(count = names.len(), language_id, "Parsed categories");
        Ok(Self { names })
    }

    /// Parse the table from XML text
    pub fn parse_str(xml: &str, language_id: &str) -> Result<Self> {
        let doc = parse_xml(xml)?;
        Self::parse(&doc, language_id)
    }

    /// Display name for a category id
    pub fn lookup(&self, id: &str) -> std::result::Result<&str, LookupError> {
        self.names
            .get(id)
            .map(String::as_str)
            .ok_or_else(|| LookupError::NotFound {
                table: "category",
                id: id.to_string(),
            })
    }

    /// Number of categories
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate `(id, name)` pairs in id order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for CategoryTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

/// Supplier id → manufacturer name
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SupplierTable {
    names: BTreeMap<String, String>,
}

impl SupplierTable {
    /// Build the table from a parsed supplier mapping document
    /// (`SupplierMapping` elements with `supplier_id` and `name` attributes)
    pub fn parse(doc: &roxmltree::Document<'_>) -> Result<Self> {
        let mut names = BTreeMap::new();
        for mapping in doc.descendants().filter(|n| n.has_tag_name("SupplierMapping")) {
            let Some(id) = mapping.attribute("supplier_id") else {
                continue;
            };
            let name = mapping
                .attribute("name")
                .filter(|v| !v.is_empty())
                .unwrap_or(UNKNOWN_NAME);
            names.insert(id.to_string(), name.to_string());
        }

        if names.is_empty() {
            return Err(Error::InvalidReference {
                name: "suppliers".to_string(),
                reason: "no SupplierMapping elements with a supplier_id".to_string(),
            });
        }

        tracing::info!(count = names.len(), "Parsed suppliers");
        Ok(Self { names })
    }

    /// Parse the table from XML text
    pub fn parse_str(xml: &str) -> Result<Self> {
        let doc = parse_xml(xml)?;
        Self::parse(&doc)
    }

    /// Manufacturer name for a supplier id
    pub fn lookup(&self, id: &str) -> std::result::Result<&str, LookupError> {
        self.names
            .get(id)
            .map(String::as_str)
            .ok_or_else(|| LookupError::NotFound {
                table: "supplier",
                id: id.to_string(),
            })
    }

    /// Number of suppliers
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<(String, String)> for SupplierTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}
