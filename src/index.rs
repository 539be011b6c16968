//! Catalog index parsing
//!
//! Converts the `files.index` document into [`CatalogRecord`]s. Every `file`
//! element below `files.index` becomes one record; elements are converted into
//! [`Value`] trees depth-first, and the [`RecordPostprocessor`] decides the
//! final name (or omission) of every attribute and child on the way up.

use crate::error::{Error, Result};
use crate::postprocess::{LEAF_KEY, PostprocessAction, RecordPostprocessor};
use crate::types::{CatalogRecord, Fields, Value};
use crate::utils::{decode_document, parse_xml};
use std::collections::HashSet;

/// Maximum element nesting accepted in the index document
pub const MAX_TREE_DEPTH: usize = 64;

/// Element wrapping the leaf records
const FILES_INDEX: &str = "files.index";

/// Key holding non-whitespace text of an element that also has attributes or children
pub const TEXT_KEY: &str = "#text";

/// Parser for the catalog index document
#[derive(Debug)]
pub struct IndexParser<'a> {
    postprocessor: &'a RecordPostprocessor,
}

impl<'a> IndexParser<'a> {
    /// Create a parser running every converted key through `postprocessor`
    pub fn new(postprocessor: &'a RecordPostprocessor) -> Self {
        Self { postprocessor }
    }

    /// Parse a raw index body, inflating it first when it is gzip-compressed
    pub fn parse_bytes(&self, bytes: Vec<u8>) -> Result<Vec<CatalogRecord>> {
        let text = decode_document(bytes, "index")?;
        self.parse_str(&text)
    }

    /// Parse index XML text
    pub fn parse_str(&self, xml: &str) -> Result<Vec<CatalogRecord>> {
        let doc = parse_xml(xml)?;
        self.parse(&doc)
    }

    /// Collect the leaf records of a parsed index document, in document order
    pub fn parse(&self, doc: &roxmltree::Document<'_>) -> Result<Vec<CatalogRecord>> {
        let root = doc.root_element();
        let files = root
            .children()
            .find(|n| n.has_tag_name(FILES_INDEX))
            .ok_or_else(|| {
                Error::InvalidIndex(format!(
                    "root element {} has no {} child",
                    root.tag_name().name(),
                    FILES_INDEX
                ))
            })?;

        let path = vec![
            root.tag_name().name().to_string(),
            FILES_INDEX.to_string(),
        ];

        let mut records = Vec::new();
        for node in files.children().filter(|n| n.is_element()) {
            let name = node.tag_name().name();
            if name != LEAF_KEY {
                tracing::debug!(element = name, "Ignoring non-record element in index");
                continue;
            }

            let mut child_path = path.clone();
            child_path.push(name.to_string());
            let value = self.convert(node, &mut child_path)?;

            match self.postprocessor.process(&path, name, value) {
                PostprocessAction::Keep(_, Value::Map(fields))
                | PostprocessAction::Rename(_, Value::Map(fields)) => {
                    records.push(CatalogRecord::from_fields(fields));
                }
                PostprocessAction::Omit => {}
                PostprocessAction::Keep(_, other) | PostprocessAction::Rename(_, other) => {
                    tracing::warn!(shape = other.kind(), "Skipping index entry without fields");
                }
            }
        }

        tracing::info!(records = records.len(), "Parsed products from catalog index");
        Ok(records)
    }

    /// Convert one element; `path` ends with the element's own name
    fn convert(&self, node: roxmltree::Node<'_, '_>, path: &mut Vec<String>) -> Result<Value> {
        if path.len() > MAX_TREE_DEPTH {
            return Err(Error::InvalidIndex(format!(
                "element nesting exceeds {} levels at {}",
                MAX_TREE_DEPTH,
                path.join("/")
            )));
        }

        let mut fields = Fields::new();
        let mut repeated: HashSet<String> = HashSet::new();
        let mut has_structure = false;

        for attr in node.attributes() {
            has_structure = true;
            let action = self
                .postprocessor
                .process(path, attr.name(), Value::Scalar(attr.value().to_string()));
            insert(&mut fields, &mut repeated, action);
        }

        for child in node.children().filter(|n| n.is_element()) {
            has_structure = true;
            let name = child.tag_name().name();
            path.push(name.to_string());
            let value = self.convert(child, path);
            path.pop();
            let action = self.postprocessor.process(path, name, value?);
            insert(&mut fields, &mut repeated, action);
        }

        let text: String = node
            .children()
            .filter(|n| n.is_text())
            .filter_map(|n| n.text())
            .collect();
        let text = text.trim();

        if !has_structure {
            return Ok(Value::Scalar(text.to_string()));
        }
        if !text.is_empty() {
            fields.insert(TEXT_KEY.to_string(), Value::Scalar(text.to_string()));
        }
        Ok(Value::Map(fields))
    }
}

/// Apply a postprocessor decision, turning repeated keys into lists
fn insert(fields: &mut Fields, repeated: &mut HashSet<String>, action: PostprocessAction) {
    let (key, value) = match action {
        PostprocessAction::Omit => return,
        PostprocessAction::Keep(key, value) | PostprocessAction::Rename(key, value) => (key, value),
    };

    match fields.remove(&key) {
        None => {
            fields.insert(key, value);
        }
        Some(Value::List(mut items)) if repeated.contains(&key) => {
            items.push(value);
            fields.insert(key, Value::List(items));
        }
        Some(previous) => {
            repeated.insert(key.clone());
            fields.insert(key, Value::List(vec![previous, value]));
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::CategoryTable;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use std::sync::Arc;

    const INDEX_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE ICECAT-interface SYSTEM "http://data.icecat.biz/dtd/files.index.dtd">
<ICECAT-interface>
  <files.index Generated="20240101000000">
    <file path="export/freexml.int/EN/1.xml" Product_ID="1" Updated="20240101" Quality="ICECAT"
          Supplier_id="1" Prod_ID="A1" Catid="575" On_Market="1" Model_Name="PowerShot"
          ReleaseDate="2021-03-01">
      <EAN_UPCS>
        <EAN_UPC Value="111"/>
      </EAN_UPCS>
      <Country_Markets>
        <Country_Market Value="NL"/>
        <Country_Market Value="BE"/>
      </Country_Markets>
    </file>
    <file path="export/freexml.int/EN/2.xml" Product_ID="2" Catid="119">
      <EAN_UPCS>
        <EAN_UPC Value="221"/>
        <EAN_UPC Value="222"/>
      </EAN_UPCS>
      <M_Prod_ID Supplier_id="3">alt-2</M_Prod_ID>
    </file>
    <file path="export/freexml.int/EN/3.xml" Product_ID="3" Catid="42"/>
  </files.index>
</ICECAT-interface>"#;

    fn postprocessor() -> RecordPostprocessor {
        let categories: CategoryTable = [
            ("575".to_string(), "digital cameras".to_string()),
            ("119".to_string(), "mobile phones".to_string()),
        ]
        .into_iter()
        .collect();
        RecordPostprocessor::new(Arc::new(categories), vec!["Country_Markets".to_string()])
    }

    #[test]
    fn parses_leaf_records_in_order() {
        let pp = postprocessor();
        let records = IndexParser::new(&pp).parse_str(INDEX_XML).unwrap();
        assert_eq!(records.len(), 3);
        let ids: Vec<_> = records.iter().map(|r| r.product_id().unwrap()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn record_fields_are_normalized() {
        let pp = postprocessor();
        let records = IndexParser::new(&pp).parse_str(INDEX_XML).unwrap();
        let first = &records[0];

        assert_eq!(first.path(), Some("export/freexml.int/EN/1.xml"));
        assert_eq!(first.category_id(), Some("575"));
        assert_eq!(first.get_str("category"), Some("Digital Cameras"));
        assert_eq!(first.get_str("release_date"), Some("2021-03-01"));
        assert_eq!(first.get_str("model_name"), Some("PowerShot"));
        assert_eq!(first.get_str("supplier_id"), Some("1"));
        assert_eq!(first.get("ean_upcs"), Some(&Value::List(vec!["111".into()])));
        assert!(!first.contains_key("country_markets"));
        assert!(first.keys().all(|k| k == k.to_lowercase()));
    }

    #[test]
    fn repeated_children_become_lists() {
        let pp = postprocessor();
        let records = IndexParser::new(&pp).parse_str(INDEX_XML).unwrap();
        assert_eq!(
            records[1].get("ean_upcs"),
            Some(&Value::List(vec!["221".into(), "222".into()]))
        );
    }

    #[test]
    fn mixed_text_is_kept_under_text_key() {
        let pp = postprocessor();
        let records = IndexParser::new(&pp).parse_str(INDEX_XML).unwrap();
        let alt = records[1].get("m_prod_id").and_then(Value::as_map).unwrap();
        assert_eq!(alt[TEXT_KEY], Value::from("alt-2"));
        assert_eq!(alt["supplier_id"], Value::from("3"));
    }

    #[test]
    fn unknown_category_still_produces_record() {
        let pp = postprocessor();
        let records = IndexParser::new(&pp).parse_str(INDEX_XML).unwrap();
        assert_eq!(records[2].category_id(), Some("42"));
        assert!(!records[2].contains_key("category"));
    }

    #[test]
    fn gzip_index_is_inflated() {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(INDEX_XML.as_bytes()).unwrap();
        let compressed = enc.finish().unwrap();

        let pp = postprocessor();
        let records = IndexParser::new(&pp).parse_bytes(compressed).unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn missing_files_index_is_an_error() {
        let pp = postprocessor();
        let result = IndexParser::new(&pp).parse_str("<ICECAT-interface><other/></ICECAT-interface>");
        assert!(matches!(result, Err(Error::InvalidIndex(_))));
    }

    #[test]
    fn empty_index_is_not_an_error() {
        let pp = postprocessor();
        let records = IndexParser::new(&pp)
            .parse_str("<ICECAT-interface><files.index/></ICECAT-interface>")
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn excessive_nesting_is_rejected() {
        let depth = MAX_TREE_DEPTH + 5;
        let mut xml = String::from(r#"<ICECAT-interface><files.index><file path="p" Catid="575">"#);
        for _ in 0..depth {
            xml.push_str("<n>");
        }
        for _ in 0..depth {
            xml.push_str("</n>");
        }
        xml.push_str("</file></files.index></ICECAT-interface>");

        let pp = postprocessor();
        let result = IndexParser::new(&pp).parse_str(&xml);
        assert!(matches!(result, Err(Error::InvalidIndex(msg)) if msg.contains("nesting")));
    }

    #[test]
    fn insert_accumulates_repeats_but_keeps_list_values() {
        let mut fields = Fields::new();
        let mut repeated = HashSet::new();
        let list = Value::List(vec!["a".into()]);
        insert(&mut fields, &mut repeated, PostprocessAction::Keep("k".into(), list.clone()));
        assert_eq!(fields["k"], list);

        insert(&mut fields, &mut repeated, PostprocessAction::Keep("k".into(), "b".into()));
        assert_eq!(fields["k"], Value::List(vec![list, "b".into()]));

        insert(&mut fields, &mut repeated, PostprocessAction::Omit);
        assert_eq!(fields.len(), 1);
    }
}
