//! Detail field extraction from per-product XML documents.
//!
//! Two selector forms are supported:
//! - `Element`: every `Element` in the document contributes either its text
//!   (stored under the lower-cased tag) or, when the text has no word
//!   characters, each of its attributes (stored under lower-cased attribute names)
//! - `Element[@Attr]` (optionally `Parent/Element[@Attr]`): the first element
//!   below the root matching the path and carrying `Attr` contributes that
//!   attribute, stored under the lower-cased attribute name

use crate::error::{Error, Result};
use crate::utils::{parse_xml, read_document};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Field name → value pairs extracted from one detail document
pub type ExtractedFields = BTreeMap<String, String>;

/// Selects one or more fields from a detail document
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldSelector {
    /// `Element`: text of every matching element, or its attributes
    Plain {
        /// Element name
        tag: String,
    },
    /// `Element[@Attr]`: one attribute of the first matching element
    Annotated {
        /// Element names from outermost to the target element; `*` matches any name
        path: Vec<String>,
        /// Attribute to read
        attribute: String,
    },
}

impl FromStr for FieldSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidSelector("empty selector".to_string()));
        }

        let Some(at) = s.find('@') else {
            if !is_name(s) {
                return Err(Error::InvalidSelector(format!(
                    "'{}' is not an element name",
                    s
                )));
            }
            return Ok(FieldSelector::Plain { tag: s.to_string() });
        };

        let (Some(open), Some(close)) = (s.find('['), s.rfind(']')) else {
            return Err(Error::InvalidSelector(format!(
                "'{}' must have the form Element[@Attribute]",
                s
            )));
        };
        if !(open + 1 == at && close == s.len() - 1) {
            return Err(Error::InvalidSelector(format!(
                "'{}' must have the form Element[@Attribute]",
                s
            )));
        }

        let attribute = &s[at + 1..close];
        if !is_name(attribute) {
            return Err(Error::InvalidSelector(format!(
                "'{}' has an invalid attribute name '{}'",
                s, attribute
            )));
        }

        let path: Vec<String> = s[..open]
            .split('/')
            .filter(|seg| !seg.is_empty() && *seg != ".")
            .map(str::to_string)
            .collect();
        if path.is_empty() || path.iter().any(|seg| seg != "*" && !is_name(seg)) {
            return Err(Error::InvalidSelector(format!(
                "'{}' has an invalid element path",
                s
            )));
        }

        Ok(FieldSelector::Annotated {
            path,
            attribute: attribute.to_string(),
        })
    }
}

impl fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSelector::Plain { tag } => write!(f, "{}", tag),
            FieldSelector::Annotated { path, attribute } => {
                write!(f, "{}[@{}]", path.join("/"), attribute)
            }
        }
    }
}

/// XML-ish name check: no whitespace, no selector syntax
fn is_name(s: &str) -> bool {
    !s.is_empty()
        && !s
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '[' | ']' | '@' | '/' | '=' | '"' | '\''))
}

/// Applies a fixed, ordered list of selectors to detail documents
#[derive(Clone, Debug)]
pub struct DetailExtractor {
    selectors: Vec<FieldSelector>,
    word_char: Regex,
}

impl DetailExtractor {
    /// Create an extractor for the given selectors (applied in order)
    pub fn new(selectors: Vec<FieldSelector>) -> Result<Self> {
        let word_char = Regex::new(r"\w")
            .map_err(|e| Error::InvalidSelector(format!("word pattern: {}", e)))?;
        Ok(Self {
            selectors,
            word_char,
        })
    }

    /// Parse selector strings and create an extractor
    pub fn from_strings<S: AsRef<str>>(selectors: &[S]) -> Result<Self> {
        let parsed = selectors
            .iter()
            .map(|s| s.as_ref().parse())
            .collect::<Result<Vec<FieldSelector>>>()?;
        Self::new(parsed)
    }

    /// Selectors in application order
    pub fn selectors(&self) -> &[FieldSelector] {
        &self.selectors
    }

    /// Extract fields from a parsed document.
    ///
    /// Later selectors overwrite keys set by earlier ones; selectors matching
    /// nothing contribute nothing.
    pub fn extract(&self, doc: &roxmltree::Document<'_>) -> ExtractedFields {
        let mut fields = ExtractedFields::new();
        for selector in &self.selectors {
            match selector {
                FieldSelector::Annotated { path, attribute } => {
                    if let Some(value) = find_attribute(doc, path, attribute) {
                        fields.insert(attribute.to_lowercase(), value.to_string());
                    }
                }
                FieldSelector::Plain { tag } => {
                    for node in doc
                        .descendants()
                        .filter(|n| n.is_element() && n.tag_name().name() == tag)
                    {
                        match node.text() {
                            Some(text) if self.word_char.is_match(text) => {
                                fields.insert(tag.to_lowercase(), text.to_string());
                            }
                            _ => {
                                for attr in node.attributes() {
                                    fields.insert(attr.name().to_lowercase(), attr.value().to_string());
                                }
                            }
                        }
                    }
                }
            }
        }
        fields
    }

    /// Extract fields from XML text
    pub fn extract_str(&self, xml: &str) -> Result<ExtractedFields> {
        let doc = parse_xml(xml)?;
        Ok(self.extract(&doc))
    }

    /// Read, parse and extract a detail document stored on disk.
    ///
    /// With `cleanup` set, the file is deleted after a successful extraction.
    /// Failing to delete it is logged and does not affect the result.
    pub fn extract_file(&self, path: &Path, cleanup: bool) -> Result<ExtractedFields> {
        let content = read_document(path)?;
        let fields = self.extract_str(&content)?;
        tracing::debug!(path = %path.display(), fields = fields.len(), "Parsed product details");

        if cleanup && let Err(e) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "Unable to delete temp file");
        }
        Ok(fields)
    }
}

/// First element below the root whose name chain ends with `path` and that carries `attribute`
fn find_attribute<'a>(
    doc: &'a roxmltree::Document<'_>,
    path: &[String],
    attribute: &str,
) -> Option<&'a str> {
    let root = doc.root_element();
    root.descendants()
        .skip(1)
        .filter(|n| n.is_element())
        .find(|n| n.has_attribute(attribute) && matches_path(*n, path))
        .and_then(|n| n.attribute(attribute))
}

fn matches_path(node: roxmltree::Node<'_, '_>, path: &[String]) -> bool {
    let mut current = Some(node);
    for segment in path.iter().rev() {
        let Some(n) = current.filter(|n| n.is_element()) else {
            return false;
        };
        if segment != "*" && n.tag_name().name() != segment {
            return false;
        }
        current = n.parent();
    }
    true
}
