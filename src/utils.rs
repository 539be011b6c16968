//! Utility functions for document decoding, path manipulation and text normalization

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::Path;

/// Leading bytes of a gzip stream
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Parse XML text, accepting the DOCTYPE declarations Icecat documents carry
pub fn parse_xml(text: &str) -> Result<roxmltree::Document<'_>> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    Ok(roxmltree::Document::parse_with_options(text, options)?)
}

/// Whether a byte buffer starts with the gzip magic number
#[must_use]
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

/// Decode a raw document body into text
///
/// Gzip-compressed bodies are inflated first. Invalid UTF-8 sequences are
/// replaced rather than rejected, so one bad byte in a product description
/// does not lose the whole document.
///
/// # Arguments
///
/// * `bytes` - Raw body as downloaded or read from disk
/// * `name` - Document name used in error messages
pub fn decode_document(bytes: Vec<u8>, name: &str) -> Result<String> {
    let bytes = if is_gzip(&bytes) {
        let mut inflated = Vec::with_capacity(bytes.len() * 4);
        GzDecoder::new(bytes.as_slice())
            .read_to_end(&mut inflated)
            .map_err(|e| Error::InvalidReference {
                name: name.to_string(),
                reason: format!("gzip decode failed: {}", e),
            })?;
        inflated
    } else {
        bytes
    };

    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            tracing::warn!(document = name, "Document is not valid UTF-8, replacing invalid bytes");
            Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
        }
    }
}

/// Read a document from disk, inflating it if it is gzip-compressed
pub fn read_document(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| Error::file(path, e))?;
    decode_document(bytes, &path.display().to_string())
}

/// Re-interpret a string's characters as Latin-1 bytes and decode them as UTF-8
///
/// Index paths sometimes arrive as UTF-8 bytes that were decoded as Latin-1.
/// When the string has characters outside Latin-1, or the bytes are not valid
/// UTF-8, the input is returned unchanged.
///
/// # Examples
///
/// ```
/// use icecat_dl::utils::redecode_latin1;
///
/// assert_eq!(redecode_latin1("/prod/caf\u{c3}\u{a9}.xml"), "/prod/café.xml");
/// assert_eq!(redecode_latin1("/prod/1.xml"), "/prod/1.xml");
/// ```
#[must_use]
pub fn redecode_latin1(s: &str) -> String {
    if s.is_ascii() {
        return s.to_string();
    }
    let bytes: Option<Vec<u8>> = s.chars().map(|c| u8::try_from(u32::from(c)).ok()).collect();
    match bytes.map(String::from_utf8) {
        Some(Ok(decoded)) => decoded,
        _ => s.to_string(),
    }
}

/// Local file name for the detail document of the record at `index`
///
/// The final path segment is kept for readability and prefixed with the
/// record's position, so two records whose paths share a basename never
/// write to the same file.
#[must_use]
pub fn local_file_name(index: usize, remote_path: &str) -> String {
    let basename: String = remote_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .chars()
        .map(|c| if c.is_control() || c == ':' { '_' } else { c })
        .collect();
    if basename.is_empty() || basename == "." || basename == ".." {
        format!("{:06}.xml", index)
    } else {
        format!("{:06}-{}", index, basename)
    }
}

/// Capitalize the first letter of every word and lower-case the rest
///
/// A word starts at any letter not preceded by another letter, so digits and
/// punctuation act as separators.
///
/// # Examples
///
/// ```
/// use icecat_dl::utils::title_case;
///
/// assert_eq!(title_case("digital cameras"), "Digital Cameras");
/// assert_eq!(title_case("3d PRINTERS"), "3D Printers");
/// ```
#[must_use]
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}
