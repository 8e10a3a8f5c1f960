use super::read_bytes;
use super::text::decode_text;
use crate::domain::error::Result;
use scraper::Html;
use std::path::Path;

/// Concatenated text nodes of the document, one trimmed node per line.
pub(super) fn extract(path: &Path) -> Result<String> {
    let raw = decode_text(&read_bytes(path)?);
    Ok(xml_text(&raw))
}

fn xml_text(raw: &str) -> String {
    let document = Html::parse_document(raw);
    document
        .root_element()
        .text()
        .map(str::trim)
        .filter(|node| !node.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
