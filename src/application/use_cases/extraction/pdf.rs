use crate::domain::error::{AppError, Result};
use lopdf::Document;
use std::path::Path;

/// Text layer of every page, pages separated by newlines. Scanned PDFs without
/// a text layer come back empty.
pub(super) fn extract(path: &Path) -> Result<String> {
    let document = Document::load(path)
        .map_err(|e| AppError::InvalidInput(format!("Failed to load PDF: {}", e)))?;

    let mut pages = Vec::new();
    for (page_num, (page_id, _)) in document.get_pages() {
        match document.extract_text(&[page_id]) {
            Ok(page_text) => {
                let trimmed = page_text.trim();
                if !trimmed.is_empty() {
                    pages.push(trimmed.to_string());
                }
            }
            Err(e) => {
                tracing::warn!(page = page_num, error = %e, "Skipping unreadable PDF page");
            }
        }
    }

    if pages.is_empty() {
        tracing::warn!(file = %path.display(), "PDF has no text layer");
    }
    Ok(pages.join("\n"))
}
