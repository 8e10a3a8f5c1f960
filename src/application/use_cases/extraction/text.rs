use super::read_bytes;
use crate::domain::error::{AppError, Result};
use encoding_rs::{Encoding, WINDOWS_1252};
use std::path::Path;

/// Markdown and plain text are returned as-is.
pub(super) fn extract_plain(path: &Path) -> Result<String> {
    Ok(decode_text(&read_bytes(path)?))
}

/// JSON is re-serialized with indentation so the model sees a readable tree.
pub(super) fn extract_json(path: &Path) -> Result<String> {
    let raw = decode_text(&read_bytes(path)?);
    let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
        AppError::InvalidInput(format!("Failed to parse JSON {}: {}", path.display(), e))
    })?;
    serde_json::to_string_pretty(&value)
        .map_err(|e| AppError::Internal(format!("Failed to format JSON: {}", e)))
}

/// UTF-8 first (BOM stripped), then any BOM-declared encoding, then Windows-1252.
pub(super) fn decode_text(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text.into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            tracing::debug!("Input is not UTF-8, decoding as Windows-1252");
            let (text, _, _) = WINDOWS_1252.decode(bytes);
            text.into_owned()
        }
    }
}
