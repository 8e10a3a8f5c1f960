//! Turns requirement documents into plain text for the generator.
//!
//! Supported inputs are PDF, DOCX, XML, JSON, Markdown and plain text. Every
//! call checks that the file exists, that its extension is supported and that
//! it fits under the configured size limit before any parsing happens.

use crate::domain::error::{AppError, Result};
use crate::domain::requirement::{DocumentMetadata, ExtractedDocument};
use crate::infrastructure::artifact_store::sha256_hex_file;
use std::fs;
use std::path::Path;

mod docx;
mod pdf;
mod text;
mod xml;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Xml,
    Json,
    Markdown,
    Text,
}

impl DocumentFormat {
    pub const ALL: [DocumentFormat; 6] = [
        DocumentFormat::Pdf,
        DocumentFormat::Docx,
        DocumentFormat::Xml,
        DocumentFormat::Json,
        DocumentFormat::Markdown,
        DocumentFormat::Text,
    ];

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            "xml" => Some(DocumentFormat::Xml),
            "json" => Some(DocumentFormat::Json),
            "md" => Some(DocumentFormat::Markdown),
            "txt" => Some(DocumentFormat::Text),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Xml => "xml",
            DocumentFormat::Json => "json",
            DocumentFormat::Markdown => "md",
            DocumentFormat::Text => "txt",
        }
    }
}

pub struct TextExtractor {
    max_file_size_bytes: u64,
}

impl TextExtractor {
    pub fn new(max_file_size_mb: u64) -> Self {
        Self {
            max_file_size_bytes: max_file_size_mb.max(1) * 1024 * 1024,
        }
    }

    pub fn supported_formats() -> Vec<&'static str> {
        DocumentFormat::ALL.iter().map(DocumentFormat::as_str).collect()
    }

    pub fn detect_format(path: &Path) -> Result<DocumentFormat> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        DocumentFormat::from_extension(ext).ok_or_else(|| {
            AppError::UnsupportedFormat(format!(
                "Unsupported file format: .{}. Supported formats: {}",
                ext.to_ascii_lowercase(),
                Self::supported_formats().join(", ")
            ))
        })
    }

    /// Returns the file size, or `InvalidInput` when it is over the limit.
    pub fn validate_file_size(&self, path: &Path) -> Result<u64> {
        let size = fs::metadata(path)
            .map_err(|e| AppError::IoError(format!("Failed to stat {}: {}", path.display(), e)))?
            .len();
        if size > self.max_file_size_bytes {
            return Err(AppError::InvalidInput(format!(
                "File size ({:.2} MB) exceeds maximum allowed size ({} MB)",
                size as f64 / (1024.0 * 1024.0),
                self.max_file_size_bytes / (1024 * 1024)
            )));
        }
        Ok(size)
    }

    pub fn extract_metadata(&self, path: &Path) -> Result<DocumentMetadata> {
        ensure_exists(path)?;
        let meta = fs::metadata(path)
            .map_err(|e| AppError::IoError(format!("Failed to stat {}: {}", path.display(), e)))?;
        let format = Self::detect_format(path)?;

        Ok(DocumentMetadata {
            file_name: path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string(),
            size_bytes: meta.len(),
            format: format.as_str().to_string(),
            modified: meta
                .modified()
                .ok()
                .map(|time| chrono::DateTime::<chrono::Local>::from(time).to_rfc3339()),
            sha256: sha256_hex_file(path)?,
        })
    }

    pub fn extract_text(&self, path: &Path) -> Result<String> {
        ensure_exists(path)?;
        let format = Self::detect_format(path)?;
        self.validate_file_size(path)?;

        tracing::info!(file = %path.display(), format = format.as_str(), "Extracting document text");
        let text = match format {
            DocumentFormat::Pdf => pdf::extract(path)?,
            DocumentFormat::Docx => docx::extract(path)?,
            DocumentFormat::Xml => xml::extract(path)?,
            DocumentFormat::Json => text::extract_json(path)?,
            DocumentFormat::Markdown | DocumentFormat::Text => text::extract_plain(path)?,
        };
        tracing::debug!(file = %path.display(), chars = text.chars().count(), "Extraction finished");
        Ok(text)
    }

    pub fn extract(&self, path: &Path) -> Result<ExtractedDocument> {
        let text = self.extract_text(path)?;
        let metadata = self.extract_metadata(path)?;
        Ok(ExtractedDocument { text, metadata })
    }
}

fn ensure_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(AppError::NotFound(format!("File not found: {}", path.display())));
    }
    Ok(())
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| AppError::IoError(format!("Failed to read {}: {}", path.display(), e)))
}
