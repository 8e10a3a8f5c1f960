use serde::{Deserialize, Serialize};

/// Requirements text pulled out of an uploaded document.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RequirementDocument {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub content: String,
    pub source_file: Option<String>,
    pub file_format: Option<String>,
    pub project_name: Option<String>,
    pub content_hash: Option<String>,
    pub extracted_date: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DocumentMetadata {
    pub file_name: String,
    pub size_bytes: u64,
    pub format: String,
    pub modified: Option<String>,
    pub sha256: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExtractedDocument {
    pub text: String,
    pub metadata: DocumentMetadata,
}
