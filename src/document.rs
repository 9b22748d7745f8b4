//! Document types and upload validation.
//!
//! The document type is always supplied by the caller; nothing here looks at
//! content to classify a document. Upload validation runs before the
//! pipeline so the collaborator only ever sees PDF, PNG, or JPEG bytes.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Synchronous analysis accepts documents up to 10 MiB.
pub const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 10 * 1024 * 1024;

/// Content types accepted for analysis.
pub const ACCEPTED_CONTENT_TYPES: &[&str] = &["application/pdf", "image/png", "image/jpeg"];

/// Document type tag selecting the field extractor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    #[value(name = "w2")]
    W2,
    #[value(name = "bank_statement")]
    BankStatement,
    #[value(name = "generic")]
    Generic,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::W2 => "w2",
            DocumentType::BankStatement => "bank_statement",
            DocumentType::Generic => "generic",
        }
    }

    pub fn all() -> [DocumentType; 3] {
        [
            DocumentType::W2,
            DocumentType::BankStatement,
            DocumentType::Generic,
        ]
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "w2" | "w-2" => Ok(DocumentType::W2),
            "bank_statement" | "bank-statement" => Ok(DocumentType::BankStatement),
            "generic" => Ok(DocumentType::Generic),
            other => Err(DocumentError::UnknownDocumentType(other.to_string())),
        }
    }
}

/// Reasons an upload is rejected before analysis.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Unknown document type: {0} (expected w2, bank_statement, or generic)")]
    UnknownDocumentType(String),

    #[error("Unsupported content type: {0}. Supported: application/pdf, image/png, image/jpeg")]
    UnsupportedContentType(String),

    #[error("Document is empty")]
    Empty,

    #[error("Document is {size} bytes, larger than the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("Declared content type {declared} does not match detected {detected}")]
    ContentMismatch { declared: String, detected: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw document bytes plus the declared content type.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl DocumentUpload {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: normalize_content_type(&content_type.into()),
        }
    }

    /// Read a file, declaring its content type from the extension unless given.
    pub fn from_path(path: &Path, content_type: Option<&str>) -> Result<Self, DocumentError> {
        let bytes = std::fs::read(path)?;
        let content_type = match content_type {
            Some(ct) => ct.to_string(),
            None => mime_guess::from_path(path)
                .first_raw()
                .unwrap_or("application/octet-stream")
                .to_string(),
        };
        Ok(Self::new(bytes, content_type))
    }

    /// Check content type, size, and magic bytes.
    pub fn validate(&self, max_bytes: u64) -> Result<(), DocumentError> {
        if !ACCEPTED_CONTENT_TYPES.contains(&self.content_type.as_str()) {
            return Err(DocumentError::UnsupportedContentType(
                self.content_type.clone(),
            ));
        }
        if self.bytes.is_empty() {
            return Err(DocumentError::Empty);
        }
        let size = self.bytes.len() as u64;
        if size > max_bytes {
            return Err(DocumentError::TooLarge {
                size,
                limit: max_bytes,
            });
        }

        match infer::get(&self.bytes) {
            Some(kind) if kind.mime_type() == self.content_type => Ok(()),
            Some(kind) => Err(DocumentError::ContentMismatch {
                declared: self.content_type.clone(),
                detected: kind.mime_type().to_string(),
            }),
            None => Err(DocumentError::ContentMismatch {
                declared: self.content_type.clone(),
                detected: "unknown".to_string(),
            }),
        }
    }

    /// Hex SHA-256 of the document bytes.
    pub fn sha256(&self) -> String {
        content_hash(&self.bytes)
    }
}

/// Hex SHA-256 of arbitrary bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn normalize_content_type(content_type: &str) -> String {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    match essence.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        _ => essence,
    }
}
