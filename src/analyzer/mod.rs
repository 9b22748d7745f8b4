//! Document analysis collaborator boundary.
//!
//! The pipeline treats the OCR/automation service as a black box behind
//! `DocumentAnalyzer`. Two implementations ship with the crate:
//! - `HttpAnalyzer`: AnalyzeDocument-shaped JSON over HTTP
//! - `ReplayAnalyzer`: a saved response read from disk

mod http;
mod replay;

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::{classify_error, HttpAnalyzer, HttpAnalyzerConfig};
pub use replay::ReplayAnalyzer;

/// Analysis features a request can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureType {
    Forms,
    Tables,
    Layout,
    Signatures,
}

impl FeatureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureType::Forms => "FORMS",
            FeatureType::Tables => "TABLES",
            FeatureType::Layout => "LAYOUT",
            FeatureType::Signatures => "SIGNATURES",
        }
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A custom adapter (profile) bound by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterRef {
    pub adapter_id: String,
    pub version: String,
}

impl AdapterRef {
    pub fn new(adapter_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            version: version.into(),
        }
    }
}

/// What to ask the collaborator for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub features: BTreeSet<FeatureType>,
    pub adapter: Option<AdapterRef>,
}

impl AnalysisRequest {
    pub fn new(features: impl IntoIterator<Item = FeatureType>) -> Self {
        Self {
            features: features.into_iter().collect(),
            adapter: None,
        }
    }

    pub fn with_adapter(mut self, adapter: Option<AdapterRef>) -> Self {
        self.adapter = adapter;
        self
    }

    /// Feature names joined with `+`, e.g. `FORMS+TABLES`.
    pub fn feature_list(&self) -> String {
        self.features
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join("+")
    }
}

/// Failure category reported by a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerErrorKind {
    /// The bound adapter/profile does not exist or is not accessible.
    AdapterNotFound,
    /// A requested feature is not supported for this document or account.
    FeatureUnavailable,
    /// Throttling, timeouts, service-side errors. Safe to retry later.
    Transient,
    Fatal,
    /// The service answered, but not with a parseable payload.
    MalformedResponse,
}

impl AnalyzerErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyzerErrorKind::AdapterNotFound => "adapter_not_found",
            AnalyzerErrorKind::FeatureUnavailable => "feature_unavailable",
            AnalyzerErrorKind::Transient => "transient",
            AnalyzerErrorKind::Fatal => "fatal",
            AnalyzerErrorKind::MalformedResponse => "malformed_response",
        }
    }

    /// Whether a reduced request may succeed where this one failed.
    pub fn allows_fallback(&self) -> bool {
        matches!(
            self,
            AnalyzerErrorKind::AdapterNotFound | AnalyzerErrorKind::FeatureUnavailable
        )
    }
}

impl fmt::Display for AnalyzerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct AnalyzerError {
    pub kind: AnalyzerErrorKind,
    pub message: String,
}

impl AnalyzerError {
    pub fn new(kind: AnalyzerErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn adapter_not_found(message: impl Into<String>) -> Self {
        Self::new(AnalyzerErrorKind::AdapterNotFound, message)
    }

    pub fn feature_unavailable(message: impl Into<String>) -> Self {
        Self::new(AnalyzerErrorKind::FeatureUnavailable, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(AnalyzerErrorKind::Transient, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(AnalyzerErrorKind::Fatal, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(AnalyzerErrorKind::MalformedResponse, message)
    }
}

/// Black-box document analysis service.
///
/// Returns the raw response payload; the pipeline builds the block graph.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn analyze(
        &self,
        document: &[u8],
        request: &AnalysisRequest,
    ) -> Result<serde_json::Value, AnalyzerError>;
}
