//! Offline collaborator serving a saved AnalyzeDocument response.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{AnalysisRequest, AnalyzerError, DocumentAnalyzer};

/// Returns the same saved response for every request.
#[derive(Debug, Clone)]
pub struct ReplayAnalyzer {
    path: PathBuf,
}

impl ReplayAnalyzer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DocumentAnalyzer for ReplayAnalyzer {
    fn name(&self) -> &str {
        "replay"
    }

    async fn analyze(
        &self,
        document: &[u8],
        request: &AnalysisRequest,
    ) -> Result<serde_json::Value, AnalyzerError> {
        debug!(
            "Replaying {} for {} byte document ({})",
            self.path.display(),
            document.len(),
            request.feature_list()
        );

        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            AnalyzerError::fatal(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            AnalyzerError::malformed(format!("Invalid JSON in {}: {}", self.path.display(), e))
        })
    }
}
