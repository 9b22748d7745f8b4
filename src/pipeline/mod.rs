//! Document processing pipeline.
//!
//! One run calls the bound analyzer, falls back at most once to a reduced
//! request, builds the block graph, and extracts fields:
//!
//! ```text
//! Idle -> Invoking -> Extracting -> Succeeded
//!            |             ^
//!            v             |
//!      FallbackInvoking ---+        (any active state) -> Failed
//! ```
//!
//! Only `AdapterNotFound` and `FeatureUnavailable` trigger the fallback.
//! The pipeline never retries on its own and sets no timeouts; transient
//! failures are the collaborator's business.

mod state;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analyzer::{
    AdapterRef, AnalysisRequest, AnalyzerError, AnalyzerErrorKind, DocumentAnalyzer, FeatureType,
};
use crate::blocks::BlockGraph;
use crate::confidence::{summarize, ConfidenceSummary};
use crate::document::{content_hash, DocumentType};
use crate::extract::{extractor_for, ExtractedFields};

pub use state::{IllegalTransition, PipelineState, StateMachine};

/// How the fields in a result were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Primary request with a bound adapter.
    Adapter,
    /// Primary request without an adapter.
    Standard,
    /// Reduced request after the primary one was rejected.
    Fallback,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Adapter => "adapter",
            ExtractionMethod::Standard => "standard",
            ExtractionMethod::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    AdapterNotFound,
    FeatureUnavailable,
    Transient,
    Fatal,
    /// The collaborator answered with something that is not a block graph.
    MalformedResponse,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::AdapterNotFound => "adapter_not_found",
            FailureKind::FeatureUnavailable => "feature_unavailable",
            FailureKind::Transient => "transient",
            FailureKind::Fatal => "fatal",
            FailureKind::MalformedResponse => "malformed_response",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<AnalyzerErrorKind> for FailureKind {
    fn from(kind: AnalyzerErrorKind) -> Self {
        match kind {
            AnalyzerErrorKind::AdapterNotFound => FailureKind::AdapterNotFound,
            AnalyzerErrorKind::FeatureUnavailable => FailureKind::FeatureUnavailable,
            AnalyzerErrorKind::Transient => FailureKind::Transient,
            AnalyzerErrorKind::Fatal => FailureKind::Fatal,
            AnalyzerErrorKind::MalformedResponse => FailureKind::MalformedResponse,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Pipeline failed ({kind}): {message}")]
pub struct PipelineFailure {
    pub kind: FailureKind,
    pub message: String,
    /// States visited, ending in `Failed`.
    pub states: Vec<PipelineState>,
}

/// Feature selection for primary and fallback requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeaturePolicy {
    pub baseline: BTreeSet<FeatureType>,
    /// Ask for LAYOUT on W-2s.
    pub w2_layout: bool,
}

impl FeaturePolicy {
    pub fn new(w2_layout: bool) -> Self {
        Self {
            baseline: [FeatureType::Forms, FeatureType::Tables].into_iter().collect(),
            w2_layout,
        }
    }

    pub fn primary_request(&self, document_type: DocumentType, adapter: Option<AdapterRef>) -> AnalysisRequest {
        let mut features = self.baseline.clone();
        if document_type == DocumentType::W2 && self.w2_layout {
            features.insert(FeatureType::Layout);
        }
        AnalysisRequest::new(features).with_adapter(adapter)
    }

    /// Baseline features, no adapter.
    pub fn reduced_request(&self) -> AnalysisRequest {
        AnalysisRequest::new(self.baseline.iter().copied())
    }
}

impl Default for FeaturePolicy {
    fn default() -> Self {
        Self::new(true)
    }
}

/// An analyzer plus the adapter to use with it, if any.
#[derive(Clone)]
pub struct ServiceBinding {
    pub analyzer: Arc<dyn DocumentAnalyzer>,
    pub adapter: Option<AdapterRef>,
}

impl ServiceBinding {
    pub fn new(analyzer: Arc<dyn DocumentAnalyzer>) -> Self {
        Self {
            analyzer,
            adapter: None,
        }
    }

    pub fn with_adapter(mut self, adapter: Option<AdapterRef>) -> Self {
        self.adapter = adapter;
        self
    }
}

impl fmt::Debug for ServiceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBinding")
            .field("analyzer", &self.analyzer.name())
            .field("adapter", &self.adapter)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Identifies this run in logs.
    pub run_id: Uuid,
    pub document_type: DocumentType,
    pub fields: ExtractedFields,
    pub confidence: ConfidenceSummary,
    pub extraction_method: ExtractionMethod,
    pub block_count: usize,
    pub adapter_id: Option<String>,
    pub document_sha256: String,
    pub processed_at: DateTime<Utc>,
    pub states: Vec<PipelineState>,
    /// The primary request's error when the fallback path was taken.
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessingPipeline {
    policy: FeaturePolicy,
}

impl ProcessingPipeline {
    pub fn new(policy: FeaturePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &FeaturePolicy {
        &self.policy
    }

    /// Analyze a document and extract the fields for `document_type`.
    pub async fn process(
        &self,
        document: &[u8],
        document_type: DocumentType,
        binding: &ServiceBinding,
    ) -> Result<PipelineResult, PipelineFailure> {
        let run_id = Uuid::new_v4();
        let mut machine = StateMachine::new();
        advance(&mut machine, PipelineState::Invoking)?;

        let primary = self
            .policy
            .primary_request(document_type, binding.adapter.clone());
        let primary_method = if primary.adapter.is_some() {
            ExtractionMethod::Adapter
        } else {
            ExtractionMethod::Standard
        };

        info!(
            "Run {}: processing {} document ({} bytes) via {} [{}]",
            run_id,
            document_type,
            document.len(),
            binding.analyzer.name(),
            primary.feature_list()
        );

        let (payload, method, fallback_reason) =
            match binding.analyzer.analyze(document, &primary).await {
                Ok(payload) => (payload, primary_method, None),
                Err(err) if err.kind.allows_fallback() => {
                    let reduced = self.policy.reduced_request();
                    if reduced == primary {
                        debug!("No reduced request to fall back to");
                        return Err(analyzer_failure(machine, err));
                    }

                    warn!(
                        "Primary analysis rejected ({}), falling back to {}",
                        err,
                        reduced.feature_list()
                    );
                    advance(&mut machine, PipelineState::FallbackInvoking)?;

                    match binding.analyzer.analyze(document, &reduced).await {
                        Ok(payload) => (payload, ExtractionMethod::Fallback, Some(err.to_string())),
                        Err(fallback_err) => return Err(analyzer_failure(machine, fallback_err)),
                    }
                }
                Err(err) => return Err(analyzer_failure(machine, err)),
            };

        advance(&mut machine, PipelineState::Extracting)?;

        let graph = match BlockGraph::from_response(&payload) {
            Ok(graph) => graph,
            Err(err) => {
                return Err(failure(machine, FailureKind::MalformedResponse, err.to_string()));
            }
        };

        let fields = extractor_for(document_type).extract(&graph);
        let confidence = summarize(&graph);

        advance(&mut machine, PipelineState::Succeeded)?;
        debug!(
            "Run {}: extracted {} fields from {} blocks ({})",
            run_id,
            document_type,
            graph.len(),
            method
        );

        Ok(PipelineResult {
            run_id,
            document_type,
            fields,
            confidence,
            extraction_method: method,
            block_count: graph.len(),
            adapter_id: match method {
                ExtractionMethod::Adapter => binding.adapter.as_ref().map(|a| a.adapter_id.clone()),
                _ => None,
            },
            document_sha256: content_hash(document),
            processed_at: Utc::now(),
            states: machine.into_trace(),
            fallback_reason,
        })
    }
}

fn advance(machine: &mut StateMachine, next: PipelineState) -> Result<(), PipelineFailure> {
    machine.advance(next).map_err(|err| {
        let message = err.to_string();
        failure(machine.clone(), FailureKind::Fatal, message)
    })
}

fn analyzer_failure(machine: StateMachine, err: AnalyzerError) -> PipelineFailure {
    failure(machine, err.kind.into(), err.message)
}

fn failure(mut machine: StateMachine, kind: FailureKind, message: String) -> PipelineFailure {
    machine.fail();
    warn!("Pipeline failed ({}): {}", kind, message);
    PipelineFailure {
        kind,
        message,
        states: machine.into_trace(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Answers with the next scripted outcome and records each request.
    struct Scripted {
        outcomes: Mutex<Vec<Result<serde_json::Value, AnalyzerError>>>,
        requests: Mutex<Vec<AnalysisRequest>>,
    }

    impl Scripted {
        fn new(mut outcomes: Vec<Result<serde_json::Value, AnalyzerError>>) -> Arc<Self> {
            outcomes.reverse();
            Arc::new(Self {
                outcomes: Mutex::new(outcomes),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<AnalysisRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DocumentAnalyzer for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn analyze(
            &self,
            _document: &[u8],
            request: &AnalysisRequest,
        ) -> Result<serde_json::Value, AnalyzerError> {
            self.requests.lock().unwrap().push(request.clone());
            self.outcomes
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(AnalyzerError::fatal("script exhausted")))
        }
    }

    fn ssn_response() -> serde_json::Value {
        json!({
            "Blocks": [
                {"Id": "k", "BlockType": "KEY_VALUE_SET", "EntityTypes": ["KEY"], "Confidence": 90.0,
                 "Text": "Employee's social security number",
                 "Relationships": [{"Type": "VALUE", "Ids": ["v"]}]},
                {"Id": "v", "BlockType": "KEY_VALUE_SET", "EntityTypes": ["VALUE"], "Confidence": 100.0,
                 "Text": "123-45-6789"}
            ]
        })
    }

    #[tokio::test]
    async fn test_standard_run() {
        let analyzer = Scripted::new(vec![Ok(ssn_response())]);
        let binding = ServiceBinding::new(analyzer.clone());

        let result = ProcessingPipeline::default()
            .process(b"doc", DocumentType::W2, &binding)
            .await
            .unwrap();

        assert_eq!(result.extraction_method, ExtractionMethod::Standard);
        assert_eq!(result.block_count, 2);
        assert_eq!(result.fields.get("employee_ssn").map(|v| v.to_string()).as_deref(), Some("123-45-6789"));
        assert_eq!(
            result.states,
            vec![PipelineState::Idle, PipelineState::Invoking, PipelineState::Extracting, PipelineState::Succeeded]
        );
        assert_eq!(result.confidence.overall.mean, 95.0);
        assert_eq!(result.adapter_id, None);
        assert_eq!(result.document_sha256, content_hash(b"doc"));

        let requests = analyzer.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].features.contains(&FeatureType::Layout));
    }

    #[tokio::test]
    async fn test_adapter_run_records_adapter() {
        let analyzer = Scripted::new(vec![Ok(ssn_response())]);
        let binding = ServiceBinding::new(analyzer.clone())
            .with_adapter(Some(AdapterRef::new("w2-adapter", "1")));

        let result = ProcessingPipeline::default()
            .process(b"doc", DocumentType::W2, &binding)
            .await
            .unwrap();

        assert_eq!(result.extraction_method, ExtractionMethod::Adapter);
        assert_eq!(result.adapter_id.as_deref(), Some("w2-adapter"));
    }

    #[tokio::test]
    async fn test_feature_unavailable_falls_back_once() {
        let analyzer = Scripted::new(vec![
            Err(AnalyzerError::feature_unavailable("LAYOUT not supported")),
            Ok(ssn_response()),
        ]);
        let binding = ServiceBinding::new(analyzer.clone());

        let result = ProcessingPipeline::default()
            .process(b"doc", DocumentType::W2, &binding)
            .await
            .unwrap();

        assert_eq!(result.extraction_method, ExtractionMethod::Fallback);
        assert!(result.fallback_reason.unwrap().contains("LAYOUT not supported"));
        let requests = analyzer.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1], FeaturePolicy::default().reduced_request());
    }

    #[tokio::test]
    async fn test_nothing_to_fall_back_to() {
        // Bank statements without an adapter already use the reduced request.
        let analyzer = Scripted::new(vec![Err(AnalyzerError::feature_unavailable("no TABLES"))]);
        let binding = ServiceBinding::new(analyzer.clone());

        let failure = ProcessingPipeline::default()
            .process(b"doc", DocumentType::BankStatement, &binding)
            .await
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::FeatureUnavailable);
        assert_eq!(analyzer.requests().len(), 1);
        assert_eq!(
            failure.states,
            vec![PipelineState::Idle, PipelineState::Invoking, PipelineState::Failed]
        );
    }

    #[tokio::test]
    async fn test_transient_is_not_retried() {
        let analyzer = Scripted::new(vec![Err(AnalyzerError::transient("throttled")), Ok(ssn_response())]);
        let binding = ServiceBinding::new(analyzer.clone());

        let failure = ProcessingPipeline::default()
            .process(b"doc", DocumentType::W2, &binding)
            .await
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::Transient);
        assert_eq!(failure.message, "throttled");
        assert_eq!(analyzer.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let analyzer = Scripted::new(vec![Ok(json!({"NotBlocks": true}))]);
        let binding = ServiceBinding::new(analyzer);

        let failure = ProcessingPipeline::default()
            .process(b"doc", DocumentType::Generic, &binding)
            .await
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::MalformedResponse);
        assert_eq!(failure.states.last(), Some(&PipelineState::Failed));
        assert!(failure.states.contains(&PipelineState::Extracting));
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_malformed() {
        let analyzer = Scripted::new(vec![Err(AnalyzerError::malformed("Response body is not JSON"))]);
        let binding = ServiceBinding::new(analyzer.clone());

        let failure = ProcessingPipeline::default()
            .process(b"doc", DocumentType::W2, &binding)
            .await
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::MalformedResponse);
        assert_eq!(analyzer.requests().len(), 1);
        assert_eq!(
            failure.states,
            vec![PipelineState::Idle, PipelineState::Invoking, PipelineState::Failed]
        );
    }

    #[test]
    fn test_policy_requests() {
        let policy = FeaturePolicy::new(false);
        let request = policy.primary_request(DocumentType::W2, None);
        assert_eq!(request, policy.reduced_request());
        assert_eq!(request.feature_list(), "FORMS+TABLES");
    }
}
