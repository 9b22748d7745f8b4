//! AnalyzeDocument-compatible HTTP collaborator.
//!
//! Posts the AWS JSON 1.1 request shape to a configured endpoint, typically a
//! signing gateway in front of the real service. Transient failures are
//! retried here with exponential backoff; callers see one result.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{AnalysisRequest, AnalyzerError, AnalyzerErrorKind, DocumentAnalyzer};

const TARGET_HEADER: &str = "X-Amz-Target";
const TARGET: &str = "Textract.AnalyzeDocument";
const AMZ_JSON: &str = "application/x-amz-json-1.1";

/// Connection settings for `HttpAnalyzer`.
#[derive(Debug, Clone)]
pub struct HttpAnalyzerConfig {
    pub endpoint: String,
    pub api_token: Option<String>,
    pub timeout: Duration,
    /// Retries after the first attempt, transient failures only.
    pub max_retries: u32,
    pub retry_base_ms: u64,
}

impl HttpAnalyzerConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_token: None,
            timeout: Duration::from_secs(60),
            max_retries: 3,
            retry_base_ms: 500,
        }
    }
}

pub struct HttpAnalyzer {
    client: Client,
    config: HttpAnalyzerConfig,
}

impl HttpAnalyzer {
    pub fn new(config: HttpAnalyzerConfig) -> Result<Self, AnalyzerError> {
        let client = Client::builder()
            .user_agent(concat!("docfields/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| AnalyzerError::fatal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, config))
    }

    /// Use a preconfigured client. `config.timeout` is not applied.
    pub fn with_client(client: Client, config: HttpAnalyzerConfig) -> Self {
        Self { client, config }
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    async fn send_once(&self, body: &serde_json::Value) -> Result<serde_json::Value, AnalyzerError> {
        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header(CONTENT_TYPE, AMZ_JSON)
            .header(TARGET_HEADER, TARGET)
            .json(body);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if status.is_success() {
            return serde_json::from_str(&text).map_err(|e| {
                AnalyzerError::malformed(format!("Response body is not JSON: {}", e))
            });
        }

        let parsed: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
        let error_type = parsed.error_type.unwrap_or_default();
        let message = parsed
            .message
            .unwrap_or_else(|| text.chars().take(200).collect());
        let kind = classify_error(Some(status), &error_type, &message);

        Err(AnalyzerError::new(
            kind,
            format!("HTTP {} {}: {}", status.as_u16(), short_type(&error_type), message),
        ))
    }
}

#[async_trait]
impl DocumentAnalyzer for HttpAnalyzer {
    fn name(&self) -> &str {
        "http"
    }

    async fn analyze(
        &self,
        document: &[u8],
        request: &AnalysisRequest,
    ) -> Result<serde_json::Value, AnalyzerError> {
        let body = request_body(document, request);

        let mut attempt = 0;
        loop {
            match self.send_once(&body).await {
                Ok(payload) => return Ok(payload),
                Err(err) if err.kind == AnalyzerErrorKind::Transient && attempt < self.config.max_retries => {
                    let wait = backoff_delay(attempt, self.config.retry_base_ms);
                    warn!(
                        "Analyze request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        wait,
                        err.message
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => {
                    debug!("Analyze request failed after {} attempt(s): {}", attempt + 1, err);
                    return Err(err);
                }
            }
        }
    }
}

/// Exponential backoff, capped at one minute.
pub(crate) fn backoff_delay(attempt: u32, base_ms: u64) -> Duration {
    let delay_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay_ms.min(60_000))
}

/// AnalyzeDocument request body.
pub(crate) fn request_body(document: &[u8], request: &AnalysisRequest) -> serde_json::Value {
    let features: Vec<&str> = request.features.iter().map(|f| f.as_str()).collect();
    let mut body = json!({
        "Document": {
            "Bytes": base64::engine::general_purpose::STANDARD.encode(document),
        },
        "FeatureTypes": features,
    });

    if let Some(adapter) = &request.adapter {
        body["AdaptersConfig"] = json!({
            "Adapters": [{
                "AdapterId": adapter.adapter_id,
                "Version": adapter.version,
            }]
        });
    }

    body
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// `com.amazonaws.textract#ThrottlingException` -> `ThrottlingException`.
fn short_type(error_type: &str) -> &str {
    error_type.rsplit('#').next().unwrap_or(error_type)
}

/// Map a service error to a failure kind.
pub fn classify_error(status: Option<StatusCode>, error_type: &str, message: &str) -> AnalyzerErrorKind {
    let error_type = short_type(error_type);
    let message = message.to_lowercase();

    match error_type {
        "ResourceNotFoundException" => return AnalyzerErrorKind::AdapterNotFound,
        "InvalidParameterException" | "ValidationException" if message.contains("adapter") => {
            return AnalyzerErrorKind::AdapterNotFound
        }
        "InvalidParameterException" | "ValidationException"
            if message.contains("feature") || message.contains("featuretypes") =>
        {
            return AnalyzerErrorKind::FeatureUnavailable
        }
        t if t.starts_with("UnsupportedFeature") => return AnalyzerErrorKind::FeatureUnavailable,
        "ThrottlingException"
        | "ProvisionedThroughputExceededException"
        | "LimitExceededException"
        | "InternalServerError"
        | "InternalServerException"
        | "ServiceUnavailableException" => return AnalyzerErrorKind::Transient,
        _ => {}
    }

    match status {
        Some(s) if s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error() => {
            AnalyzerErrorKind::Transient
        }
        _ => AnalyzerErrorKind::Fatal,
    }
}

fn transport_error(err: reqwest::Error) -> AnalyzerError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        AnalyzerError::transient(format!("Request failed: {}", err))
    } else {
        AnalyzerError::fatal(format!("Request failed: {}", err))
    }
}
