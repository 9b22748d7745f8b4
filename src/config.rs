//! Configuration management for docfields using the prefer crate.
//!
//! ```toml
//! [analyzer]
//! kind = "http"
//! endpoint = "https://textract-gateway.internal/analyze"
//! timeout_secs = 60
//!
//! [pipeline]
//! w2_layout = true
//!
//! [profiles.w2]
//! adapter_id = "2e9bf1ddec2d"
//! version = "1"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::analyzer::{AdapterRef, DocumentAnalyzer, HttpAnalyzer, HttpAnalyzerConfig, ReplayAnalyzer};
use crate::document::{DocumentType, DEFAULT_MAX_DOCUMENT_BYTES};
use crate::pipeline::{FeaturePolicy, ServiceBinding};

pub const ENDPOINT_ENV: &str = "DOCFIELDS_ENDPOINT";
pub const API_TOKEN_ENV: &str = "DOCFIELDS_API_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Unknown document type in [profiles]: {0}")]
    UnknownProfile(String),

    #[error("Failed to set up analyzer: {0}")]
    Analyzer(String),
}

/// Which collaborator to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
    #[default]
    Http,
    Replay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerSection {
    #[serde(default)]
    pub kind: AnalyzerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Bearer token. Never written back out.
    #[serde(default, skip_serializing)]
    pub api_token: Option<String>,
    /// Saved response for `kind = "replay"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replay_path: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    500
}

impl Default for AnalyzerSection {
    fn default() -> Self {
        Self {
            kind: AnalyzerKind::default(),
            endpoint: None,
            api_token: None,
            replay_path: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

impl AnalyzerSection {
    /// Apply `DOCFIELDS_ENDPOINT` / `DOCFIELDS_API_TOKEN` when set.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(env_value(ENDPOINT_ENV), env_value(API_TOKEN_ENV))
    }

    fn with_overrides(mut self, endpoint: Option<String>, api_token: Option<String>) -> Self {
        if endpoint.is_some() {
            self.endpoint = endpoint;
        }
        if api_token.is_some() {
            self.api_token = api_token;
        }
        self
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    #[serde(default = "default_true")]
    pub w2_layout: bool,
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_document_bytes() -> u64 {
    DEFAULT_MAX_DOCUMENT_BYTES
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            w2_layout: true,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }
}

/// Adapter bound to one document type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub adapter_id: String,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "1".to_string()
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analyzer: AnalyzerSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
    /// Keyed by document type tag (`w2`, `bank_statement`, `generic`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profiles: BTreeMap<String, ProfileConfig>,
    /// Path the config was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers docfields config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("docfields").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            warn!("Ignoring config file: {}", e);
                            Self::default_with_env()
                        }
                    }
                } else {
                    Self::default_with_env()
                }
            }
            Err(_) => {
                debug!("No config file found, using defaults");
                Self::default_with_env()
            }
        }
    }

    /// Load from an explicit path when given, otherwise discover.
    pub async fn load_with(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from_path(path).await,
            None => Ok(Self::load().await),
        }
    }

    pub fn default_with_env() -> Self {
        Self {
            analyzer: AnalyzerSection::default().with_env_overrides(),
            ..Self::default()
        }
    }

    /// Load configuration from a specific file path.
    /// Supports TOML, YAML, and JSON based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let mut config = Self::parse(&contents, ext)?;

        config.source_path = Some(path.to_path_buf());
        config.analyzer = config.analyzer.with_env_overrides();
        Ok(config)
    }

    fn parse(contents: &str, ext: &str) -> Result<Self, ConfigError> {
        let config: Config = match ext {
            "toml" => toml::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "TOML",
                message: e.to_string(),
            })?,
            "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "YAML",
                message: e.to_string(),
            })?,
            _ => serde_json::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "JSON",
                message: e.to_string(),
            })?,
        };

        if let Some(unknown) = config
            .profiles
            .keys()
            .find(|k| k.parse::<DocumentType>().is_err())
        {
            return Err(ConfigError::UnknownProfile(unknown.clone()));
        }
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved against the config file's directory
    pub fn resolve_path(&self, path_str: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        match self.base_dir() {
            Some(base) if !path.is_absolute() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn feature_policy(&self) -> FeaturePolicy {
        FeaturePolicy::new(self.pipeline.w2_layout)
    }

    /// Adapter configured for a document type, if any.
    pub fn adapter_for(&self, document_type: DocumentType) -> Option<AdapterRef> {
        self.profiles
            .iter()
            .find(|(key, _)| key.parse::<DocumentType>().ok() == Some(document_type))
            .map(|(_, profile)| AdapterRef::new(&profile.adapter_id, &profile.version))
    }

    pub fn http_config(&self) -> Result<HttpAnalyzerConfig, ConfigError> {
        let endpoint = self
            .analyzer
            .endpoint
            .clone()
            .ok_or(ConfigError::Missing("analyzer.endpoint (or DOCFIELDS_ENDPOINT)"))?;

        Ok(HttpAnalyzerConfig {
            endpoint,
            api_token: self.analyzer.api_token.clone(),
            timeout: Duration::from_secs(self.analyzer.timeout_secs),
            max_retries: self.analyzer.max_retries,
            retry_base_ms: self.analyzer.retry_base_ms,
        })
    }

    /// Build the configured analyzer. A replay path overrides `kind`.
    pub fn build_analyzer(&self, replay: Option<&Path>) -> Result<Arc<dyn DocumentAnalyzer>, ConfigError> {
        if let Some(path) = replay {
            return Ok(Arc::new(ReplayAnalyzer::new(path)));
        }

        match self.analyzer.kind {
            AnalyzerKind::Replay => {
                let path = self
                    .analyzer
                    .replay_path
                    .as_deref()
                    .ok_or(ConfigError::Missing("analyzer.replay_path"))?;
                Ok(Arc::new(ReplayAnalyzer::new(self.resolve_path(path))))
            }
            AnalyzerKind::Http => {
                let analyzer = HttpAnalyzer::new(self.http_config()?)
                    .map_err(|e| ConfigError::Analyzer(e.message))?;
                Ok(Arc::new(analyzer))
            }
        }
    }

    /// Bind an analyzer to the adapter configured for `document_type`.
    pub fn binding_for(&self, document_type: DocumentType, analyzer: Arc<dyn DocumentAnalyzer>) -> ServiceBinding {
        ServiceBinding::new(analyzer).with_adapter(self.adapter_for(document_type))
    }
}
