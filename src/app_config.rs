use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::errors::ConfigError;
use crate::translation::merge::BilingualStyle;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.

/// Largest accepted batch size
pub const MAX_BATCH_SIZE: usize = 50;

/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Source language code (ISO)
    pub source_language: String,

    /// Target language code (ISO)
    pub target_language: String,

    /// Translation backend connection
    #[serde(default)]
    pub backend: BackendConfig,

    /// Batching and concurrency
    #[serde(default)]
    pub batch: BatchConfig,

    /// Look of the appended translation line
    #[serde(default)]
    pub bilingual: BilingualStyle,

    /// Video subtitle extraction tools
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation backend configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BackendConfig {
    /// Base address; a trailing `/translate` is accepted
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Raw `Authorization` header value, empty for none
    #[serde(default = "String::new")]
    pub token: String,

    /// Timeout for translate calls in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Timeout for health and credential probes in seconds
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Retry count for transient failures
    #[serde(default = "default_retry_count")]
    pub max_retries: u32,

    /// Backoff base for retries (in milliseconds), doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            token: String::new(),
            timeout_secs: default_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            max_retries: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Batching configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BatchConfig {
    /// Entries per backend call (1 to 50)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum number of batches in flight
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    /// Abort the run on the first failed batch instead of passing its entries through
    #[serde(default)]
    pub fail_fast: bool,

    /// Retry the entries of a failed batch one by one
    #[serde(default)]
    pub retry_individual_entries: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrent_requests: default_concurrent_requests(),
            fail_fast: false,
            retry_individual_entries: false,
        }
    }
}

/// Configuration for subtitle extraction from video files
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ExtractionConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,

    /// Timeout for each tool invocation in seconds
    #[serde(default = "default_extraction_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            timeout_secs: default_extraction_timeout_secs(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:8989".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_retry_count() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    1000 // 1 second base backoff time, doubled on each retry
}

fn default_batch_size() -> usize {
    10
}

fn default_concurrent_requests() -> usize {
    2
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

fn default_extraction_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load the configuration file, writing a default one first if it does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {:?}", path))?;
            let reader = BufReader::new(file);
            let config: Config = serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            return Ok(config);
        }

        warn!("Config file not found at {:?}, creating default config.", path);
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {:?}", path))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate languages
        if self.source_language.trim().is_empty() {
            return Err(ConfigError::Missing("source_language"));
        }
        if self.target_language.trim().is_empty() {
            return Err(ConfigError::Missing("target_language"));
        }
        crate::language_utils::validate_language_code(&self.source_language)
            .map_err(|e| ConfigError::Invalid { field: "source_language", message: e.to_string() })?;
        crate::language_utils::validate_language_code(&self.target_language)
            .map_err(|e| ConfigError::Invalid { field: "target_language", message: e.to_string() })?;

        // Validate backend
        if self.backend.endpoint.trim().is_empty() {
            return Err(ConfigError::Missing("backend.endpoint"));
        }
        url::Url::parse(self.backend.endpoint.trim())
            .map_err(|e| ConfigError::Invalid { field: "backend.endpoint", message: e.to_string() })?;
        if self.backend.token.chars().any(|c| c.is_control()) {
            return Err(ConfigError::Invalid {
                field: "backend.token",
                message: "token must not contain control characters".to_string(),
            });
        }
        if self.backend.timeout_secs == 0 || self.backend.probe_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "backend.timeout_secs",
                message: "timeouts must be at least one second".to_string(),
            });
        }

        // Validate batching
        validate_batch_size(self.batch.batch_size)?;
        if self.batch.concurrent_requests == 0 {
            return Err(ConfigError::Invalid {
                field: "batch.concurrent_requests",
                message: "at least one request must be allowed".to_string(),
            });
        }

        // Validate the inserted style span
        let style = &self.bilingual.ass_override;
        if !(style.starts_with('{') && style.ends_with('}') && style[1..style.len() - 1].find(['{', '}']).is_none()) {
            return Err(ConfigError::Invalid {
                field: "bilingual.ass_override",
                message: "must be a single {...} override block".to_string(),
            });
        }

        Ok(())
    }
}

/// Check a batch size against the accepted range
pub fn validate_batch_size(batch_size: usize) -> Result<(), ConfigError> {
    if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
        return Err(ConfigError::InvalidBatchSize {
            value: batch_size,
            max: MAX_BATCH_SIZE,
        });
    }
    Ok(())
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: "en".to_string(),
            target_language: "zh".to_string(),
            backend: BackendConfig::default(),
            batch: BatchConfig::default(),
            bilingual: BilingualStyle::default(),
            extraction: ExtractionConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
