/*!
 * Error types for the dualsub application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur when talking to the translation backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The backend could not be reached at all
    #[error("Translation backend unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete within its time budget
    #[error("Translation backend timed out after {timeout_secs}s: {url}")]
    Timeout {
        /// URL that was being called
        url: String,
        /// Time budget that was exhausted
        timeout_secs: u64,
    },

    /// Non-success response from the backend
    #[error("Backend responded with error: {status_code} - {body}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Raw response body, kept for diagnostics
        body: String,
    },

    /// The response could not be aligned with the request
    #[error("Unexpected response shape: {0}")]
    ResponseShape(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl ProviderError {
    /// Whether a retry of the same request could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::Timeout { .. } => true,
            Self::ApiError { status_code, .. } => *status_code == 429 || *status_code >= 500,
            Self::ResponseShape(_) | Self::AuthenticationError(_) => false,
        }
    }
}

/// Errors that can occur while parsing subtitle text
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubtitleError {
    /// A dialogue or cue line does not have the structure its dialect requires
    #[error("Malformed subtitle at line {line}: {message}")]
    Format {
        /// 1-based line number in the source text
        line: usize,
        /// What was wrong with it
        message: String,
    },
}

/// Errors in the run configuration, raised before any network call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Batch size must be between 1 and {max}, got {value}")]
    InvalidBatchSize { value: usize, max: usize },

    #[error("Missing required configuration value: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Errors from the subtitle-stream extraction collaborator
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Failed to run {tool}: {message}")]
    Spawn { tool: String, message: String },

    #[error("{tool} timed out after {timeout_secs}s")]
    Timeout { tool: String, timeout_secs: u64 },

    #[error("{tool} exited with status {status:?}: {stderr}")]
    ToolFailed { tool: String, status: Option<i32>, stderr: String },

    #[error("Failed to parse ffprobe output: {0}")]
    InvalidProbeOutput(String),

    #[error("No text subtitle streams (ass/ssa/subrip) found in {0}")]
    NoTextStreams(String),

    #[error("Subtitle stream not found: {0}")]
    StreamNotFound(String),

    #[error("Subtitle codec '{0}' is not a text format")]
    UnsupportedCodec(String),

    #[error("Extracted subtitle stream {0} is empty")]
    EmptyOutput(usize),

    #[error("I/O error during extraction: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that abort a translation run
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Invalid run configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error with subtitle processing
    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),

    /// A batch failed while the run was configured to stop on the first failure
    #[error("Batch {} failed ({} entries): {source}", .batch_index + 1, .entry_indices.len())]
    BatchFailed {
        batch_index: usize,
        entry_indices: Vec<usize>,
        #[source]
        source: ProviderError,
    },
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from the backend
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from subtitle processing
    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Error from subtitle extraction
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Error in the configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
