/*!
 * JSON-over-HTTP translation backend client.
 *
 * Endpoints, relative to the configured base address:
 * - `POST /translate` with `{from, to, text}` returning `{result}`
 * - `POST /translate/batch` with `{from, to, texts}` returning `{results}`
 *   (or `{data: {results}}`)
 * - `GET /health` and `GET /models` for connectivity and credential probes
 */

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::app_config::BackendConfig;
use crate::errors::ProviderError;
use crate::providers::TranslationProvider;

const TRANSLATE_SUFFIX: &str = "/translate";

/// Request body for a single translation
#[derive(Debug, Serialize)]
pub struct TranslateRequest<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub text: &'a str,
}

/// Request body for a batch translation
#[derive(Debug, Serialize)]
pub struct BatchTranslateRequest<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub texts: &'a [String],
}

/// Response body of a single translation
#[derive(Debug, Deserialize)]
pub struct TranslateResponse {
    pub result: String,
}

/// Response body of a batch translation, in either of the shapes backends use
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum BatchTranslateResponse {
    /// `{"results": [...]}`
    Flat { results: Vec<Option<String>> },
    /// `{"data": {"results": [...]}}`
    Nested { data: BatchResults },
}

/// Inner object of the nested batch response
#[derive(Debug, Deserialize)]
pub struct BatchResults {
    pub results: Vec<Option<String>>,
}

impl BatchTranslateResponse {
    fn into_results(self) -> Vec<Option<String>> {
        match self {
            Self::Flat { results } => results,
            Self::Nested { data } => data.results,
        }
    }
}

/// Decode a batch response body and check it lines up with the request
///
/// Empty strings are reported as `None` so they are never merged.
pub fn decode_batch_response(body: &str, expected_len: usize) -> Result<Vec<Option<String>>, ProviderError> {
    let response: BatchTranslateResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::ResponseShape(format!("{}: {}", e, truncate_for_log(body, 200))))?;

    let results = response.into_results();
    if results.len() != expected_len {
        return Err(ProviderError::ResponseShape(format!(
            "expected {} results, got {}",
            expected_len,
            results.len()
        )));
    }

    Ok(results
        .into_iter()
        .map(|slot| slot.filter(|text| !text.trim().is_empty()))
        .collect())
}

fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

/// HTTP client for the translation backend
pub struct HttpBackend {
    /// Base address with any trailing `/translate` and `/` removed
    root_url: String,
    /// Base address exactly as configured, without trailing `/`
    base_url: String,
    /// Raw `Authorization` header value
    token: Option<String>,
    /// HTTP client for making requests
    client: Client,
    /// Time budget for translate calls
    timeout: Duration,
    /// Time budget for health and credential probes
    probe_timeout: Duration,
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
}

impl fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl HttpBackend {
    /// Create a client with default timeouts (30s calls, 5s probes) and 2 retries
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Self {
        let base_url = endpoint.into().trim().trim_end_matches('/').to_string();
        let root_url = base_url
            .strip_suffix(TRANSLATE_SUFFIX)
            .unwrap_or(&base_url)
            .to_string();

        Self {
            root_url,
            base_url,
            token: token.filter(|t| !t.trim().is_empty()),
            client: Client::builder()
                .pool_idle_timeout(Duration::from_secs(90))
                .tcp_keepalive(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            max_retries: 2,
            backoff_base_ms: 1000,
        }
    }

    /// Create a client from the backend section of the configuration
    pub fn from_config(config: &BackendConfig) -> Self {
        let token = if config.token.is_empty() { None } else { Some(config.token.clone()) };
        Self::new(config.endpoint.clone(), token)
            .with_timeouts(
                Duration::from_secs(config.timeout_secs),
                Duration::from_secs(config.probe_timeout_secs),
            )
            .with_retry(config.max_retries, config.retry_backoff_ms)
    }

    pub fn with_timeouts(mut self, timeout: Duration, probe_timeout: Duration) -> Self {
        self.timeout = timeout;
        self.probe_timeout = probe_timeout;
        self
    }

    pub fn with_retry(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Address with any `/translate` suffix removed
    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    /// URL of the single-text endpoint
    pub fn translate_url(&self) -> String {
        format!("{}{}", self.root_url, TRANSLATE_SUFFIX)
    }

    /// URL of the batch endpoint
    pub fn batch_url(&self) -> String {
        format!("{}{}/batch", self.root_url, TRANSLATE_SUFFIX)
    }

    /// Health URLs to probe, most likely first
    pub fn health_candidates(&self) -> Vec<String> {
        if self.base_url.ends_with(TRANSLATE_SUFFIX) {
            vec![
                format!("{}/health", self.root_url),
                format!("{}/health", self.base_url),
            ]
        } else {
            vec![
                format!("{}/health", self.base_url),
                format!("{}{}/health", self.base_url, TRANSLATE_SUFFIX),
            ]
        }
    }

    /// POST a JSON body, retrying transient failures with exponential backoff
    async fn post_json<T: Serialize + ?Sized + Sync>(&self, url: &str, body: &T) -> Result<String, ProviderError> {
        let mut attempt: u32 = 0;
        loop {
            match self.post_once(url, body).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff_ms = self.backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(16));
                    warn!(
                        "Backend request failed: {} - attempt {}/{}, retrying in {}ms",
                        e,
                        attempt,
                        self.max_retries + 1,
                        backoff_ms
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_once<T: Serialize + ?Sized + Sync>(&self, url: &str, body: &T) -> Result<String, ProviderError> {
        let mut request = self
            .client
            .post(url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .json(body);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, token.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport_error(url, &e, self.timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| classify_transport_error(url, &e, self.timeout))?;

        if !status.is_success() {
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }

    /// GET with the probe timeout, returning the status code
    async fn probe(&self, url: &str, with_token: bool) -> Result<(u16, String), ProviderError> {
        let mut request = self.client.get(url).timeout(self.probe_timeout);
        if with_token {
            if let Some(token) = &self.token {
                request = request.header(AUTHORIZATION, token.as_str());
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport_error(url, &e, self.probe_timeout))?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok((status, body))
    }
}

/// Map a transport-level reqwest error onto the backend error taxonomy
fn classify_transport_error(url: &str, error: &reqwest::Error, timeout: Duration) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout {
            url: url.to_string(),
            timeout_secs: timeout.as_secs(),
        }
    } else {
        ProviderError::Unavailable(format!("{}: {}", url, error))
    }
}

#[async_trait]
impl TranslationProvider for HttpBackend {
    async fn translate_one(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, ProviderError> {
        let request = TranslateRequest {
            from: source_language,
            to: target_language,
            text,
        };
        let url = self.translate_url();
        let body = self.post_json(&url, &request).await?;

        let response: TranslateResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::ResponseShape(format!("{}: {}", e, truncate_for_log(&body, 200))))?;
        Ok(response.result)
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<Option<String>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = BatchTranslateRequest {
            from: source_language,
            to: target_language,
            texts,
        };
        let url = self.batch_url();
        debug!("Sending {} texts to {}", texts.len(), url);
        let body = self.post_json(&url, &request).await?;
        debug!("Batch response: {}", truncate_for_log(&body, 500));

        decode_batch_response(&body, texts.len())
    }

    async fn check_health(&self) -> Result<(), ProviderError> {
        let mut last_error = None;

        for url in self.health_candidates() {
            match self.probe(&url, false).await {
                Ok((status, _)) if (200..300).contains(&status) => {
                    debug!("Health check succeeded at {}", url);
                    return Ok(());
                }
                Ok((status, body)) => {
                    debug!("Health check at {} returned {}", url, status);
                    last_error = Some(ProviderError::ApiError { status_code: status, body });
                }
                Err(e) => {
                    debug!("Health check at {} failed: {}", url, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::Unavailable(self.base_url.clone())))
    }

    async fn verify_credentials(&self) -> Result<(), ProviderError> {
        if self.token.is_none() {
            return Ok(());
        }

        let url = format!("{}/models", self.root_url);
        let (status, body) = self.probe(&url, true).await?;
        if status == 200 {
            Ok(())
        } else {
            Err(ProviderError::AuthenticationError(format!(
                "API key verification failed ({}): {}",
                status,
                truncate_for_log(&body, 200)
            )))
        }
    }
}
