/*!
 * Mock backend implementations for testing.
 *
 * This module provides a mock backend that simulates different behaviors:
 * - `MockProvider::working()` - Always succeeds with translated text
 * - `MockProvider::intermittent(n)` - Fails every nth batch request
 * - `MockProvider::failing()` - Always fails with an error
 * - `MockProvider::shape_mismatch()` - Returns one result too few
 */

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::TranslationProvider;

/// Behavior mode for the mock provider
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a proper translation
    Working,
    /// Fails intermittently (every Nth batch request)
    Intermittent { fail_every: usize },
    /// Always fails with a server error
    Failing,
    /// Always fails as if the backend were down
    Unavailable,
    /// Batch calls return one result fewer than requested
    ShapeMismatch,
    /// Batch calls fail when any text contains the marker; single calls still work
    FailBatchesContaining(String),
    /// Simulates slow responses (for concurrency and timeout testing)
    Slow { delay_ms: u64 },
}

/// Mock provider for testing translation behavior
#[derive(Debug, Clone)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Batch request counter, shared between clones
    batch_calls: Arc<AtomicUsize>,
    /// Single request counter, shared between clones
    single_calls: Arc<AtomicUsize>,
    /// Requests currently being served
    in_flight: Arc<AtomicUsize>,
    /// Highest number of requests served at once
    peak_in_flight: Arc<AtomicUsize>,
    /// Custom translation function (optional)
    custom_translation: Option<fn(&str, &str) -> String>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            batch_calls: Arc::new(AtomicUsize::new(0)),
            single_calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
            custom_translation: None,
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every: fail_every.max(1) })
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock whose batch results never line up with the request
    pub fn shape_mismatch() -> Self {
        Self::new(MockBehavior::ShapeMismatch)
    }

    /// Create a mock that answers slowly
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Set a custom translation function, called with `(text, target_language)`
    pub fn with_custom_translation(mut self, translate: fn(&str, &str) -> String) -> Self {
        self.custom_translation = Some(translate);
        self
    }

    /// Number of batch requests served so far
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// Number of single-text requests served so far
    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent requests observed
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn translate(&self, text: &str, target_language: &str) -> String {
        match self.custom_translation {
            Some(translate) => translate(text, target_language),
            None => format!("[{}] {}", target_language, text),
        }
    }

    async fn enter(&self) -> InFlightGuard {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        if let MockBehavior::Slow { delay_ms } = self.behavior {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        InFlightGuard(Arc::clone(&self.in_flight))
    }
}

struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TranslationProvider for MockProvider {
    async fn translate_one(
        &self,
        text: &str,
        _source_language: &str,
        target_language: &str,
    ) -> Result<String, ProviderError> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter().await;

        match &self.behavior {
            MockBehavior::Failing => Err(ProviderError::ApiError {
                status_code: 500,
                body: "Simulated provider failure".to_string(),
            }),
            MockBehavior::Unavailable => Err(ProviderError::Unavailable("connection refused".to_string())),
            _ => Ok(self.translate(text, target_language)),
        }
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        _source_language: &str,
        target_language: &str,
    ) -> Result<Vec<Option<String>>, ProviderError> {
        let count = self.batch_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter().await;

        match &self.behavior {
            MockBehavior::Intermittent { fail_every } if count % fail_every == fail_every - 1 => {
                Err(ProviderError::ApiError {
                    status_code: 503,
                    body: format!("Simulated intermittent failure (request #{})", count + 1),
                })
            }
            MockBehavior::Failing => Err(ProviderError::ApiError {
                status_code: 500,
                body: "Simulated provider failure".to_string(),
            }),
            MockBehavior::Unavailable => Err(ProviderError::Unavailable("connection refused".to_string())),
            MockBehavior::ShapeMismatch => Err(ProviderError::ResponseShape(format!(
                "expected {} results, got {}",
                texts.len(),
                texts.len().saturating_sub(1)
            ))),
            MockBehavior::FailBatchesContaining(marker) if texts.iter().any(|t| t.contains(marker.as_str())) => {
                Err(ProviderError::Timeout {
                    url: "mock://translate/batch".to_string(),
                    timeout_secs: 30,
                })
            }
            _ => Ok(texts
                .iter()
                .map(|text| Some(self.translate(text, target_language)))
                .collect()),
        }
    }

    async fn check_health(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Unavailable => Err(ProviderError::Unavailable("connection refused".to_string())),
            _ => Ok(()),
        }
    }
}
