/*!
 * Client implementations for the translation backend.
 *
 * - `http`: the JSON-over-HTTP backend client
 * - `mock`: scripted in-memory backend for tests and dry runs
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::ProviderError;

/// Common trait for translation backends
///
/// This trait defines the contract the translation pipeline needs, allowing
/// the HTTP client and test doubles to be used interchangeably.
#[async_trait]
pub trait TranslationProvider: Send + Sync + Debug {
    /// Translate a single text
    async fn translate_one(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, ProviderError>;

    /// Translate several texts in one call
    ///
    /// # Returns
    /// * One slot per input text, in input order. `None` marks a text the
    ///   backend left untranslated. Any length mismatch is reported as
    ///   `ProviderError::ResponseShape` instead.
    async fn translate_batch(
        &self,
        texts: &[String],
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<Option<String>>, ProviderError>;

    /// Check that the backend answers at all
    async fn check_health(&self) -> Result<(), ProviderError>;

    /// Check that the configured credentials are accepted
    ///
    /// Backends without authentication succeed trivially.
    async fn verify_credentials(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

pub mod http;
pub mod mock;
