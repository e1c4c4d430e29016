/*!
 * Core translation service implementation.
 *
 * This module contains the main TranslationService struct, which drives a
 * parsed document through batching, backend calls, cleaning and merging.
 */

use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::app_config::Config;
use crate::document::SubtitleDocument;
use crate::errors::TranslationError;
use crate::providers::TranslationProvider;

use super::batch::{BatchFailure, BatchTranslator, batch_entries};
use super::merge::{BilingualStyle, merge};

/// Options for a translation run
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationOptions {
    /// Source language code
    pub source_language: String,

    /// Target language code
    pub target_language: String,

    /// Entries per backend call
    pub batch_size: usize,

    /// Maximum number of concurrent requests
    pub max_concurrent_requests: usize,

    /// Stop dispatching and fail the run on the first failed batch
    pub fail_fast: bool,

    /// Whether to retry individual entries on batch failure
    pub retry_individual_entries: bool,

    /// Presentation of the appended translation
    pub style: BilingualStyle,
}

impl Default for TranslationOptions {
    fn default() -> Self {
        Self {
            source_language: "en".to_string(),
            target_language: "zh".to_string(),
            batch_size: 10,
            max_concurrent_requests: 2,
            fail_fast: false,
            retry_individual_entries: false,
            style: BilingualStyle::default(),
        }
    }
}

impl TranslationOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            source_language: config.source_language.clone(),
            target_language: config.target_language.clone(),
            batch_size: config.batch.batch_size,
            max_concurrent_requests: config.batch.concurrent_requests,
            fail_fast: config.batch.fail_fast,
            retry_individual_entries: config.batch.retry_individual_entries,
            style: config.bilingual.clone(),
        }
    }
}

/// Cloneable cancellation signal shared between a run and whoever may stop it
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of translating one document
#[derive(Debug)]
pub struct TranslationOutcome {
    /// The bilingual document; untranslated entries are unchanged copies
    pub document: SubtitleDocument,

    /// Batches that left entries untranslated, in batch order
    pub failures: Vec<BatchFailure>,

    /// Batches never sent because the run was cancelled
    pub skipped_batches: Vec<usize>,

    /// Number of entries that received a translation
    pub translated_count: usize,

    /// Number of entries that were eligible for translation
    pub translatable_count: usize,
}

impl TranslationOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.skipped_batches.is_empty()
    }

    pub fn was_cancelled(&self) -> bool {
        !self.skipped_batches.is_empty()
    }

    /// Entry indices that stayed untranslated because their batch failed
    pub fn failed_entries(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .failures
            .iter()
            .flat_map(|failure| failure.entry_indices.iter().copied())
            .collect();
        indices.sort_unstable();
        indices
    }
}

/// Main translation service for subtitle documents
#[derive(Clone)]
pub struct TranslationService {
    /// Backend implementation
    provider: Arc<dyn TranslationProvider>,

    /// Translation options
    pub options: TranslationOptions,
}

impl TranslationService {
    /// Create a new translation service with the given backend and options
    pub fn new(provider: Arc<dyn TranslationProvider>, options: TranslationOptions) -> Self {
        Self { provider, options }
    }

    pub fn provider(&self) -> &Arc<dyn TranslationProvider> {
        &self.provider
    }

    /// Translate every translatable entry of a document and merge the results
    ///
    /// Entry order, header and trailer are preserved. Failed batches leave
    /// their entries untranslated and are listed in the outcome, unless
    /// `fail_fast` is set.
    pub async fn translate_document(
        &self,
        document: &SubtitleDocument,
        cancel: &CancellationFlag,
        progress_callback: impl Fn(usize, usize) + Send + Sync,
    ) -> Result<TranslationOutcome, TranslationError> {
        let batches = batch_entries(&document.entries, self.options.batch_size)?;
        let translatable_count: usize = batches.iter().map(|batch| batch.len()).sum();

        info!(
            "Translating {} of {} entries in {} batches ({} -> {})",
            translatable_count,
            document.entries.len(),
            batches.len(),
            self.options.source_language,
            self.options.target_language
        );

        let translator = BatchTranslator::new(Arc::clone(&self.provider), self.options.clone());
        let report = translator
            .translate_batches(&batches, cancel, progress_callback)
            .await?;

        if !report.skipped_batches.is_empty() {
            warn!(
                "Translation cancelled, {} batches were not sent",
                report.skipped_batches.len()
            );
        }
        for failure in &report.failures {
            warn!(
                "Batch {} left {} entries untranslated: {}",
                failure.batch_index + 1,
                failure.entry_indices.len(),
                failure.error
            );
        }

        let entries = merge(
            &document.entries,
            &report.translations,
            document.dialect,
            &self.options.style,
        );
        debug!("Merged {} translations", report.translations.len());

        Ok(TranslationOutcome {
            document: document.with_entries(entries),
            translated_count: report.translations.len(),
            translatable_count,
            failures: report.failures,
            skipped_batches: report.skipped_batches,
        })
    }
}
