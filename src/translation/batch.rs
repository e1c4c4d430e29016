/*!
 * Batch translation processing.
 *
 * This module partitions translatable entries into ordered batches and runs
 * them against a backend with bounded concurrency, cancellation and
 * per-batch failure isolation.
 */

use futures::stream::{self, StreamExt};
use log::{debug, error, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::Semaphore;

use crate::document::SubtitleEntry;
use crate::errors::{ConfigError, ProviderError, TranslationError};
use crate::providers::TranslationProvider;

use super::core::{CancellationFlag, TranslationOptions};
use super::formatting::clean_translation;

/// One text submitted to the backend, tagged with its entry position
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    /// Index of the entry in the document
    pub entry_index: usize,
    /// Clean text sent for translation
    pub text: String,
}

/// Ordered group of texts submitted together
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Zero-based position of the batch in the run
    pub index: usize,
    pub items: Vec<BatchItem>,
}

impl Batch {
    pub fn entry_indices(&self) -> Vec<usize> {
        self.items.iter().map(|item| item.entry_index).collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.items.iter().map(|item| item.text.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Partition the translatable entries into contiguous batches of at most `size` items
///
/// Entries with an empty clean text are skipped, so they never reach the backend.
pub fn batch_entries(entries: &[SubtitleEntry], size: usize) -> Result<Vec<Batch>, ConfigError> {
    if size == 0 {
        return Err(ConfigError::InvalidBatchSize {
            value: size,
            max: crate::app_config::MAX_BATCH_SIZE,
        });
    }

    let items: Vec<BatchItem> = entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.is_translatable())
        .map(|(entry_index, entry)| BatchItem {
            entry_index,
            text: entry.clean_text.clone(),
        })
        .collect();

    Ok(items
        .chunks(size)
        .enumerate()
        .map(|(index, chunk)| Batch {
            index,
            items: chunk.to_vec(),
        })
        .collect())
}

/// A batch whose entries (or some of them) stayed untranslated
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub batch_index: usize,
    /// Entries of the batch that were left untranslated
    pub entry_indices: Vec<usize>,
    pub error: ProviderError,
}

/// Collected results of a batch run
#[derive(Debug, Default)]
pub struct BatchRunReport {
    /// Cleaned, non-empty translations by entry index
    pub translations: HashMap<usize, String>,
    /// Failed batches, ordered by batch index
    pub failures: Vec<BatchFailure>,
    /// Batches never dispatched because the run was cancelled or stopped
    pub skipped_batches: Vec<usize>,
}

enum BatchOutcome {
    Completed,
    Failed(BatchFailure),
    Skipped(usize),
}

/// Batch translator for running batches against a backend
pub struct BatchTranslator {
    /// The backend to use
    provider: Arc<dyn TranslationProvider>,

    /// Languages and batching behavior
    options: TranslationOptions,
}

impl BatchTranslator {
    /// Create a new batch translator
    pub fn new(provider: Arc<dyn TranslationProvider>, options: TranslationOptions) -> Self {
        Self { provider, options }
    }

    /// Translate batches of entries
    ///
    /// `progress_callback` receives `(completed, total)` after every batch that
    /// reached the backend, whatever its outcome.
    pub async fn translate_batches(
        &self,
        batches: &[Batch],
        cancel: &CancellationFlag,
        progress_callback: impl Fn(usize, usize) + Send + Sync,
    ) -> Result<BatchRunReport, TranslationError> {
        let max_concurrent = self.options.max_concurrent_requests.max(1);

        // Create a semaphore to limit concurrent requests
        let semaphore = Arc::new(Semaphore::new(max_concurrent));

        let results: Mutex<HashMap<usize, String>> = Mutex::new(HashMap::new());
        let first_failure: Mutex<Option<BatchFailure>> = Mutex::new(None);
        let stop_dispatch = AtomicBool::new(false);

        // Track progress
        let total_batches = batches.len();
        let processed_batches = AtomicUsize::new(0);

        let outcomes = stream::iter(batches.iter())
            .map(|batch| {
                let semaphore = semaphore.clone();
                let results = &results;
                let first_failure = &first_failure;
                let stop_dispatch = &stop_dispatch;
                let processed_batches = &processed_batches;
                let progress_callback = &progress_callback;

                async move {
                    let _permit = match semaphore.acquire().await {
                        Ok(permit) => permit,
                        Err(_) => return BatchOutcome::Skipped(batch.index),
                    };

                    if cancel.is_cancelled() || stop_dispatch.load(Ordering::SeqCst) {
                        debug!("Skipping batch {} of {}", batch.index + 1, total_batches);
                        return BatchOutcome::Skipped(batch.index);
                    }

                    debug!("Processing batch {} of {} ({} entries)", batch.index + 1, total_batches, batch.len());
                    let start_time = Instant::now();
                    let outcome = self.translate_batch_with_recovery(batch, results).await;

                    // Update progress
                    let current = processed_batches.fetch_add(1, Ordering::SeqCst) + 1;
                    progress_callback(current, total_batches);

                    match outcome {
                        Ok(()) => {
                            debug!("Batch {} completed in {:?}", batch.index + 1, start_time.elapsed());
                            BatchOutcome::Completed
                        }
                        Err(failure) => {
                            error!("Batch {} failed: {}", batch.index + 1, failure.error);
                            if self.options.fail_fast {
                                stop_dispatch.store(true, Ordering::SeqCst);
                                let mut first = first_failure.lock();
                                if first.is_none() {
                                    *first = Some(failure.clone());
                                }
                            }
                            BatchOutcome::Failed(failure)
                        }
                    }
                }
            })
            .buffer_unordered(max_concurrent)
            .collect::<Vec<_>>()
            .await;

        if let Some(failure) = first_failure.into_inner() {
            return Err(TranslationError::BatchFailed {
                batch_index: failure.batch_index,
                entry_indices: failure.entry_indices,
                source: failure.error,
            });
        }

        let mut report = BatchRunReport {
            translations: results.into_inner(),
            ..BatchRunReport::default()
        };
        for outcome in outcomes {
            match outcome {
                BatchOutcome::Completed => {}
                BatchOutcome::Failed(failure) => report.failures.push(failure),
                BatchOutcome::Skipped(index) => report.skipped_batches.push(index),
            }
        }

        // Completion order is arbitrary, keep reports in batch order
        report.failures.sort_by_key(|failure| failure.batch_index);
        report.skipped_batches.sort_unstable();

        Ok(report)
    }

    /// Translate one batch, falling back to single-entry requests when enabled
    async fn translate_batch_with_recovery(
        &self,
        batch: &Batch,
        results: &Mutex<HashMap<usize, String>>,
    ) -> Result<(), BatchFailure> {
        // Skip empty batches
        if batch.is_empty() {
            return Ok(());
        }

        let source_language = &self.options.source_language;
        let target_language = &self.options.target_language;

        let error = match self
            .provider
            .translate_batch(&batch.texts(), source_language, target_language)
            .await
        {
            Ok(translated) if translated.len() == batch.len() => {
                let mut results = results.lock();
                for (item, translated) in batch.items.iter().zip(translated) {
                    if let Some(text) = translated.map(|t| clean_translation(&t)).filter(|t| !t.is_empty()) {
                        results.insert(item.entry_index, text);
                    }
                }
                return Ok(());
            }
            Ok(translated) => ProviderError::ResponseShape(format!(
                "expected {} results, got {}",
                batch.len(),
                translated.len()
            )),
            Err(e) => e,
        };

        if !self.options.retry_individual_entries {
            return Err(BatchFailure {
                batch_index: batch.index,
                entry_indices: batch.entry_indices(),
                error,
            });
        }

        warn!(
            "Batch {} failed ({}), retrying {} entries individually",
            batch.index + 1,
            error,
            batch.len()
        );

        let mut failed_entries = Vec::new();
        let mut last_error = error;
        for item in &batch.items {
            match self
                .provider
                .translate_one(&item.text, source_language, target_language)
                .await
            {
                Ok(text) => {
                    let text = clean_translation(&text);
                    if !text.is_empty() {
                        results.lock().insert(item.entry_index, text);
                    }
                }
                Err(e) => {
                    warn!("Failed to translate entry {}: {}", item.entry_index + 1, e);
                    failed_entries.push(item.entry_index);
                    last_error = e;
                }
            }
        }

        if failed_entries.is_empty() {
            Ok(())
        } else {
            Err(BatchFailure {
                batch_index: batch.index,
                entry_indices: failed_entries,
                error: last_error,
            })
        }
    }
}
