/*!
 * Pipeline tests against scripted backends
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dualsub::document::{Dialect, Parser, SubtitleDocument, serialize};
use dualsub::errors::{ProviderError, TranslationError};
use dualsub::providers::TranslationProvider;
use dualsub::providers::mock::{MockBehavior, MockProvider};
use dualsub::translation::{CancellationFlag, TranslationOptions, TranslationService};

use crate::common::{self, SAMPLE_ASS};

fn plain_document(count: usize) -> SubtitleDocument {
    let text = (0..count).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");
    Parser::new(Dialect::Plain).parse(&text).unwrap()
}

fn options(batch_size: usize, concurrency: usize) -> TranslationOptions {
    TranslationOptions {
        source_language: "en".to_string(),
        target_language: "fr".to_string(),
        batch_size,
        max_concurrent_requests: concurrency,
        ..TranslationOptions::default()
    }
}

#[tokio::test]
async fn test_translate_document_withSlowConcurrentBatches_shouldKeepOrder() {
    common::init_test_logging();
    let doc = plain_document(20);
    let provider = MockProvider::slow(20);
    let service = TranslationService::new(Arc::new(provider.clone()), options(3, 4));

    let outcome = service
        .translate_document(&doc, &CancellationFlag::new(), |_, _| {})
        .await
        .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.translated_count, 20);
    for (idx, entry) in outcome.document.entries.iter().enumerate() {
        assert_eq!(entry.raw_text, format!("line {}\n[fr] line {}", idx, idx));
    }
    assert_eq!(provider.batch_calls(), 7);
    assert!(provider.peak_in_flight() <= 4);
}

#[tokio::test]
async fn test_translate_document_shouldRespectConcurrencyLimit() {
    let doc = plain_document(12);
    let provider = MockProvider::slow(30);
    let service = TranslationService::new(Arc::new(provider.clone()), options(1, 2));

    service
        .translate_document(&doc, &CancellationFlag::new(), |_, _| {})
        .await
        .unwrap();

    assert_eq!(provider.batch_calls(), 12);
    assert!(provider.peak_in_flight() <= 2, "peak was {}", provider.peak_in_flight());
}

#[tokio::test]
async fn test_translate_document_withFailedBatch_shouldPassEntriesThrough() {
    let doc = plain_document(6);
    let provider = MockProvider::new(MockBehavior::FailBatchesContaining("line 3".to_string()));
    let service = TranslationService::new(Arc::new(provider), options(2, 1));

    let outcome = service
        .translate_document(&doc, &CancellationFlag::new(), |_, _| {})
        .await
        .unwrap();

    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].batch_index, 1);
    assert_eq!(outcome.failures[0].entry_indices, vec![2, 3]);
    assert!(matches!(outcome.failures[0].error, ProviderError::Timeout { .. }));
    assert_eq!(outcome.failed_entries(), vec![2, 3]);
    assert_eq!(outcome.translated_count, 4);

    let entries = &outcome.document.entries;
    assert_eq!(entries.len(), 6);
    assert_eq!(entries[2], doc.entries[2]);
    assert_eq!(entries[3], doc.entries[3]);
    assert_eq!(entries[4].translated_text.as_deref(), Some("[fr] line 4"));
}

#[tokio::test]
async fn test_translate_document_withShapeMismatch_shouldMergeNothingFromBatch() {
    let doc = Parser::new(Dialect::Ass).parse(SAMPLE_ASS).unwrap();
    let service = TranslationService::new(Arc::new(MockProvider::shape_mismatch()), options(10, 2));

    let outcome = service
        .translate_document(&doc, &CancellationFlag::new(), |_, _| {})
        .await
        .unwrap();

    assert_eq!(outcome.translated_count, 0);
    assert!(matches!(outcome.failures[0].error, ProviderError::ResponseShape(_)));
    assert_eq!(serialize(&outcome.document), SAMPLE_ASS);
}

/// Backend that answers batches with one slot too many, bypassing client checks
#[derive(Debug)]
struct OversizedBatches;

#[async_trait]
impl TranslationProvider for OversizedBatches {
    async fn translate_one(&self, text: &str, _: &str, _: &str) -> Result<String, ProviderError> {
        Ok(format!("single {}", text))
    }

    async fn translate_batch(&self, texts: &[String], _: &str, _: &str) -> Result<Vec<Option<String>>, ProviderError> {
        let mut results: Vec<Option<String>> = texts.iter().map(|t| Some(format!("batch {}", t))).collect();
        results.push(Some("extra".to_string()));
        Ok(results)
    }

    async fn check_health(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_translate_document_withMisalignedResults_shouldRejectBatch() {
    let doc = plain_document(3);
    let service = TranslationService::new(Arc::new(OversizedBatches), options(3, 1));

    let outcome = service
        .translate_document(&doc, &CancellationFlag::new(), |_, _| {})
        .await
        .unwrap();

    assert_eq!(outcome.translated_count, 0);
    assert!(matches!(outcome.failures[0].error, ProviderError::ResponseShape(_)));
}

#[tokio::test]
async fn test_translate_document_withRetryIndividualEntries_shouldRecover() {
    let doc = plain_document(4);
    let provider = MockProvider::shape_mismatch();
    let service = TranslationService::new(
        Arc::new(provider.clone()),
        TranslationOptions {
            retry_individual_entries: true,
            ..options(2, 1)
        },
    );

    let outcome = service
        .translate_document(&doc, &CancellationFlag::new(), |_, _| {})
        .await
        .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.translated_count, 4);
    assert_eq!(provider.batch_calls(), 2);
    assert_eq!(provider.single_calls(), 4);
}

#[tokio::test]
async fn test_translate_document_withRetryAgainstDeadBackend_shouldReportEntries() {
    let doc = plain_document(3);
    let service = TranslationService::new(
        Arc::new(MockProvider::new(MockBehavior::Unavailable)),
        TranslationOptions {
            retry_individual_entries: true,
            ..options(3, 1)
        },
    );

    let outcome = service
        .translate_document(&doc, &CancellationFlag::new(), |_, _| {})
        .await
        .unwrap();

    assert_eq!(outcome.failed_entries(), vec![0, 1, 2]);
    assert!(matches!(outcome.failures[0].error, ProviderError::Unavailable(_)));
}

#[tokio::test]
async fn test_translate_document_withFailFast_shouldReturnBatchFailed() {
    let doc = plain_document(10);
    let provider = MockProvider::failing();
    let service = TranslationService::new(
        Arc::new(provider.clone()),
        TranslationOptions {
            fail_fast: true,
            ..options(2, 1)
        },
    );

    let result = service
        .translate_document(&doc, &CancellationFlag::new(), |_, _| {})
        .await;

    match result {
        Err(TranslationError::BatchFailed { batch_index, entry_indices, source }) => {
            assert_eq!(batch_index, 0);
            assert_eq!(entry_indices, vec![0, 1]);
            assert!(matches!(source, ProviderError::ApiError { status_code: 500, .. }));
        }
        other => panic!("expected BatchFailed, got {:?}", other.map(|o| o.translated_count)),
    }
    // Dispatch stops after the first failure
    assert_eq!(provider.batch_calls(), 1);
}

#[tokio::test]
async fn test_translate_document_withCancelledFlag_shouldSkipEverything() {
    let doc = plain_document(5);
    let provider = MockProvider::working();
    let service = TranslationService::new(Arc::new(provider.clone()), options(2, 2));
    let cancel = CancellationFlag::new();
    cancel.cancel();

    let outcome = service.translate_document(&doc, &cancel, |_, _| {}).await.unwrap();

    assert!(outcome.was_cancelled());
    assert_eq!(outcome.skipped_batches, vec![0, 1, 2]);
    assert_eq!(provider.batch_calls(), 0);
    assert_eq!(outcome.document, doc);
}

/// Backend that cancels the run while serving its first batch
#[derive(Debug)]
struct CancelOnFirstBatch {
    cancel: CancellationFlag,
    calls: AtomicUsize,
}

#[async_trait]
impl TranslationProvider for CancelOnFirstBatch {
    async fn translate_one(&self, text: &str, _: &str, _: &str) -> Result<String, ProviderError> {
        Ok(text.to_string())
    }

    async fn translate_batch(&self, texts: &[String], _: &str, _: &str) -> Result<Vec<Option<String>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.cancel.cancel();
        Ok(texts.iter().map(|t| Some(format!("done {}", t))).collect())
    }

    async fn check_health(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_translate_document_cancelledMidRun_shouldKeepInFlightResults() {
    let doc = plain_document(6);
    let cancel = CancellationFlag::new();
    let provider = Arc::new(CancelOnFirstBatch {
        cancel: cancel.clone(),
        calls: AtomicUsize::new(0),
    });
    let service = TranslationService::new(provider.clone(), options(2, 1));

    let outcome = service.translate_document(&doc, &cancel, |_, _| {}).await.unwrap();

    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.translated_count, 2);
    assert_eq!(outcome.skipped_batches, vec![1, 2]);
    assert_eq!(outcome.document.entries[0].translated_text.as_deref(), Some("done line 0"));
}

#[tokio::test]
async fn test_translate_document_shouldReportProgressPerBatch() {
    let doc = plain_document(7);
    let service = TranslationService::new(Arc::new(MockProvider::working()), options(2, 2));
    let seen = Mutex::new(Vec::new());

    service
        .translate_document(&doc, &CancellationFlag::new(), |done, total| seen.lock().push((done, total)))
        .await
        .unwrap();

    let mut seen = seen.into_inner();
    seen.sort_unstable();
    assert_eq!(seen, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
}

#[tokio::test]
async fn test_translate_document_withEscapedResponses_shouldCleanBeforeMerge() {
    let doc = plain_document(1);
    let provider = MockProvider::working().with_custom_translation(|_, _| "  \\u4f60\\u597d\n ".to_string());
    let service = TranslationService::new(Arc::new(provider), options(5, 1));

    let outcome = service
        .translate_document(&doc, &CancellationFlag::new(), |_, _| {})
        .await
        .unwrap();

    assert_eq!(outcome.document.entries[0].raw_text, "line 0\n你好");
}

#[tokio::test]
async fn test_translate_document_withBlankResponses_shouldLeaveEntriesUnchanged() {
    let doc = plain_document(2);
    let provider = MockProvider::working().with_custom_translation(|_, _| " \n ".to_string());
    let service = TranslationService::new(Arc::new(provider), options(5, 1));

    let outcome = service
        .translate_document(&doc, &CancellationFlag::new(), |_, _| {})
        .await
        .unwrap();

    assert_eq!(outcome.translated_count, 0);
    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.document, doc);
}
