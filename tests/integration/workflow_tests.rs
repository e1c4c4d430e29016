/*!
 * End-to-end controller tests with a scripted backend and extractor
 */

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use dualsub::app_config::Config;
use dualsub::app_controller::{Controller, FileResult, FolderSummary, RunOptions};
use dualsub::document::{Dialect, Parser};
use dualsub::extraction::StreamSelector;
use dualsub::providers::mock::{MockBehavior, MockProvider};

use crate::common::fake_extractor::FakeExtractor;
use crate::common::{self, SAMPLE_ASS, SAMPLE_SRT};

fn controller(provider: MockProvider, extractor: FakeExtractor) -> Controller {
    Controller::with_components(Config::default(), Arc::new(provider), Arc::new(extractor))
}

fn translated_path(result: &FileResult) -> PathBuf {
    match result {
        FileResult::Translated { output_path, .. } => output_path.clone(),
        other => panic!("expected a translated file, got {:?}", other),
    }
}

#[tokio::test]
async fn test_run_withAssFile_shouldWriteBilingualOutput() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "episode.ass", SAMPLE_ASS)?;
    let controller = controller(MockProvider::working(), FakeExtractor::new());

    let result = controller.run(input, &RunOptions::default()).await?;

    let output_path = temp_dir.path().join("episode.zh.ass");
    assert_eq!(
        result,
        FileResult::Translated {
            output_path: output_path.clone(),
            translated: 3,
            translatable: 3,
            failed_entries: vec![],
        }
    );

    let written = std::fs::read_to_string(&output_path)?;
    assert!(written.starts_with("\u{feff}[Script Info]\n"));
    assert!(written.contains("Comment: 0,0:00:02.00,0:00:03.00,Default,,0,0,0,,translator note\n"));

    let reparsed = Parser::new(Dialect::Ass).parse(&written)?;
    assert_eq!(reparsed.entries.len(), 4);
    assert_eq!(
        reparsed.entries[0].raw_text,
        "Hello {\\i1}world{\\i0}\\N{\\fnSimHei\\fs12\\c&H3CF1F7&}[zh] Hello world"
    );
    assert_eq!(reparsed.entries[1].raw_text, "{\\pos(100,200)}");
    assert_eq!(
        reparsed.entries[2].raw_text,
        "Well, well,\\Nwell.\\N{\\fnSimHei\\fs12\\c&H3CF1F7&}[zh] Well, well, well."
    );
    Ok(())
}

#[tokio::test]
async fn test_run_withExistingOutput_shouldSkipUnlessForced() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "movie.srt", SAMPLE_SRT)?;
    let existing = common::create_test_file(temp_dir.path(), "movie.zh.srt", "keep me")?;
    let provider = MockProvider::working();
    let controller = controller(provider.clone(), FakeExtractor::new());

    let result = controller.run(input.clone(), &RunOptions::default()).await?;
    assert_eq!(result, FileResult::Skipped(existing.clone()));
    assert_eq!(std::fs::read_to_string(&existing)?, "keep me");
    assert_eq!(provider.batch_calls(), 0);

    let forced = RunOptions {
        force_overwrite: true,
        ..RunOptions::default()
    };
    let result = controller.run(input, &forced).await?;
    assert_eq!(translated_path(&result), existing);
    let written = std::fs::read_to_string(&existing)?;
    assert!(written.contains("This is a test subtitle.\n<font color=\"#F7F13C\">[zh] This is a test subtitle.</font>"));
    Ok(())
}

#[tokio::test]
async fn test_run_withExplicitOutputAndDialect_shouldHonorBoth() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "subs.data", SAMPLE_SRT)?;
    let output = temp_dir.path().join("out/custom.srt");
    let controller = controller(MockProvider::working(), FakeExtractor::new());

    let options = RunOptions {
        dialect: Some(Dialect::Srt),
        output: Some(output.clone()),
        ..RunOptions::default()
    };
    let result = controller.run(input, &options).await?;

    assert_eq!(translated_path(&result), output);
    assert!(output.exists());
    Ok(())
}

#[tokio::test]
async fn test_run_withVideoFile_shouldTranslateExtractedStream() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "movie.mkv", "")?;
    let extractor = FakeExtractor::new()
        .with_stream(2, "hdmv_pgs_subtitle", Some("eng"), "")
        .with_stream(3, "subrip", Some("eng"), SAMPLE_SRT);
    let controller = controller(MockProvider::working(), extractor);

    let result = controller.run(input, &RunOptions::default()).await?;

    let output_path = temp_dir.path().join("movie.zh.srt");
    assert_eq!(translated_path(&result), output_path);
    let reparsed = Parser::new(Dialect::Srt).parse(&std::fs::read_to_string(&output_path)?)?;
    assert_eq!(reparsed.entries.len(), 3);
    assert!(reparsed.entries[1].raw_text.ends_with("[zh] It contains multiple entries.</font>"));
    Ok(())
}

#[tokio::test]
async fn test_run_withVideoAndForcedDialect_shouldStillExtractStream() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "movie.mkv", "")?;
    let extractor = FakeExtractor::new().with_stream(0, "subrip", Some("eng"), SAMPLE_SRT);
    let controller = controller(MockProvider::working(), extractor);

    let options = RunOptions {
        dialect: Some(Dialect::Ass),
        ..RunOptions::default()
    };
    let result = controller.run(input, &options).await?;

    let output_path = temp_dir.path().join("movie.zh.srt");
    assert_eq!(translated_path(&result), output_path);
    let reparsed = Parser::new(Dialect::Srt).parse(&std::fs::read_to_string(&output_path)?)?;
    assert_eq!(reparsed.entries.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_run_withVideoAndExistingAssOutput_shouldSkip() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "movie.mp4", "")?;
    let existing = common::create_test_file(temp_dir.path(), "movie.zh.ass", SAMPLE_ASS)?;
    let extractor = FakeExtractor::new().with_stream(0, "subrip", None, SAMPLE_SRT);
    let controller = controller(MockProvider::working(), extractor);

    let result = controller.run(input, &RunOptions::default()).await?;

    assert_eq!(result, FileResult::Skipped(existing));
    Ok(())
}

#[tokio::test]
async fn test_run_withPartialBackendFailure_shouldWriteAndListFailedEntries() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "episode.ass", SAMPLE_ASS)?;
    let mut config = Config::default();
    config.batch.batch_size = 1;
    config.batch.concurrent_requests = 1;
    let provider = MockProvider::new(MockBehavior::FailBatchesContaining("Goodbye".to_string()));
    let controller = Controller::with_components(config, Arc::new(provider), Arc::new(FakeExtractor::new()));

    let result = controller.run(input, &RunOptions::default()).await?;

    match result {
        FileResult::Translated { translated, translatable, failed_entries, output_path } => {
            assert_eq!(translated, 2);
            assert_eq!(translatable, 3);
            assert_eq!(failed_entries, vec![3]);
            let written = std::fs::read_to_string(output_path)?;
            assert!(written.ends_with("Dialogue: 0,0:00:07.00,0:00:09.00,Default,,0,0,0,,Goodbye\n"));
        }
        other => panic!("expected a translated file, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_run_withFailFast_shouldWriteNothing() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "episode.srt", SAMPLE_SRT)?;
    let mut config = Config::default();
    config.batch.fail_fast = true;
    let controller = Controller::with_components(config, Arc::new(MockProvider::failing()), Arc::new(FakeExtractor::new()));

    assert!(controller.run(input, &RunOptions::default()).await.is_err());
    assert!(!temp_dir.path().join("episode.zh.srt").exists());
    Ok(())
}

#[tokio::test]
async fn test_run_whenCancelled_shouldWriteNothing() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "episode.srt", SAMPLE_SRT)?;
    let controller = controller(MockProvider::working(), FakeExtractor::new());
    controller.cancellation_flag().cancel();

    let err = controller.run(input, &RunOptions::default()).await.unwrap_err();

    assert!(err.to_string().contains("cancelled"));
    assert!(!temp_dir.path().join("episode.zh.srt").exists());
    Ok(())
}

#[tokio::test]
async fn test_run_withStrictParsing_shouldRejectMalformedDialogue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let content = format!("{}Dialogue: 0,0:00:10.00,broken\n", SAMPLE_ASS);
    let input = common::create_test_file(temp_dir.path(), "broken.ass", &content)?;
    let controller = controller(MockProvider::working(), FakeExtractor::new());

    let strict = RunOptions {
        strict: true,
        ..RunOptions::default()
    };
    assert!(controller.run(input.clone(), &strict).await.is_err());

    let result = controller.run(input, &RunOptions::default()).await?;
    let written = std::fs::read_to_string(translated_path(&result))?;
    assert!(written.ends_with("Dialogue: 0,0:00:10.00,broken\n"));
    Ok(())
}

#[tokio::test]
async fn test_run_withUnavailableBackend_shouldFailHealthCheck() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "episode.srt", SAMPLE_SRT)?;
    let provider = MockProvider::new(MockBehavior::Unavailable);
    let controller = controller(provider.clone(), FakeExtractor::new());

    assert!(controller.check_backend().await.is_err());
    assert!(controller.run(input, &RunOptions::default()).await.is_err());
    assert_eq!(provider.batch_calls(), 0);
    assert!(!temp_dir.path().join("episode.zh.srt").exists());
    Ok(())
}

#[tokio::test]
async fn test_run_withMissingInput_shouldFail() {
    let controller = controller(MockProvider::working(), FakeExtractor::new());

    let result = controller
        .run(PathBuf::from("/definitely/not/here.srt"), &RunOptions::default())
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_run_folder_shouldCountProcessedSkippedAndErrors() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path();
    common::create_test_file(dir, "a.srt", SAMPLE_SRT)?;
    common::create_test_file(dir, "b.ass", SAMPLE_ASS)?;
    common::create_test_file(dir, "b.zh.ass", SAMPLE_ASS)?;
    common::create_test_file(dir, "c.mkv", "")?;
    // Only a bitmap stream, so the video fails
    let extractor = FakeExtractor::new().with_stream(0, "dvd_subtitle", None, "");
    let controller = controller(MockProvider::working(), extractor);

    let summary = controller.run_folder(dir.to_path_buf(), &RunOptions::default()).await?;

    assert_eq!(
        summary,
        FolderSummary {
            processed: 1,
            skipped: 1,
            errors: 1,
        }
    );
    assert!(dir.join("a.zh.srt").exists());
    assert!(!dir.join("c.zh.srt").exists());
    Ok(())
}

#[tokio::test]
async fn test_run_folder_withNoInputs_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    common::create_test_file(temp_dir.path(), "readme.md", "nothing to see")?;
    let controller = controller(MockProvider::working(), FakeExtractor::new());

    assert!(controller.run_folder(temp_dir.path().to_path_buf(), &RunOptions::default()).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_extract_only_shouldWriteStreamNextToVideo() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_test_file(temp_dir.path(), "film.mkv", "")?;
    let extractor = FakeExtractor::new()
        .with_stream(2, "ass", Some("eng"), SAMPLE_ASS)
        .with_stream(3, "subrip", Some("fre"), SAMPLE_SRT);
    let controller = controller(MockProvider::working(), extractor);
    let selector = StreamSelector::Index(3);

    let result = controller.extract_only(&video, &selector, None, false).await?;

    let expected = temp_dir.path().join("film.fre.srt");
    assert_eq!(result, FileResult::Extracted(expected.clone()));
    assert_eq!(std::fs::read_to_string(&expected)?, SAMPLE_SRT);

    let again = controller.extract_only(&video, &selector, None, false).await?;
    assert_eq!(again, FileResult::Skipped(expected));
    Ok(())
}

#[tokio::test]
async fn test_list_streams_shouldReturnExtractorListing() -> Result<()> {
    let extractor = FakeExtractor::new()
        .with_stream(2, "ass", Some("eng"), SAMPLE_ASS)
        .with_stream(5, "hdmv_pgs_subtitle", None, "");
    let controller = controller(MockProvider::working(), extractor);

    let streams = controller.list_streams(std::path::Path::new("any.mkv")).await?;

    let indices: Vec<usize> = streams.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![2, 5]);
    Ok(())
}
