use anyhow::{Context, Result, anyhow};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::Config;
use crate::document::{Dialect, Parser, serialize};
use crate::errors::AppError;
use crate::extraction::{self, FfmpegExtractor, StreamSelector, SubtitleExtractor, SubtitleStream};
use crate::file_utils::{FileManager, FileType};
use crate::providers::TranslationProvider;
use crate::providers::http::HttpBackend;
use crate::translation::{CancellationFlag, TranslationOptions, TranslationOutcome, TranslationService};

// @module: Application controller for subtitle processing

/// Per-invocation options that are not part of the configuration file
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Overwrite existing output files
    pub force_overwrite: bool,
    /// Dialect of subtitle inputs; taken from the extension (or content) when absent
    pub dialect: Option<Dialect>,
    /// Reject malformed dialogue lines instead of keeping them verbatim
    pub strict: bool,
    /// Stream to use for video inputs
    pub stream: StreamSelector,
    /// Explicit output path, single-file runs only
    pub output: Option<PathBuf>,
    /// Do not probe the backend before translating
    pub skip_health_check: bool,
}

/// What happened to one input file
#[derive(Debug, Clone, PartialEq)]
pub enum FileResult {
    /// A bilingual file was written
    Translated {
        output_path: PathBuf,
        translated: usize,
        translatable: usize,
        /// 0-based indices of entries left untranslated by failed batches
        failed_entries: Vec<usize>,
    },
    /// A subtitle stream was written as-is
    Extracted(PathBuf),
    /// Output already existed and overwriting was not requested
    Skipped(PathBuf),
}

/// Counts for a directory run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderSummary {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Main application controller for subtitle translation
pub struct Controller {
    // @field: App configuration
    config: Config,

    // @field: Translation backend
    provider: Arc<dyn TranslationProvider>,

    // @field: Video subtitle source
    extractor: Arc<dyn SubtitleExtractor>,

    // @field: Shared stop signal for the current run
    cancel: CancellationFlag,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        let provider = Arc::new(HttpBackend::from_config(&config.backend));
        let extractor = Arc::new(FfmpegExtractor::from_config(&config.extraction));
        Ok(Self::with_components(config, provider, extractor))
    }

    /// Create a controller around explicit collaborators
    pub fn with_components(
        config: Config,
        provider: Arc<dyn TranslationProvider>,
        extractor: Arc<dyn SubtitleExtractor>,
    ) -> Self {
        Self {
            config,
            provider,
            extractor,
            cancel: CancellationFlag::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Flag that stops the current run when cancelled
    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Probe the backend and, when a token is configured, its credentials
    pub async fn check_backend(&self) -> Result<(), AppError> {
        self.provider.check_health().await?;
        self.provider.verify_credentials().await?;
        info!("Translation backend is reachable");
        Ok(())
    }

    /// Translate a single subtitle or video file
    pub async fn run(&self, input_file: PathBuf, options: &RunOptions) -> Result<FileResult> {
        if !input_file.is_file() {
            return Err(anyhow!("Input file does not exist: {:?}", input_file));
        }

        if !options.skip_health_check {
            self.check_backend().await?;
        }

        let multi_progress = MultiProgress::new();
        self.run_with_progress(&input_file, options.output.clone(), options, &multi_progress)
            .await
    }

    /// List the subtitle streams of a video file
    pub async fn list_streams(&self, video_file: &Path) -> Result<Vec<SubtitleStream>> {
        self.extractor
            .list_subtitle_streams(video_file)
            .await
            .with_context(|| format!("Failed to list subtitle streams of {:?}", video_file))
    }

    /// Extract a text subtitle stream next to the video, without translating it
    pub async fn extract_only(
        &self,
        video_file: &Path,
        selector: &StreamSelector,
        output: Option<PathBuf>,
        force_overwrite: bool,
    ) -> Result<FileResult> {
        let extracted = extraction::extract_subtitle_text(self.extractor.as_ref(), video_file, selector)
            .await
            .with_context(|| format!("Failed to extract subtitles from {:?}", video_file))?;

        let output_path = output.unwrap_or_else(|| {
            let language = extracted.stream.language.as_deref().unwrap_or("und");
            FileManager::generate_output_path(video_file, parent_dir(video_file), language, extracted.dialect.extension())
        });
        if output_path.exists() && !force_overwrite {
            warn!("Skipping {}, file already exists (use -f to force overwrite)", output_path.display());
            return Ok(FileResult::Skipped(output_path));
        }

        FileManager::write_to_file(&output_path, &extracted.text)?;
        info!("Success: {}", output_path.display());
        Ok(FileResult::Extracted(output_path))
    }

    /// Run the workflow in folder mode, processing every subtitle and video file
    /// Files that already have a bilingual output are skipped
    pub async fn run_folder(&self, input_dir: PathBuf, options: &RunOptions) -> Result<FolderSummary> {
        // Start timing the process
        let start_time = Instant::now();

        if !input_dir.is_dir() {
            return Err(anyhow!("Input directory does not exist: {:?}", input_dir));
        }

        let files = FileManager::find_input_files(&input_dir, &self.config.target_language)?;
        if files.is_empty() {
            return Err(anyhow!("No subtitle or video files found in directory: {:?}", input_dir));
        }

        if !options.skip_health_check {
            self.check_backend().await?;
        }

        let multi_progress = MultiProgress::new();
        let folder_pb = multi_progress.add(ProgressBar::new(files.len() as u64));
        folder_pb.set_style(progress_style("files"));
        folder_pb.set_message("Processing files");

        // Per-file output paths are derived, never the single-file override
        let file_options = RunOptions { output: None, ..options.clone() };
        let mut summary = FolderSummary::default();

        for file in &files {
            if self.cancel.is_cancelled() {
                warn!("Cancelled, {} files not processed", files.len() - summary.processed - summary.skipped - summary.errors);
                break;
            }

            let file_name = file
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            folder_pb.set_message(format!("Processing: {}", file_name));

            match self.run_with_progress(file, None, &file_options, &multi_progress).await {
                Ok(FileResult::Translated { .. } | FileResult::Extracted(_)) => summary.processed += 1,
                Ok(FileResult::Skipped(_)) => summary.skipped += 1,
                Err(e) => {
                    error!("Error processing file {}: {:#}", file_name, e);
                    summary.errors += 1;
                }
            }

            folder_pb.inc(1);
        }

        folder_pb.finish_with_message("Folder processing complete");

        info!(
            "Folder processing completed in {}: {} processed, {} skipped, {} errors",
            format_duration(start_time.elapsed()),
            summary.processed,
            summary.skipped,
            summary.errors
        );

        Ok(summary)
    }

    async fn run_with_progress(
        &self,
        input_file: &Path,
        output: Option<PathBuf>,
        options: &RunOptions,
        multi_progress: &MultiProgress,
    ) -> Result<FileResult> {
        let start_time = Instant::now();
        let output_dir = parent_dir(input_file);
        let target_language = &self.config.target_language;

        // A forced dialect applies to subtitle text only, videos keep their stream's dialect
        let file_type = match (FileManager::detect_file_type(input_file)?, options.dialect) {
            (FileType::Video, _) => FileType::Video,
            (_, Some(dialect)) => FileType::Subtitle(dialect),
            (detected, None) => detected,
        };

        let (text, dialect) = match file_type {
            FileType::Subtitle(dialect) => {
                let output_path = output.clone().unwrap_or_else(|| {
                    FileManager::generate_output_path(input_file, &output_dir, target_language, dialect.extension())
                });
                if output_path.exists() && !options.force_overwrite {
                    warn!("Skipping {}, translation already exists (use -f to force overwrite)", output_path.display());
                    return Ok(FileResult::Skipped(output_path));
                }
                (FileManager::read_to_string(input_file)?, dialect)
            }
            FileType::Video => {
                if output.is_none() && !options.force_overwrite {
                    // The extension depends on the stream, any existing bilingual output counts
                    for dialect in [Dialect::Ass, Dialect::Srt] {
                        let existing =
                            FileManager::generate_output_path(input_file, &output_dir, target_language, dialect.extension());
                        if existing.exists() {
                            warn!("Skipping {}, translation already exists (use -f to force overwrite)", existing.display());
                            return Ok(FileResult::Skipped(existing));
                        }
                    }
                }
                let extracted = extraction::extract_subtitle_text(self.extractor.as_ref(), input_file, &options.stream)
                    .await
                    .with_context(|| format!("Failed to extract subtitles from {:?}", input_file))?;
                (extracted.text, extracted.dialect)
            }
            FileType::Unknown => {
                return Err(anyhow!("Unsupported input file: {:?}", input_file));
            }
        };

        let output_path = output.unwrap_or_else(|| {
            FileManager::generate_output_path(input_file, &output_dir, target_language, dialect.extension())
        });
        if output_path.exists() && !options.force_overwrite {
            warn!("Skipping {}, translation already exists (use -f to force overwrite)", output_path.display());
            return Ok(FileResult::Skipped(output_path));
        }

        let parser = if options.strict { Parser::strict(dialect) } else { Parser::new(dialect) };
        let document = parser
            .parse(&text)
            .with_context(|| format!("Failed to parse subtitle file {:?}", input_file))?;

        let outcome = self.translate_with_progress(&document, multi_progress).await?;

        if outcome.was_cancelled() {
            return Err(anyhow!(
                "Translation cancelled, {} batches were not sent; no output written",
                outcome.skipped_batches.len()
            ));
        }

        let failed_entries = outcome.failed_entries();
        if !failed_entries.is_empty() {
            let lines: Vec<String> = failed_entries.iter().map(|i| (i + 1).to_string()).collect();
            warn!(
                "{} entries left untranslated (entries {})",
                failed_entries.len(),
                lines.join(", ")
            );
        }

        FileManager::write_to_file(&output_path, &serialize(&outcome.document))?;
        info!(
            "Success: {} ({}/{} entries translated in {})",
            output_path.display(),
            outcome.translated_count,
            outcome.translatable_count,
            format_duration(start_time.elapsed())
        );

        Ok(FileResult::Translated {
            output_path,
            translated: outcome.translated_count,
            translatable: outcome.translatable_count,
            failed_entries,
        })
    }

    async fn translate_with_progress(
        &self,
        document: &crate::document::SubtitleDocument,
        multi_progress: &MultiProgress,
    ) -> Result<TranslationOutcome> {
        let service = TranslationService::new(Arc::clone(&self.provider), TranslationOptions::from_config(&self.config));

        let progress_bar = multi_progress.add(ProgressBar::new(0));
        progress_bar.set_style(progress_style("batches"));
        progress_bar.set_message("Translating");

        let pb = progress_bar.clone();
        let result = service
            .translate_document(document, &self.cancel, move |completed, total| {
                pb.set_length(total as u64);
                pb.set_position(completed as u64);
            })
            .await;

        // Finish and clear so only the folder bar stays visible in folder mode
        progress_bar.finish_and_clear();

        Ok(result?)
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

fn progress_style(unit: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{percent}}%) {{msg}} {{eta}}",
            unit
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░")
}

// Format duration in a human-readable format
fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}.{:03}s", seconds, duration.subsec_millis())
    }
}
