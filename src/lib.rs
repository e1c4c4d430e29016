/*!
 * # dualsub - bilingual subtitles through a translation backend
 *
 * A Rust library that turns SubRip and Advanced SubStation subtitles into
 * bilingual ones: the text of every cue is sent to an HTTP translation
 * backend in batches, and the translation is appended under the original
 * line while timing, styling and every other line stay byte-identical.
 *
 * ## Features
 *
 * - Lossless parsing and serialization of ASS/SSA, SRT and plain text
 * - Ordered batching with bounded concurrency and cancellation
 * - Batch failures isolated to their own entries
 * - Text subtitle extraction from video files via ffprobe/ffmpeg
 * - ISO 639-1 and ISO 639-2 language code support
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `document`: subtitle model, parser and serializer
 * - `translation`: the pipeline:
 *   - `translation::core`: the service driving a document
 *   - `translation::batch`: batching and concurrent batch execution
 *   - `translation::formatting`: clean text and response cleaning
 *   - `translation::merge`: bilingual payload composition
 * - `providers`: translation backend clients (`http`, `mock`)
 * - `extraction`: subtitle streams of video files
 * - `app_config`: Configuration management
 * - `app_controller`: Main application controller
 * - `file_utils`: File system operations
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod document;
pub mod errors;
pub mod extraction;
pub mod file_utils;
pub mod language_utils;
pub mod providers;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use document::{Dialect, Parser, SubtitleDocument, SubtitleEntry, serialize};
pub use errors::{AppError, ConfigError, ExtractionError, ProviderError, SubtitleError, TranslationError};
pub use language_utils::{get_language_name, language_codes_match, normalize_to_part2t};
pub use translation::{CancellationFlag, TranslationOptions, TranslationOutcome, TranslationService};
