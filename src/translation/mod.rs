/*!
 * Translation pipeline for bilingual subtitles.
 *
 * - `core`: the service driving a document through the pipeline
 * - `batch`: batching and concurrent batch execution
 * - `formatting`: clean-text extraction and response cleaning
 * - `merge`: appending translations to the original entries
 */

// Re-export main types for easier usage
pub use self::batch::{Batch, BatchFailure, BatchItem, BatchTranslator, batch_entries};
pub use self::core::{CancellationFlag, TranslationOptions, TranslationOutcome, TranslationService};
pub use self::formatting::{clean_translation, escape_ass_text, extract_clean_text};
pub use self::merge::{BilingualStyle, merge};

// Submodules
pub mod batch;
pub mod core;
pub mod formatting;
pub mod merge;
