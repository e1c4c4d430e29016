/*!
 * Subtitle document model, parsing and serialization.
 *
 * - `model`: `SubtitleDocument`, `SubtitleEntry` and `Dialect`
 * - `parser`: raw text to document, for ASS/SSA, SRT and plain text
 * - `serializer`: document back to text
 */

pub mod model;
pub mod parser;
pub mod serializer;

pub use self::model::{Dialect, LineEnding, SubtitleDocument, SubtitleEntry};
pub use self::parser::{parse_auto, Parser};
pub use self::serializer::serialize;
