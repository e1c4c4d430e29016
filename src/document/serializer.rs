/*!
 * Rendering a document back to subtitle text.
 */

use super::model::SubtitleDocument;

/// Render a document in its own dialect
///
/// Opaque lines are written verbatim and entries in document order, so an
/// untouched parse result reproduces its source exactly. Lines carry their own
/// `\r`, so records are joined with a bare `\n`.
pub fn serialize(document: &SubtitleDocument) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(document.header.len() + document.entries.len() * 2);
    lines.extend(document.header.iter().cloned());

    for entry in &document.entries {
        lines.extend(entry.leading.iter().cloned());
        lines.push(entry.raw_line());
    }

    lines.extend(document.trailer.iter().cloned());
    lines.join("\n")
}
