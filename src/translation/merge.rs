/*!
 * Bilingual merge of translations into parsed entries.
 */

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::document::{Dialect, SubtitleEntry};

use super::formatting::{escape_ass_text, normalize_ass_line_breaks, trim_trailing_ass_breaks};

/// Presentation of the appended translation line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BilingualStyle {
    /// Override block inserted before the translation in ASS output.
    /// Must be a single `{...}` span.
    #[serde(default = "default_ass_override")]
    pub ass_override: String,

    /// Font colour of the translation in SRT output
    #[serde(default = "default_srt_color")]
    pub srt_color: String,
}

impl Default for BilingualStyle {
    fn default() -> Self {
        Self {
            ass_override: default_ass_override(),
            srt_color: default_srt_color(),
        }
    }
}

fn default_ass_override() -> String {
    r"{\fnSimHei\fs12\c&H3CF1F7&}".to_string()
}

fn default_srt_color() -> String {
    // Same yellow as the ASS override (&H3CF1F7& is BGR)
    "#F7F13C".to_string()
}

impl BilingualStyle {
    /// Payload combining the original text with its translation
    ///
    /// In ASS the translation is escaped, so everything after the inserted
    /// break extracts back to the translation itself.
    pub fn compose(&self, dialect: Dialect, raw_text: &str, translation: &str) -> String {
        match dialect {
            Dialect::Ass => format!(
                "{}\\N{}{}",
                trim_trailing_ass_breaks(&normalize_ass_line_breaks(raw_text)),
                self.ass_override,
                escape_ass_text(translation)
            ),
            Dialect::Srt => format!(
                "{}\n<font color=\"{}\">{}</font>",
                raw_text, self.srt_color, translation
            ),
            Dialect::Plain => format!("{}\n{}", raw_text, translation),
        }
    }
}

/// Build new entries with translations appended
///
/// Entries without a translation (or with an empty one) are returned as
/// clones of the originals.
pub fn merge(
    entries: &[SubtitleEntry],
    translations: &HashMap<usize, String>,
    dialect: Dialect,
    style: &BilingualStyle,
) -> Vec<SubtitleEntry> {
    entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| match translations.get(&idx) {
            Some(translated) if !translated.is_empty() => {
                let payload = style.compose(dialect, &entry.raw_text, translated);
                entry.with_payload(payload, translated.clone())
            }
            _ => entry.clone(),
        })
        .collect()
}
