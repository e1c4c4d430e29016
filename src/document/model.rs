/*!
 * In-memory subtitle document model.
 *
 * A document keeps every source line. Lines that are not cues (script info,
 * styles, blank separators, comments) are stored verbatim, including a
 * trailing `\r` when the line was terminated by `\r\n`, so that the
 * serializer can reproduce mixed line endings byte-for-byte.
 */

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// Subtitle text format variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Advanced SubStation (.ass / .ssa)
    Ass,
    /// SubRip (.srt)
    Srt,
    /// One caption per non-blank line, no timing
    Plain,
}

impl Dialect {
    /// Best-effort dialect detection from content
    ///
    /// ASS wins as soon as a dialogue prefix or a script info section appears;
    /// SRT needs at least one timing line. Everything else is plain text.
    pub fn detect(text: &str) -> Self {
        if text.contains("Dialogue:") || text.contains("[Script Info]") {
            return Self::Ass;
        }
        if text.lines().any(|line| line.contains("-->")) {
            return Self::Srt;
        }
        Self::Plain
    }

    /// Dialect implied by a file extension, if any
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "ass" | "ssa" => Some(Self::Ass),
            "srt" => Some(Self::Srt),
            "txt" => Some(Self::Plain),
            _ => None,
        }
    }

    /// Preferred file extension for output in this dialect
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Ass => "ass",
            Self::Srt => "srt",
            Self::Plain => "txt",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for Dialect {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "ass" | "ssa" => Ok(Self::Ass),
            "srt" | "subrip" => Ok(Self::Srt),
            "plain" | "txt" | "text" => Ok(Self::Plain),
            _ => Err(anyhow!("Unknown subtitle dialect: {}", s)),
        }
    }
}

/// Whether a source document uses `\r\n` anywhere
///
/// Informational only: every line keeps its own terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn detect(text: &str) -> Self {
        if text.contains("\r\n") { Self::CrLf } else { Self::Lf }
    }
}

/// One timed caption unit
///
/// The record is stored as a verbatim `head` (everything that is not text
/// payload: the `Dialogue:` prefix with its fixed fields, or the SRT index and
/// timing lines) and the `raw_text` payload. Only the payload is ever replaced.
///
/// When every payload line of the record ended in `\r\n`, the carriage returns
/// are stripped from `raw_text` and restored by `raw_line()`, also on lines a
/// merge adds.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleEntry {
    /// Opaque lines between the previous entry and this one
    pub leading: Vec<String>,

    /// Non-text fields, in source order
    pub fixed_fields: Vec<String>,

    /// Text payload exactly as found in the source
    pub raw_text: String,

    /// Payload without control codes, sent for translation
    pub clean_text: String,

    /// Translation merged into this entry, if any
    pub translated_text: Option<String>,

    head: String,
    separator: &'static str,
    carriage_return: bool,
}

impl SubtitleEntry {
    /// Create an entry from its verbatim pieces
    ///
    /// `raw_line()` is `head + separator + raw_text`.
    pub fn new(
        leading: Vec<String>,
        head: String,
        separator: &'static str,
        fixed_fields: Vec<String>,
        raw_text: String,
        clean_text: String,
    ) -> Self {
        Self {
            leading,
            fixed_fields,
            raw_text,
            clean_text,
            translated_text: None,
            head,
            separator,
            carriage_return: false,
        }
    }

    /// Mark the payload lines as `\r\n` terminated
    pub fn with_carriage_return(mut self, carriage_return: bool) -> Self {
        self.carriage_return = carriage_return;
        self
    }

    /// The source record this entry was parsed from, or its merged replacement
    ///
    /// The result carries no final `\n`; the serializer adds it.
    pub fn raw_line(&self) -> String {
        if self.carriage_return {
            format!("{}{}{}\r", self.head, self.separator, self.raw_text.replace('\n', "\r\n"))
        } else {
            format!("{}{}{}", self.head, self.separator, self.raw_text)
        }
    }

    /// Verbatim non-payload part of the record
    pub fn head(&self) -> &str {
        &self.head
    }

    /// Whether this entry carries anything worth translating
    pub fn is_translatable(&self) -> bool {
        !self.clean_text.is_empty()
    }

    /// A new entry with the payload replaced; every other field is copied
    pub fn with_payload(&self, raw_text: String, translated_text: String) -> Self {
        Self {
            leading: self.leading.clone(),
            fixed_fields: self.fixed_fields.clone(),
            raw_text,
            clean_text: self.clean_text.clone(),
            translated_text: Some(translated_text),
            head: self.head.clone(),
            separator: self.separator,
            carriage_return: self.carriage_return,
        }
    }
}

/// A parsed subtitle document
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleDocument {
    /// Dialect the document was parsed as
    pub dialect: Dialect,

    /// Opaque lines before the first entry
    pub header: Vec<String>,

    /// Entries in display order
    pub entries: Vec<SubtitleEntry>,

    /// Opaque lines after the last entry
    pub trailer: Vec<String>,

    /// `CrLf` when any source line ends in `\r\n`
    pub line_ending: LineEnding,
}

impl SubtitleDocument {
    /// Number of entries with non-empty clean text
    pub fn translatable_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_translatable()).count()
    }

    /// Same document with its entries replaced
    pub fn with_entries(&self, entries: Vec<SubtitleEntry>) -> Self {
        Self {
            dialect: self.dialect,
            header: self.header.clone(),
            entries,
            trailer: self.trailer.clone(),
            line_ending: self.line_ending,
        }
    }
}
