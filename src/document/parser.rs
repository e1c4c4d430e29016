/*!
 * Subtitle parsing for ASS, SRT and plain line-oriented text.
 *
 * Every source line ends up either inside an entry or in an opaque line list
 * (`header`, an entry's `leading` lines, or `trailer`). Nothing is dropped.
 * Lines are split on `\n` only; a `\r` before it stays with its own line.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::SubtitleError;
use crate::translation::formatting::extract_clean_text;

use super::model::{Dialect, LineEnding, SubtitleDocument, SubtitleEntry};

const DIALOGUE_PREFIX: &str = "Dialogue:";

/// Field count of a standard `[Events]` Format line
const DEFAULT_ASS_FIELD_COUNT: usize = 10;

/// SRT timing line, e.g. `00:00:01,000 --> 00:00:04,000`
static SRT_TIMING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+):(\d{2}):(\d{2})[,.](\d{1,3})\s*-->\s*(\d+):(\d{2}):(\d{2})[,.](\d{1,3})").unwrap()
});

/// Parser settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parser {
    dialect: Dialect,
    strict: bool,
}

impl Parser {
    /// Lenient parser: malformed cue lines are kept verbatim as opaque lines
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect, strict: false }
    }

    /// Strict parser: malformed cue lines are a `SubtitleError::Format`
    pub fn strict(dialect: Dialect) -> Self {
        Self { dialect, strict: true }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Parse raw subtitle text into a document
    pub fn parse(&self, text: &str) -> Result<SubtitleDocument, SubtitleError> {
        let lines: Vec<&str> = text.split('\n').collect();

        let mut builder = DocumentBuilder::new(self.dialect, LineEnding::detect(text));
        match self.dialect {
            Dialect::Ass => self.parse_ass(&lines, &mut builder)?,
            Dialect::Srt => self.parse_srt(&lines, &mut builder)?,
            Dialect::Plain => Self::parse_plain(&lines, &mut builder),
        }

        let document = builder.finish();
        debug!(
            "Parsed {} document: {} entries, {} translatable",
            document.dialect,
            document.entries.len(),
            document.translatable_count()
        );
        Ok(document)
    }

    fn parse_ass(&self, lines: &[&str], builder: &mut DocumentBuilder) -> Result<(), SubtitleError> {
        let mut field_count = DEFAULT_ASS_FIELD_COUNT;
        let mut in_events = false;

        for (idx, line) in lines.iter().enumerate() {
            let trimmed = line.trim_start();

            if trimmed.starts_with('[') {
                in_events = trimmed.trim_end().eq_ignore_ascii_case("[events]");
                builder.push_opaque(line);
                continue;
            }

            if in_events {
                if let Some(format) = trimmed.strip_prefix("Format:") {
                    let declared = format.split(',').count();
                    if declared >= 2 {
                        field_count = declared;
                    }
                    builder.push_opaque(line);
                    continue;
                }
            }

            if !trimmed.starts_with(DIALOGUE_PREFIX) {
                builder.push_opaque(line);
                continue;
            }

            let (body, carriage_return) = strip_carriage_return(line);
            match split_dialogue(body, field_count) {
                Some((head, fields, payload)) => {
                    let clean_text = extract_clean_text(payload, Dialect::Ass);
                    builder.push_entry(head.to_string(), "", fields, payload.to_string(), clean_text, carriage_return);
                }
                None if self.strict => {
                    return Err(SubtitleError::Format {
                        line: idx + 1,
                        message: format!("dialogue line has fewer than {} fields", field_count),
                    });
                }
                None => {
                    debug!("Keeping malformed dialogue line {} verbatim", idx + 1);
                    builder.push_opaque(line);
                }
            }
        }
        Ok(())
    }

    fn parse_srt(&self, lines: &[&str], builder: &mut DocumentBuilder) -> Result<(), SubtitleError> {
        let mut idx = 0;
        while idx < lines.len() {
            let line = lines[idx];
            let (index_line, timing_idx) = if is_index_line(line) && idx + 1 < lines.len() && lines[idx + 1].contains("-->") {
                (Some(line), idx + 1)
            } else if line.contains("-->") {
                (None, idx)
            } else {
                builder.push_opaque(line);
                idx += 1;
                continue;
            };

            let timing_line = lines[timing_idx];
            if !SRT_TIMING_REGEX.is_match(timing_line) {
                if self.strict {
                    return Err(SubtitleError::Format {
                        line: timing_idx + 1,
                        message: format!("invalid timing line: {}", timing_line.trim()),
                    });
                }
                builder.push_opaque(line);
                idx += 1;
                continue;
            }

            let mut text_end = timing_idx + 1;
            while text_end < lines.len() && !lines[text_end].trim().is_empty() {
                text_end += 1;
            }
            let text_lines = &lines[timing_idx + 1..text_end];

            let head = match index_line {
                Some(index_line) => format!("{}\n{}", index_line, timing_line),
                None => timing_line.to_string(),
            };
            let fixed_fields = vec![
                index_line.map(|l| l.trim().to_string()).unwrap_or_default(),
                timing_line.trim().to_string(),
            ];
            // Carriage returns are lifted out only when the whole cue agrees on them
            let carriage_return = !text_lines.is_empty() && text_lines.iter().all(|l| l.ends_with('\r'));
            let payload = if carriage_return {
                text_lines.iter().map(|l| strip_carriage_return(l).0).collect::<Vec<_>>().join("\n")
            } else {
                text_lines.join("\n")
            };
            let separator = if text_lines.is_empty() { "" } else { "\n" };
            let clean_text = extract_clean_text(&payload, Dialect::Srt);

            builder.push_entry(head, separator, fixed_fields, payload, clean_text, carriage_return);
            idx = text_end;
        }
        Ok(())
    }

    fn parse_plain(lines: &[&str], builder: &mut DocumentBuilder) {
        for line in lines {
            if line.trim().is_empty() {
                builder.push_opaque(line);
            } else {
                let (body, carriage_return) = strip_carriage_return(line);
                let clean_text = extract_clean_text(body, Dialect::Plain);
                builder.push_entry(String::new(), "", Vec::new(), body.to_string(), clean_text, carriage_return);
            }
        }
    }
}

/// Parse with best-effort dialect detection
pub fn parse_auto(text: &str) -> Result<SubtitleDocument, SubtitleError> {
    Parser::new(Dialect::detect(text)).parse(text)
}

/// Split a dialogue line into (head, fixed fields, payload)
///
/// The split is limited to `field_count - 1` cuts so the payload keeps its own
/// commas. `head` is the verbatim prefix up to and including the last cut.
fn split_dialogue(line: &str, field_count: usize) -> Option<(&str, Vec<String>, &str)> {
    let prefix_start = line.find(DIALOGUE_PREFIX)?;
    let fields_start = prefix_start + DIALOGUE_PREFIX.len();

    let mut fixed_fields = Vec::with_capacity(field_count - 1);
    let mut cursor = fields_start;
    for _ in 0..field_count - 1 {
        let comma = line[cursor..].find(',')?;
        fixed_fields.push(line[cursor..cursor + comma].trim().to_string());
        cursor += comma + 1;
    }
    Some((&line[..cursor], fixed_fields, &line[cursor..]))
}

fn strip_carriage_return(line: &str) -> (&str, bool) {
    match line.strip_suffix('\r') {
        Some(body) => (body, true),
        None => (line, false),
    }
}

fn is_index_line(line: &str) -> bool {
    let trimmed = line.trim();
    // A BOM may precede the first index
    let trimmed = trimmed.trim_start_matches('\u{feff}');
    !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit())
}

/// Accumulates opaque lines and entries in source order
struct DocumentBuilder {
    dialect: Dialect,
    line_ending: LineEnding,
    header: Vec<String>,
    entries: Vec<SubtitleEntry>,
    pending: Vec<String>,
}

impl DocumentBuilder {
    fn new(dialect: Dialect, line_ending: LineEnding) -> Self {
        Self {
            dialect,
            line_ending,
            header: Vec::new(),
            entries: Vec::new(),
            pending: Vec::new(),
        }
    }

    fn push_opaque(&mut self, line: &str) {
        if self.entries.is_empty() {
            self.header.push(line.to_string());
        } else {
            self.pending.push(line.to_string());
        }
    }

    fn push_entry(
        &mut self,
        head: String,
        separator: &'static str,
        fixed_fields: Vec<String>,
        raw_text: String,
        clean_text: String,
        carriage_return: bool,
    ) {
        let leading = std::mem::take(&mut self.pending);
        self.entries.push(
            SubtitleEntry::new(leading, head, separator, fixed_fields, raw_text, clean_text)
                .with_carriage_return(carriage_return),
        );
    }

    fn finish(self) -> SubtitleDocument {
        SubtitleDocument {
            dialect: self.dialect,
            header: self.header,
            entries: self.entries,
            trailer: self.pending,
            line_ending: self.line_ending,
        }
    }
}
