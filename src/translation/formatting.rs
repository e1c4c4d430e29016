/*!
 * Text extraction and response cleaning.
 *
 * `extract_clean_text` turns a raw subtitle payload into the string that is
 * sent for translation. `clean_translation` normalizes what comes back.
 */

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::document::Dialect;

/// Inline control span, non-greedy: `{\i1}`, `{\pos(10,20)}`, ...
static CONTROL_SPAN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{.*?\}").unwrap()
});

/// HTML-like inline tags used by SRT: `<i>`, `</font>`, `<font color="...">`
static MARKUP_TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"</?[A-Za-z][^<>]*>").unwrap()
});

/// ASS forced line break and hard space escapes
static ASS_BREAK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\[Nnh]").unwrap()
});

/// Runs of ASS line break escapes
static ASS_BREAK_RUN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\\[Nn])+").unwrap()
});

/// `\uXXXX` with a doubled or single backslash, doubled tried first
static UNICODE_ESCAPE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\\\\|\\)u([0-9a-fA-F]{4})").unwrap()
});

/// Break escapes and blanks closing a payload
static TRAILING_ASS_BREAK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\s*\\[Nn])+\s*$").unwrap()
});

static WHITESPACE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+").unwrap()
});

/// Strip control codes and line breaks from a payload
///
/// Returns an empty string when only whitespace is left.
pub fn extract_clean_text(raw_text: &str, dialect: Dialect) -> String {
    let without_spans = CONTROL_SPAN_REGEX.replace_all(raw_text, "");
    let text = match dialect {
        Dialect::Ass => ASS_BREAK_REGEX.replace_all(&without_spans, " ").into_owned(),
        Dialect::Srt => MARKUP_TAG_REGEX.replace_all(&without_spans, "").into_owned(),
        Dialect::Plain => without_spans.into_owned(),
    };
    squeeze_whitespace(&text)
}

/// Collapse every `\N` run of an ASS payload into a single forced break
pub fn normalize_ass_line_breaks(raw_text: &str) -> String {
    ASS_BREAK_RUN_REGEX.replace_all(raw_text, r"\N").into_owned()
}

/// Drop line breaks at the end of an ASS payload
pub fn trim_trailing_ass_breaks(raw_text: &str) -> &str {
    match TRAILING_ASS_BREAK_REGEX.find(raw_text) {
        Some(found) => &raw_text[..found.start()],
        None => raw_text,
    }
}

/// Make plain text safe to embed in an ASS payload
///
/// Braces and backslashes become their fullwidth forms so the text can never
/// open an override block or form a `\N`, `\n` or `\h` escape.
pub fn escape_ass_text(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '{' => '｛',
            '}' => '｝',
            '\\' => '＼',
            other => other,
        })
        .collect()
}

/// Normalize a string returned by the translation backend
///
/// Decodes `\uXXXX` escapes, turns newlines and tabs into spaces and squeezes
/// whitespace. Applying it twice gives the same result as applying it once.
pub fn clean_translation(text: &str) -> String {
    let mut decoded = text.to_string();
    // An escape can decode to a backslash that forms a new escape with its neighbours
    loop {
        let next = decode_unicode_escapes(&decoded);
        if next == decoded {
            break;
        }
        decoded = next;
    }

    let flattened = decoded.replace(['\n', '\r', '\t'], " ");
    squeeze_whitespace(&flattened)
}

fn decode_unicode_escapes(text: &str) -> String {
    UNICODE_ESCAPE_REGEX
        .replace_all(text, |caps: &Captures| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn squeeze_whitespace(text: &str) -> String {
    WHITESPACE_REGEX.replace_all(text, " ").trim().to_string()
}
