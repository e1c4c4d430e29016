/*!
 * Tests for subtitle parsing and serialization
 */

use std::collections::HashMap;

use dualsub::document::{Dialect, LineEnding, Parser, parse_auto, serialize};
use dualsub::errors::SubtitleError;
use dualsub::translation::{BilingualStyle, clean_translation, escape_ass_text, extract_clean_text, merge};

use crate::common::{SAMPLE_ASS, SAMPLE_SRT};

#[test]
fn test_parse_withSampleAss_shouldFindDialogueEntries() {
    let doc = Parser::new(Dialect::Ass).parse(SAMPLE_ASS).unwrap();

    assert_eq!(doc.entries.len(), 4);
    assert_eq!(doc.translatable_count(), 3);
    assert_eq!(doc.header.first().map(String::as_str), Some("\u{feff}[Script Info]"));
    assert_eq!(doc.entries[0].clean_text, "Hello world");
    assert_eq!(doc.entries[0].fixed_fields.len(), 9);
    assert_eq!(doc.entries[0].fixed_fields[1], "0:00:01.00");
    assert_eq!(doc.entries[1].leading, vec!["Comment: 0,0:00:02.00,0:00:03.00,Default,,0,0,0,,translator note".to_string()]);
    assert_eq!(doc.entries[1].clean_text, "");
    assert_eq!(doc.entries[2].raw_text, "Well, well,\\Nwell.");
    assert_eq!(doc.entries[2].clean_text, "Well, well, well.");
    assert_eq!(doc.trailer, vec![String::new()]);
}

#[test]
fn test_roundTrip_withSampleFiles_shouldBeByteExact() {
    for (dialect, text) in [(Dialect::Ass, SAMPLE_ASS), (Dialect::Srt, SAMPLE_SRT)] {
        let doc = Parser::new(dialect).parse(text).unwrap();
        assert_eq!(serialize(&doc), text, "round trip failed for {}", dialect);
    }
}

#[test]
fn test_roundTrip_withCrLfAndNoTrailingNewline_shouldBeByteExact() {
    let crlf = SAMPLE_ASS.trim_end().replace('\n', "\r\n");
    let doc = Parser::new(Dialect::Ass).parse(&crlf).unwrap();

    assert_eq!(doc.line_ending, LineEnding::CrLf);
    assert!(doc.trailer.is_empty());
    assert_eq!(serialize(&doc), crlf);
}

#[test]
fn test_roundTrip_withMixedLineEndings_shouldKeepEachTerminator() {
    let ass = "[Script Info]\r\nTitle: x\n\n[Events]\r\nDialogue: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,Hi\n";
    let srt = "1\r\n00:00:01,000 --> 00:00:02,000\nHello\r\nthere\n\r\n2\n00:00:03,000 --> 00:00:04,000\r\nBye\r\n";
    let plain = "one\r\ntwo\n\r\nthree";

    for (dialect, text) in [(Dialect::Ass, ass), (Dialect::Srt, srt), (Dialect::Plain, plain)] {
        let doc = Parser::new(dialect).parse(text).unwrap();
        assert_eq!(doc.line_ending, LineEnding::CrLf);
        assert_eq!(serialize(&doc), text, "round trip failed for {}", dialect);
    }
}

#[test]
fn test_parse_withMixedEndingsInsideCue_shouldStillCleanText() {
    let text = "1\n00:00:01,000 --> 00:00:02,000\nHello\r\nthere\n";
    let doc = Parser::new(Dialect::Srt).parse(text).unwrap();

    assert_eq!(doc.entries[0].clean_text, "Hello there");
    assert_eq!(serialize(&doc), text);
}

#[test]
fn test_roundTrip_withOddSpacing_shouldBeByteExact() {
    let text = "\n\n1\n00:00:01,000 --> 00:00:02,000\nA\n\n\n\n2\n00:00:03,000 --> 00:00:04,000\nB\n\n\n";
    let doc = Parser::new(Dialect::Srt).parse(text).unwrap();

    assert_eq!(doc.entries.len(), 2);
    assert_eq!(doc.entries[1].leading, vec![String::new(), String::new(), String::new()]);
    assert_eq!(serialize(&doc), text);
}

#[test]
fn test_parse_withCustomEventFormat_shouldUseDeclaredFieldCount() {
    let text = "[Events]\nFormat: Start, End, Style, Text\nDialogue: 0:00:01.00,0:00:02.00,Default,Hi, there";
    let doc = Parser::new(Dialect::Ass).parse(text).unwrap();

    assert_eq!(doc.entries.len(), 1);
    assert_eq!(doc.entries[0].fixed_fields, vec!["0:00:01.00", "0:00:02.00", "Default"]);
    assert_eq!(doc.entries[0].raw_text, "Hi, there");
}

#[test]
fn test_parse_withShortDialogue_shouldDependOnStrictness() {
    let text = "[Events]\nDialogue: 0,0:00:01.00,Default,Broken\nDialogue: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,Fine";

    let lenient = Parser::new(Dialect::Ass).parse(text).unwrap();
    assert_eq!(lenient.entries.len(), 1);
    assert_eq!(lenient.header.last().map(String::as_str), Some("Dialogue: 0,0:00:01.00,Default,Broken"));
    assert_eq!(serialize(&lenient), text);

    let strict = Parser::strict(Dialect::Ass).parse(text);
    assert!(matches!(strict, Err(SubtitleError::Format { line: 2, .. })));
}

#[test]
fn test_parse_withSrtMarkup_shouldJoinTextLines() {
    let doc = Parser::new(Dialect::Srt).parse(SAMPLE_SRT).unwrap();

    assert_eq!(doc.entries.len(), 3);
    assert_eq!(doc.entries[1].fixed_fields, vec!["2", "00:00:05,000 --> 00:00:09,000"]);
    assert_eq!(doc.entries[1].raw_text, "It contains <i>multiple</i>\nentries.");
    assert_eq!(doc.entries[1].clean_text, "It contains multiple entries.");
}

#[test]
fn test_parse_auto_shouldDetectDialect() {
    assert_eq!(parse_auto(SAMPLE_ASS).unwrap().dialect, Dialect::Ass);
    assert_eq!(parse_auto(SAMPLE_SRT).unwrap().dialect, Dialect::Srt);
    let plain = parse_auto("first line\n\nsecond line").unwrap();
    assert_eq!(plain.dialect, Dialect::Plain);
    assert_eq!(plain.entries.len(), 2);
}

#[test]
fn test_mergedAss_reparsed_shouldExposeCleanTranslationAfterBreak() {
    let doc = Parser::new(Dialect::Ass).parse(SAMPLE_ASS).unwrap();
    let raw_translations = ["  你好，\n世界  ", "\\u518d\\u89c1", "{笑} Au revoir\\h"];
    let translations: HashMap<usize, String> = [0usize, 2, 3]
        .into_iter()
        .zip(raw_translations.iter())
        .map(|(idx, text)| (idx, clean_translation(text)))
        .collect();

    let merged = doc.with_entries(merge(&doc.entries, &translations, Dialect::Ass, &BilingualStyle::default()));
    let reparsed = Parser::new(Dialect::Ass).parse(&serialize(&merged)).unwrap();

    assert_eq!(reparsed.entries.len(), doc.entries.len());
    for (idx, raw) in [0usize, 2, 3].into_iter().zip(raw_translations.iter()) {
        let payload = &reparsed.entries[idx].raw_text;
        let (_, tail) = payload.rsplit_once("\\N").unwrap();
        assert_eq!(extract_clean_text(tail, Dialect::Ass), escape_ass_text(&clean_translation(raw)));
        assert_eq!(reparsed.entries[idx].fixed_fields, doc.entries[idx].fixed_fields);
    }
    // The styling-only cue is untouched
    assert_eq!(reparsed.entries[1].raw_text, "{\\pos(100,200)}");
    // Braces in a translation survive as text instead of an override block
    assert!(reparsed.entries[3].clean_text.ends_with("｛笑｝ Au revoir＼h"));
}

#[test]
fn test_mergedAss_withTranslationWithoutMarkup_shouldReextractExactly() {
    let doc = Parser::new(Dialect::Ass).parse(SAMPLE_ASS).unwrap();
    let translations = HashMap::from([(0usize, clean_translation("  Bonjour le\tmonde "))]);

    let merged = doc.with_entries(merge(&doc.entries, &translations, Dialect::Ass, &BilingualStyle::default()));
    let reparsed = Parser::new(Dialect::Ass).parse(&serialize(&merged)).unwrap();

    let (_, tail) = reparsed.entries[0].raw_text.rsplit_once("\\N").unwrap();
    assert_eq!(extract_clean_text(tail, Dialect::Ass), "Bonjour le monde");
}
