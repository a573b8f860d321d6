// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-text receipts.
//
// Text is encoded into a single-byte Windows code page that the printer is
// switched to with `ESC t n` right after `ESC @`. Input is normalized first,
// so precomposed and decomposed (NFD) forms print the same. Letters the code
// page has no slot for are rebuilt from a base letter plus the combining marks
// the page does carry; failing that the bare base letter prints, and anything
// else prints as `?`.

use encoding_rs::{Encoding, WINDOWS_1252, WINDOWS_1258};
use tracing::{debug, instrument};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use escbridge_core::error::{PrintError, Result};
use escbridge_core::types::CodePage;

use crate::framer::{CommandBuilder, PrinterCommandStream, commands};

/// Most marks a decomposed letter carries in practice (Vietnamese has two).
const MAX_MARKS: usize = 4;

fn encoding_for(page: CodePage) -> &'static Encoding {
    match page {
        CodePage::Wpc1252 => WINDOWS_1252,
        CodePage::Wpc1258 => WINDOWS_1258,
    }
}

/// `ESC t` table number (Epson numbering, shared by most clones).
pub fn table_number(page: CodePage) -> u8 {
    match page {
        CodePage::Wpc1252 => 16,
        CodePage::Wpc1258 => 52,
    }
}

/// Bytes for `s` in `encoding`, or `None` if any character has no slot.
fn encode_exact(encoding: &'static Encoding, s: &str) -> Option<Vec<u8>> {
    let (bytes, _, had_errors) = encoding.encode(s);
    (!had_errors).then(|| bytes.into_owned())
}

fn encode_char(encoding: &'static Encoding, c: char, out: &mut Vec<u8>) {
    if c.is_control() && c != '\t' {
        out.push(b'?');
        return;
    }
    let mut buf = [0u8; 4];
    if let Some(bytes) = encode_exact(encoding, c.encode_utf8(&mut buf)) {
        out.extend_from_slice(&bytes);
        return;
    }

    let decomposed: Vec<char> = c.nfd().collect();
    let (base, marks) = match decomposed.split_first() {
        Some((&base, marks)) if !marks.is_empty() && marks.len() <= MAX_MARKS => (base, marks),
        _ => {
            // A mark the page cannot carry is dropped rather than shown as `?`.
            if !is_combining_mark(c) {
                out.push(b'?');
            }
            return;
        }
    };

    if let Some(bytes) = recompose(encoding, base, marks) {
        out.extend_from_slice(&bytes);
        return;
    }
    match encode_exact(encoding, base.encode_utf8(&mut buf)) {
        Some(bytes) => out.extend_from_slice(&bytes),
        None => out.push(b'?'),
    }
}

/// Split `marks` between a precomposed letter and trailing combining
/// characters so every piece has a slot in `encoding`. Keeps as many marks
/// inside the precomposed letter as possible.
fn recompose(encoding: &'static Encoding, base: char, marks: &[char]) -> Option<Vec<u8>> {
    let mut subsets: Vec<u32> = (0..(1u32 << marks.len())).collect();
    subsets.sort_by_key(|mask| std::cmp::Reverse(mask.count_ones()));

    for mask in subsets {
        let inside = marks
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, &m)| m);
        let letter: String = std::iter::once(base).chain(inside).nfc().collect();
        if letter.chars().count() != 1 {
            continue;
        }
        let Some(mut bytes) = encode_exact(encoding, &letter) else {
            continue;
        };

        let trailing = marks
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) == 0)
            .map(|(_, &m)| m);
        let mut complete = true;
        for mark in trailing {
            let mut buf = [0u8; 4];
            match encode_exact(encoding, mark.encode_utf8(&mut buf)) {
                Some(mark_bytes) => bytes.extend_from_slice(&mark_bytes),
                None => {
                    complete = false;
                    break;
                }
            }
        }
        if complete {
            return Some(bytes);
        }
    }
    None
}

/// Encode one line for `page`. Never emits a control byte other than tab.
pub fn encode_line(line: &str, page: CodePage) -> Vec<u8> {
    let encoding = encoding_for(page);
    let mut out = Vec::with_capacity(line.len());
    for c in line.nfc() {
        encode_char(encoding, c, &mut out);
    }
    out
}

/// Frame `text` as a receipt: code table select, one `LF` per line, then
/// feed and cut.
///
/// `\r\n` and lone `\r` both count as line breaks. A trailing break does not
/// add a blank line.
#[instrument(skip(text), fields(chars = text.chars().count()))]
pub fn frame_text(text: &str, page: CodePage) -> Result<PrinterCommandStream> {
    if text.trim().is_empty() {
        return Err(PrintError::InvalidInput("text content is empty".into()));
    }

    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = CommandBuilder::with_capacity(normalized.len() + 16);
    out.raw(&commands::SELECT_CODE_TABLE).byte(table_number(page));
    let mut lines = 0usize;
    for line in normalized.lines() {
        out.raw(&encode_line(line, page)).line_feed();
        lines += 1;
    }

    let stream = out.finish();
    debug!(lines, bytes = stream.len(), ?page, "text job framed");
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VN: CodePage = CodePage::Wpc1258;
    const WE: CodePage = CodePage::Wpc1252;

    #[test]
    fn ascii_passes_through() {
        assert_eq!(encode_line("Total: $12.50 (x2)", VN), b"Total: $12.50 (x2)");
        assert_eq!(encode_line("Total: $12.50 (x2)", WE), b"Total: $12.50 (x2)");
    }

    #[test]
    fn precomposed_vietnamese_uses_1258_slots() {
        // à, ê are single slots; đ is 0xF0.
        assert_eq!(encode_line("Cà phê đá", VN), b"C\xE0 ph\xEA \xF0\xE1");
    }

    #[test]
    fn tone_marks_become_combining_bytes() {
        // ạ = a + dot below; ở = ơ + hook above; ộ = ô + dot below.
        assert_eq!(encode_line("ạ", VN), b"a\xF2");
        assert_eq!(encode_line("ở", VN), b"\xF5\xD2");
        assert_eq!(encode_line("ộ", VN), b"\xF4\xF2");
        assert_eq!(encode_line("ĐƯỜNG", VN), b"\xD0\xDD\xD5\xCCNG");
    }

    #[test]
    fn decomposed_input_matches_precomposed() {
        let nfd = "Cafe\u{301} ph\u{1ea1}m Pho\u{31b}\u{309}";
        let nfc = "Café phạm Phở";
        assert_eq!(encode_line(nfd, VN), encode_line(nfc, VN));
        assert_eq!(encode_line(nfd, VN), b"Caf\xE9 pha\xF2m Ph\xF5\xD2");
        assert!(!encode_line(nfd, VN).contains(&b'?'));
    }

    #[test]
    fn western_page_keeps_latin_accents() {
        assert_eq!(encode_line("Crème brûlée", WE), b"Cr\xE8me br\xFBl\xE9e");
        assert_eq!(encode_line("Straße", WE), b"Stra\xDFe");
    }

    #[test]
    fn missing_letters_fall_back_to_base() {
        assert_eq!(encode_line("Phở bò", WE), b"Pho b\xF2");
        assert_eq!(encode_line("Pho\u{31b}\u{309}", WE), b"Pho");
    }

    #[test]
    fn unknown_characters_become_question_marks() {
        assert_eq!(encode_line("茶 ☕", VN), b"? ?");
    }

    #[test]
    fn control_bytes_cannot_reach_the_printer() {
        assert_eq!(encode_line("a\u{1b}@b\tc", VN), b"a?@b\tc");
    }

    #[test]
    fn frames_lines_between_init_and_cut() {
        let stream = frame_text("Hello\r\nWorld\rBye\n", VN).unwrap();
        let mut expected = vec![0x1B, 0x40, 0x1B, 0x74, 52];
        expected.extend_from_slice(b"Hello\nWorld\nBye\n");
        expected.extend_from_slice(&[0x1B, 0x64, 0x03, 0x1D, 0x56, 0x00]);
        assert_eq!(stream.as_bytes(), expected.as_slice());
    }

    #[test]
    fn western_page_selects_table_16() {
        let stream = frame_text("x", WE).unwrap();
        assert_eq!(&stream.as_bytes()[..5], &[0x1B, 0x40, 0x1B, 0x74, 16]);
    }

    #[test]
    fn inner_blank_lines_are_kept() {
        let stream = frame_text("a\n\nb", VN).unwrap();
        assert_eq!(&stream.as_bytes()[5..10], b"a\n\nb\n");
    }

    #[test]
    fn blank_text_is_rejected() {
        assert!(matches!(frame_text("  \n", VN), Err(PrintError::InvalidInput(_))));
    }
}
