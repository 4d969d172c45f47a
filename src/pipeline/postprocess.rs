//! Post-processing: deterministic cleanup of extracted text.
//!
//! Text pulled out of PDF content streams and Word runs carries artefacts of
//! its container: CR line endings, zero-width joiners and soft hyphens,
//! control bytes from unmapped glyphs, runs of spaces left by positioning
//! operators. ExtractText promises a flat paragraph per page, so these rules
//! reduce whatever came out of the decoder to exactly that.
//!
//! ## Rule Order
//!
//! Line endings are normalised before hyphen joining, and invisible
//! characters go before whitespace collapsing so a zero-width space between
//! two spaces does not leave a double space behind.

use once_cell::sync::Lazy;
use regex::Regex;

/// Reduce `input` to one flat paragraph.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 3. Replace remaining control characters with spaces
/// 4. Re-join words hyphenated across a line break
/// 5. Collapse all whitespace runs (including newlines) to one space
/// 6. Trim
pub fn clean_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = replace_control_chars(&s);
    let s = join_hyphenated_breaks(&s);
    collapse_whitespace(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Control characters ──────────────────────────────────────────────

fn replace_control_chars(input: &str) -> String {
    input
        .chars()
        .map(|c| if c.is_control() && c != '\n' { ' ' } else { c })
        .collect()
}

// ── Rule 4: Hyphenated line breaks ──────────────────────────────────────────

static RE_HYPHEN_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{L})-[ \t]*\n[ \t]*(\p{Ll})").unwrap());

fn join_hyphenated_breaks(input: &str) -> String {
    RE_HYPHEN_BREAK.replace_all(input, "$1$2").into_owned()
}

// ── Rule 5 + 6: Whitespace ──────────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn collapse_whitespace(input: &str) -> String {
    RE_WHITESPACE.replace_all(input, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn test_control_chars_become_spaces() {
        assert_eq!(replace_control_chars("a\u{0}b\tc\nd"), "a b c\nd");
    }

    #[test]
    fn test_hyphenated_break_joined() {
        assert_eq!(join_hyphenated_breaks("conver-\nsion"), "conversion");
        // Capitalised continuation is a real hyphen (e.g. a compound name).
        assert_eq!(join_hyphenated_breaks("Rust-\nLang"), "Rust-\nLang");
    }

    #[test]
    fn test_clean_text_flattens() {
        let raw = "  First line\r\n\r\nsecond\u{200B}   line\tend  ";
        assert_eq!(clean_text(raw), "First line second line end");
    }

    #[test]
    fn test_clean_text_empty() {
        assert_eq!(clean_text(" \n\t "), "");
    }
}
