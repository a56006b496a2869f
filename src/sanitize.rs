//! Selection sanitizer. Turns raw selected text into a lookup-safe string,
//! or an empty string when the selection must not be looked up.

use std::sync::OnceLock;

use regex::Regex;

/// Longest accepted selection, in characters.
pub const MAX_CHARS: usize = 100;
/// Most words accepted in one selection.
pub const MAX_WORDS: usize = 5;

/// Every character of a selection must fall in this set: word characters,
/// supported letter scripts, zero-width joiners, whitespace and light punctuation.
const ALLOWED: &str = r"^[A-Za-z0-9_\x{00C0}-\x{024F}\x{0300}-\x{036F}\x{0400}-\x{04FF}\x{0590}-\x{05FF}\x{0600}-\x{06FF}\x{0900}-\x{097F}\x{0980}-\x{09FF}\x{0A00}-\x{0A7F}\x{0A80}-\x{0AFF}\x{0B00}-\x{0B7F}\x{0B80}-\x{0BFF}\x{0C00}-\x{0C7F}\x{0C80}-\x{0CFF}\x{0D00}-\x{0D7F}\x{0E00}-\x{0E7F}\x{0F00}-\x{0FFF}\x{1000}-\x{109F}\x{3040}-\x{309F}\x{30A0}-\x{30FF}\x{4E00}-\x{9FFF}\x{AC00}-\x{D7AF}\x{200C}\x{200D}\s\-'.,;:!?]+$";

/// At least one letter from the same scripts (combining marks excluded).
const LETTER: &str = r"[a-zA-Z\x{00C0}-\x{024F}\x{0400}-\x{04FF}\x{0590}-\x{05FF}\x{0600}-\x{06FF}\x{0900}-\x{097F}\x{0980}-\x{09FF}\x{0A00}-\x{0A7F}\x{0A80}-\x{0AFF}\x{0B00}-\x{0B7F}\x{0B80}-\x{0BFF}\x{0C00}-\x{0C7F}\x{0C80}-\x{0CFF}\x{0D00}-\x{0D7F}\x{0E00}-\x{0E7F}\x{0F00}-\x{0FFF}\x{1000}-\x{109F}\x{3040}-\x{309F}\x{30A0}-\x{30FF}\x{4E00}-\x{9FFF}\x{AC00}-\x{D7AF}]";

fn allowed() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ALLOWED).expect("allow-list regex is valid"))
}

fn letter() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(LETTER).expect("letter regex is valid"))
}

#[inline]
fn is_stripped(c: char) -> bool {
    matches!(c as u32, 0x00..=0x1F | 0x7F..=0x9F) || matches!(c, '<' | '>' | '\'' | '"' | '&')
}

/// Clean and validate a raw selection. Returns `""` when the text is not a
/// valid lookup.
///
/// Control characters and `< > ' " &` are removed before trimming so that a
/// second pass never changes the result.
pub fn sanitize(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|&c| !is_stripped(c)).collect();
    let s = stripped.trim();

    let len = s.chars().count();
    if len == 0 || len > MAX_CHARS {
        return String::new();
    }
    if s.split_whitespace().count() > MAX_WORDS {
        return String::new();
    }
    if s.chars().all(|c| c.is_ascii_digit()) {
        return String::new();
    }
    if !allowed().is_match(s) {
        return String::new();
    }
    if !letter().is_match(s) {
        return String::new();
    }

    s.to_string()
}

/// Convenience wrapper: `None` when the selection is rejected.
pub fn sanitized(raw: &str) -> Option<String> {
    let s = sanitize(raw);
    (!s.is_empty()).then_some(s)
}
