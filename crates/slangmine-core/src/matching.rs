//! Token-aligned term matching.
//!
//! A known term matches a text when the term's tokens occur as a contiguous
//! run of the text's tokens. Single-token terms therefore only match whole
//! tokens: "ecstasy" is found in "street_ecstasy_pill" but not in
//! "notecstasy123".

use crate::term::SEPARATOR;

/// Split a term, candidate, or free text into comparable tokens.
///
/// Lower-cases, splits on whitespace and `_`, and strips leading/trailing
/// ASCII punctuation so that "(Xanax)," in a result snippet yields "xanax".
/// Inner punctuation is kept ("x-tc", "2.5mg").
pub fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c == SEPARATOR)
        .map(|t| t.trim_matches(|c: char| c.is_ascii_punctuation()))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whether `needle` occurs as a contiguous aligned run inside `haystack`.
///
/// An empty needle never matches.
pub fn contains_tokens(haystack: &[String], needle: &[String]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}
