//! Term and query normalisation.
//!
//! Lexicon terms and generated candidates are stored in *term form*:
//! lower-case, with runs of whitespace replaced by `_` (e.g. "Blue Football"
//! → "blue_football"). Search queries use *query form*: lower-case, with `_`
//! turned back into single spaces (e.g. "blue_football pill").

/// Separator joining the tokens of a multi-word term.
pub const SEPARATOR: char = '_';

/// Normalise a string into term form.
pub fn normalize_term(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Normalise a string into query form.
///
/// This is the cache key used by the search memo, so two spellings of the
/// same query ("Blue_Football", "blue  football") share one entry.
pub fn normalize_query(s: &str) -> String {
    s.to_lowercase()
        .replace(SEPARATOR, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
