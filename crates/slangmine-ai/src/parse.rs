//! Parsing numbered-list completions into candidate terms.
//!
//! Prompts end with the next list number (`4.` or `3.`), so the first line
//! of a completion is the continuation of that item and carries no number of
//! its own. Every later line must start with a one- or two-digit number and
//! a period; anything else is malformed, logged and dropped.

use slangmine_core::normalize_term;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCompletion {
    /// Cleaned candidates in completion order (duplicates kept).
    pub candidates: Vec<String>,
    /// Lines that were not numbered list items.
    pub malformed: Vec<String>,
}

/// Clean one list item: drop quotes, lower-case, join words with `_`.
fn clean(item: &str) -> String {
    normalize_term(&item.replace('"', ""))
}

/// Strip a leading `N.` or `NN.` list marker.
fn strip_number(line: &str) -> Option<&str> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if !(1..=2).contains(&digits) {
        return None;
    }
    line[digits..].strip_prefix('.')
}

pub fn parse_completion(text: &str) -> ParsedCompletion {
    let mut parsed = ParsedCompletion::default();
    let mut lines = text.lines();

    if let Some(first) = lines.next() {
        let item = clean(first);
        if !item.is_empty() {
            parsed.candidates.push(item);
        }
    }

    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match strip_number(trimmed) {
            Some(rest) => {
                let item = clean(rest);
                if !item.is_empty() {
                    parsed.candidates.push(item);
                }
            }
            None => {
                warn!(line = %trimmed, "completion line is not a numbered list item; dropped");
                parsed.malformed.push(trimmed.to_string());
            }
        }
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_continuation_and_numbered_items() {
        let text = " Bars\n5. blue footballs\n6. \"Zannies\"\n10. school bus";
        let parsed = parse_completion(text);
        assert_eq!(
            parsed.candidates,
            vec!["bars", "blue_footballs", "zannies", "school_bus"]
        );
        assert!(parsed.malformed.is_empty());
    }

    #[test]
    fn unnumbered_lines_are_dropped() {
        let text = " xanax\nHere are more:\n5. xans\n- bullet\n123. too long";
        let parsed = parse_completion(text);
        assert_eq!(parsed.candidates, vec!["xanax", "xans"]);
        assert_eq!(parsed.malformed, vec!["Here are more:", "- bullet", "123. too long"]);
    }

    #[test]
    fn blank_lines_are_ignored() {
        let parsed = parse_completion(" zans\n\n5. bicycle parts\n\n");
        assert_eq!(parsed.candidates, vec!["zans", "bicycle_parts"]);
        assert!(parsed.malformed.is_empty());
    }

    #[test]
    fn empty_completion() {
        assert_eq!(parse_completion(""), ParsedCompletion::default());
        assert!(parse_completion("   ").candidates.is_empty());
    }

    #[test]
    fn number_marker() {
        assert_eq!(strip_number("4. x"), Some(" x"));
        assert_eq!(strip_number("12.y"), Some("y"));
        assert_eq!(strip_number("x. y"), None);
        assert_eq!(strip_number("4) y"), None);
    }
}
