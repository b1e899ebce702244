//! Static heuristic tables shared by the completeness analyzer.
//!
//! Each table is plain data so it can be exercised on its own. Patterns are
//! matched against the last non-empty line of a file with trailing whitespace
//! removed.

use regex::Regex;
use std::sync::OnceLock;

/// Endings that mean the producer was cut off mid-token.
pub const INCOMPLETE_SUFFIXES: &[(&str, &str)] = &[
    ("trailing-comma", r",$"),
    ("trailing-ellipsis", r"(?:\.\.\.|…)$"),
    ("dangling-arrow-or-logic", r"(?:=>|&&|\|\|)$"),
    ("dangling-assignment", r"(?:^|[^=!<>])=$"),
    ("unterminated-open-tag", r"<[A-Za-z][\w.:-]*(?:\s[^<>]*)?$"),
    ("unterminated-close-tag", r"</[A-Za-z][\w.:-]*$"),
    ("dangling-import-source", r#"\bfrom\s*["'][^"']*$"#),
    ("dangling-import-clause", r#"^\s*import\b[^"'`;]*$"#),
    ("unclosed-opener", r"[(\[{]$"),
];

/// Endings that look like the natural end of a file.
pub const PROPER_ENDINGS: &[(&str, &str)] = &[
    ("closing-punctuation", r"[}\]);>]$"),
    ("sentence-punctuation", r"[.!?]$"),
    ("closing-quote", r#"["'`]$"#),
    ("block-comment-end", r"\*/$"),
    ("export-default-name", r"^\s*export\s+default\s+[\w$.]+;?$"),
];

/// Markers that a long document is real code rather than prose.
pub const CODE_STRUCTURE: &str = r"\bfunction\b|\bclass\s+[A-Za-z_$]|=>";

/// HTML elements that never take a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

fn compile(table: &'static [(&'static str, &'static str)]) -> Vec<(&'static str, Regex)> {
    table
        .iter()
        .filter_map(|(name, pattern)| match Regex::new(pattern) {
            Ok(re) => Some((*name, re)),
            Err(e) => {
                log::error!("Invalid heuristic pattern '{}': {}", name, e);
                None
            }
        })
        .collect()
}

fn incomplete_suffixes() -> &'static [(&'static str, Regex)] {
    static RE: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    RE.get_or_init(|| compile(INCOMPLETE_SUFFIXES))
}

fn proper_endings() -> &'static [(&'static str, Regex)] {
    static RE: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    RE.get_or_init(|| compile(PROPER_ENDINGS))
}

fn code_structure_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CODE_STRUCTURE).ok()).as_ref()
}

/// Name of the first incomplete-suffix pattern matching `last_line`.
pub fn match_incomplete_suffix(last_line: &str) -> Option<&'static str> {
    incomplete_suffixes()
        .iter()
        .find(|(_, re)| re.is_match(last_line))
        .map(|(name, _)| *name)
}

pub fn has_proper_ending(last_line: &str) -> bool {
    proper_endings().iter().any(|(_, re)| re.is_match(last_line))
}

pub fn has_code_structure(content: &str) -> bool {
    code_structure_re().is_some_and(|re| re.is_match(content))
}

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name.to_ascii_lowercase().as_str())
}
