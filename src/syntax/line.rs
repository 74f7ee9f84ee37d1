//! Classification of a single trimmed run-file line.

use once_cell::sync::Lazy;
use regex::Regex;

pub const COMMENT_MARKER: char = ';';
pub const BLOCK_OPEN: char = '(';
pub const BLOCK_CLOSE: char = ')';
pub const REPEAT_MARKER: char = '*';

static INCLUDE_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^;\s*INCLUDE\s*::(.*)$").expect("valid include pattern"));

/// What a trimmed, non-empty line means to the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// A `;` line that is not an include directive.
    Comment,
    /// `;INCLUDE::<path>`, carrying the raw target.
    Include(&'a str),
    /// A line starting with `(`. Anything after the marker is ignored.
    BlockOpen,
    /// A line starting with `)`, carrying the text after `*` if present.
    BlockClose { repeat: Option<&'a str> },
    /// Anything else.
    Step(&'a str),
}

/// Classifies a trimmed line. The caller drops blank lines beforehand.
pub fn classify(text: &str) -> Line<'_> {
    match text.chars().next() {
        // An empty target is still a directive; the parser rejects it.
        Some(COMMENT_MARKER) => INCLUDE_DIRECTIVE
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().split("::").next().unwrap_or_default().trim())
            .map_or(Line::Comment, Line::Include),
        Some(BLOCK_OPEN) => Line::BlockOpen,
        Some(BLOCK_CLOSE) => {
            let rest = text[BLOCK_CLOSE.len_utf8()..].trim_start();
            let repeat = rest.strip_prefix(REPEAT_MARKER).map(str::trim);
            Line::BlockClose { repeat }
        }
        _ => Line::Step(text),
    }
}

/// Number of comma-separated fields in a step line.
pub fn field_count(text: &str) -> usize {
    text.split(',').count()
}
