//! Run-file syntax: line classification and the recursive block parser.
//!
//! A run-file is line oriented. Blank lines are ignored, `;` starts a comment or an
//! `INCLUDE::<path>` directive, `(` opens a repeatable block and `)` (optionally
//! followed by `*<N>`) closes it. Every other line is a step line that the
//! [`crate::compiler`] turns into a [`crate::step::Step`].

use std::path::PathBuf;

use crate::diagnostics::SourceArc;

pub mod line;
pub mod parser;

pub use line::{classify, Line};
pub use parser::{parse_file, RunFileParser};

/// Byte range of a line within its run-file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A step line surviving parse, kept verbatim along with where it came from.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub text: String,
    /// The file that contained the line (the include target, for included lines).
    pub file: PathBuf,
    /// 1-based line number within `file`.
    pub line: usize,
    pub span: Span,
    pub source: SourceArc,
}

impl Instruction {
    pub fn text(&self) -> &str {
        &self.text
    }
}
