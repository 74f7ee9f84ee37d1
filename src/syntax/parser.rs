//! Recursive block parser over a flat line cursor.
//!
//! Each parse function takes the index of the line it starts on and returns the
//! index of the next unconsumed line, so recursion never shares iterator state.
//! Blocks are expanded in place: the body of `(` ... `)*N` is spliced into the
//! output `N` times, and an include directive splices the fully parsed target file.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::diagnostics::{to_named_source, ErrorContext, SourceArc};
use crate::syntax::line::{classify, field_count, Line, BLOCK_CLOSE, BLOCK_OPEN};
use crate::syntax::{Instruction, Span};
use crate::{err_msg, err_src, TorsoError};

/// Maximum number of comma-separated fields on a step line.
pub const MAX_STEP_FIELDS: usize = 3;

/// Upper bound on the instructions a single block may expand to.
pub const MAX_EXPANDED_LEN: usize = 1_000_000;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// A trimmed, non-empty line and where it sits in its file.
#[derive(Debug, Clone, Copy)]
struct SourceLine<'a> {
    text: &'a str,
    number: usize,
    span: Span,
}

/// Per-file state shared by the parse functions.
struct FileScope<'a> {
    path: &'a Path,
    dir: PathBuf,
    source: SourceArc,
    lines: Vec<SourceLine<'a>>,
}

/// Parses a run-file and everything it includes into a flat instruction list.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Vec<Instruction>, TorsoError> {
    RunFileParser::new().parse_file(path.as_ref())
}

/// Stateful only in the chain of files currently being included.
#[derive(Debug, Default)]
pub struct RunFileParser {
    include_stack: Vec<PathBuf>,
}

impl RunFileParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads and parses `path`.
    pub fn parse_file(&mut self, path: &Path) -> Result<Vec<Instruction>, TorsoError> {
        if !path.is_file() {
            return Err(err_msg!(
                Io,
                "Run file '{}' does not exist",
                path.display()
            ));
        }
        let text = fs::read_to_string(path).map_err(|e| TorsoError::io("read", path, e))?;
        self.parse_text(path, &text)
    }

    /// Parses `text` as if it had been read from `path`. Includes resolve against
    /// the directory of `path`.
    pub fn parse_text(&mut self, path: &Path, text: &str) -> Result<Vec<Instruction>, TorsoError> {
        let text = text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text);
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if self.include_stack.contains(&key) {
            return Err(err_msg!(
                Parse,
                "Include cycle: '{}' includes itself",
                path.display()
            )
            .with_help(self.include_chain(&key)));
        }

        let source = to_named_source(path.display().to_string(), text);
        check_balance(text, &source)?;

        let scope = FileScope {
            path,
            dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            source,
            lines: split_lines(text),
        };

        self.include_stack.push(key);
        let result = self.parse_lines(&scope);
        self.include_stack.pop();
        result
    }

    fn parse_lines(&mut self, scope: &FileScope<'_>) -> Result<Vec<Instruction>, TorsoError> {
        let mut out = Vec::new();
        let mut cursor = 0;
        while cursor < scope.lines.len() {
            cursor = self.parse_line(scope, cursor, &mut out)?;
        }
        Ok(out)
    }

    /// Handles the line at `cursor`, appending its instructions to `out`.
    fn parse_line(
        &mut self,
        scope: &FileScope<'_>,
        cursor: usize,
        out: &mut Vec<Instruction>,
    ) -> Result<usize, TorsoError> {
        let line = scope.lines[cursor];
        match classify(line.text) {
            Line::Comment => Ok(cursor + 1),
            Line::BlockOpen => {
                let (body, next) = self.parse_block(scope, cursor)?;
                out.extend(body);
                Ok(next)
            }
            Line::BlockClose { .. } => Err(err_src!(
                Parse,
                format!("Unexpected '{}' without a matching '{}'", BLOCK_CLOSE, BLOCK_OPEN),
                &scope.source,
                line.span
            )),
            Line::Include(target) => {
                let resolved = resolve_include(target, &scope.dir).ok_or_else(|| {
                    err_src!(
                        Parse,
                        format!("Cannot resolve include '{}'", target),
                        &scope.source,
                        line.span,
                        format!("Looked for '{}' and '{}'", target, scope.dir.join(target).display())
                    )
                })?;
                debug!(from = %scope.path.display(), include = %resolved.display(), "including run-file");
                out.extend(self.parse_file(&resolved)?);
                Ok(cursor + 1)
            }
            Line::Step(text) => {
                if field_count(text) > MAX_STEP_FIELDS {
                    return Err(err_src!(
                        Parse,
                        format!("Invalid number of fields: {}", text),
                        &scope.source,
                        line.span,
                        "A step line is 'name,configFile[,repeat]'"
                    ));
                }
                out.push(Instruction {
                    text: text.to_string(),
                    file: scope.path.to_path_buf(),
                    line: line.number,
                    span: line.span,
                    source: scope.source.clone(),
                });
                Ok(cursor + 1)
            }
        }
    }

    /// Parses the block opened at `open` up to its matching close marker and returns
    /// the expanded body with the index just past the close marker.
    fn parse_block(
        &mut self,
        scope: &FileScope<'_>,
        open: usize,
    ) -> Result<(Vec<Instruction>, usize), TorsoError> {
        let mut body = Vec::new();
        let mut cursor = open + 1;
        while cursor < scope.lines.len() {
            let line = scope.lines[cursor];
            if let Line::BlockClose { repeat } = classify(line.text) {
                let count = parse_repeat(repeat, scope, line)?;
                return Ok((expand(body, count, scope, line)?, cursor + 1));
            }
            cursor = self.parse_line(scope, cursor, &mut body)?;
        }
        Err(err_src!(
            Parse,
            "Block is never closed",
            &scope.source,
            scope.lines[open].span
        ))
    }

    fn include_chain(&self, last: &Path) -> String {
        let mut chain: Vec<String> = self
            .include_stack
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        chain.push(last.display().to_string());
        format!("Include chain: {}", chain.join(" -> "))
    }
}

/// Open and close markers must occur equally often anywhere in the text.
fn check_balance(text: &str, source: &SourceArc) -> Result<(), TorsoError> {
    let opens = text.matches(BLOCK_OPEN).count();
    let closes = text.matches(BLOCK_CLOSE).count();
    if opens == closes {
        return Ok(());
    }
    Err(TorsoError::Parse {
        message: format!(
            "Mismatched number of braces: {} '{}' against {} '{}'",
            opens, BLOCK_OPEN, closes, BLOCK_CLOSE
        ),
        ctx: ErrorContext {
            source: Some(source.clone()),
            span: None,
            help: Some("Every '(' line needs a matching ')' line".to_string()),
        },
        source: None,
    })
}

fn parse_repeat(
    repeat: Option<&str>,
    scope: &FileScope<'_>,
    line: SourceLine<'_>,
) -> Result<usize, TorsoError> {
    let Some(raw) = repeat else {
        return Ok(1);
    };
    match raw.parse::<usize>() {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(err_src!(
            Parse,
            format!("Invalid block repeat count '{}'", raw),
            &scope.source,
            line.span,
            "The repeat suffix is ')*N' with N a positive integer"
        )),
    }
}

fn expand(
    body: Vec<Instruction>,
    count: usize,
    scope: &FileScope<'_>,
    line: SourceLine<'_>,
) -> Result<Vec<Instruction>, TorsoError> {
    if count == 1 || body.is_empty() {
        return Ok(body);
    }
    let len = body
        .len()
        .checked_mul(count)
        .filter(|&len| len <= MAX_EXPANDED_LEN)
        .ok_or_else(|| {
            err_src!(
                Parse,
                format!("Block repeated {} times expands past {} steps", count, MAX_EXPANDED_LEN),
                &scope.source,
                line.span,
                "Lower the repeat count or split the block"
            )
        })?;
    let mut out = Vec::with_capacity(len);
    for _ in 0..count {
        out.extend(body.iter().cloned());
    }
    Ok(out)
}

/// The target as written if it names a file, otherwise relative to `dir`.
fn resolve_include(target: &str, dir: &Path) -> Option<PathBuf> {
    let direct = PathBuf::from(target);
    if direct.is_file() {
        return Some(direct);
    }
    let relative = dir.join(target);
    relative.is_file().then_some(relative)
}

fn split_lines(text: &str) -> Vec<SourceLine<'_>> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for (index, raw) in text.split_inclusive('\n').enumerate() {
        let start = offset;
        offset += raw.len();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        let leading = raw.len() - raw.trim_start().len();
        lines.push(SourceLine {
            text: trimmed,
            number: index + 1,
            span: Span {
                start: start + leading,
                end: start + leading + trimmed.len(),
            },
        });
    }
    lines
}
