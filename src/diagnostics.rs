//! Unified `miette`-based diagnostics for the Torso engine.
//!
//! Every failure produced while parsing, compiling, binding or running a run-file
//! is a [`TorsoError`]. Errors are built with the `err_msg!` and `err_src!`
//! macros rather than by hand:
//!
//! - `err_msg!(Binding, "Could not resolve entry point {}", name)` for message-only errors.
//! - `err_src!(Parse, "Invalid number of fields", source, span)` for errors that point
//!   at a line of a run-file.
//!
//! Per-step faults (`UnknownTest`, `NotExecutable`, `Timeout`) are recoverable: the
//! executor marks the step failed and the run continues. Everything else is fatal.

use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use thiserror::Error;

use crate::Span;

pub type SourceArc = Arc<NamedSource<String>>;

/// Type-safe classification of [`TorsoError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// Malformed block nesting, too many fields, unresolvable include
    Parse,
    /// Malformed step name or repeat count
    Compile,
    /// Native module could not be loaded, initialized or bound
    Binding,
    /// A single step could not run to completion
    Step,
    /// Operator abort
    Interrupted,
    /// Scripting backend failures
    Script,
    /// Invalid run configuration
    Config,
    /// Filesystem failures
    Io,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Parse => "Parse",
            ErrorType::Compile => "Compile",
            ErrorType::Binding => "Binding",
            ErrorType::Step => "Step",
            ErrorType::Interrupted => "Interrupted",
            ErrorType::Script => "Script",
            ErrorType::Config => "Config",
            ErrorType::Io => "Io",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Minimal, composable error context for diagnostics.
#[derive(Debug, Default)]
pub struct ErrorContext {
    /// The run-file this error points into (if any).
    pub source: Option<SourceArc>,
    /// The offending line within `source` (if any).
    pub span: Option<Span>,
    /// An optional help message.
    pub help: Option<String>,
}

impl ErrorContext {
    /// Returns an empty error context (no source, span, or help).
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates a context with both source and span.
    pub fn with_source_and_span(source: SourceArc, span: Span) -> Self {
        Self {
            source: Some(source),
            span: Some(span),
            help: None,
        }
    }
}

/// Unified error type for all Torso failure modes.
#[derive(Debug, Error)]
pub enum TorsoError {
    #[error("Parse error: {message}")]
    Parse {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Compile error: {message}")]
    Compile {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Module load error: {message}")]
    ModuleLoad {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Init error: {message}")]
    Init {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Context error: {message}")]
    Context {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Binding error: {message}")]
    Binding {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Unknown test: {message}")]
    UnknownTest {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Not executable: {message}")]
    NotExecutable {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Timeout: {message}")]
    Timeout {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Interrupted: {message}")]
    Interrupted {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Script error: {message}")]
    Script {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Config error: {message}")]
    Config {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("I/O error: {message}")]
    Io {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
}

impl TorsoError {
    fn parts(&self) -> (&str, &ErrorContext) {
        match self {
            TorsoError::Parse { message, ctx, .. }
            | TorsoError::Compile { message, ctx, .. }
            | TorsoError::ModuleLoad { message, ctx, .. }
            | TorsoError::Init { message, ctx, .. }
            | TorsoError::Context { message, ctx, .. }
            | TorsoError::Binding { message, ctx, .. }
            | TorsoError::UnknownTest { message, ctx, .. }
            | TorsoError::NotExecutable { message, ctx, .. }
            | TorsoError::Timeout { message, ctx, .. }
            | TorsoError::Interrupted { message, ctx, .. }
            | TorsoError::Script { message, ctx, .. }
            | TorsoError::Config { message, ctx, .. }
            | TorsoError::Io { message, ctx, .. } => (message, ctx),
        }
    }

    /// The bare message, without the variant prefix.
    pub fn message(&self) -> &str {
        self.parts().0
    }

    /// Returns the type-safe error classification for this error.
    pub fn error_type(&self) -> ErrorType {
        match self {
            TorsoError::Parse { .. } => ErrorType::Parse,
            TorsoError::Compile { .. } => ErrorType::Compile,
            TorsoError::ModuleLoad { .. }
            | TorsoError::Init { .. }
            | TorsoError::Context { .. }
            | TorsoError::Binding { .. } => ErrorType::Binding,
            TorsoError::UnknownTest { .. }
            | TorsoError::NotExecutable { .. }
            | TorsoError::Timeout { .. } => ErrorType::Step,
            TorsoError::Interrupted { .. } => ErrorType::Interrupted,
            TorsoError::Script { .. } => ErrorType::Script,
            TorsoError::Config { .. } => ErrorType::Config,
            TorsoError::Io { .. } => ErrorType::Io,
        }
    }

    /// True for faults that fail a single step without ending the run.
    pub fn is_step_fault(&self) -> bool {
        self.error_type() == ErrorType::Step
    }

    /// True for faults that end the run.
    pub fn is_fatal(&self) -> bool {
        !self.is_step_fault()
    }

    /// Attaches a help message, replacing any existing one.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        match &mut self {
            TorsoError::Parse { ctx, .. }
            | TorsoError::Compile { ctx, .. }
            | TorsoError::ModuleLoad { ctx, .. }
            | TorsoError::Init { ctx, .. }
            | TorsoError::Context { ctx, .. }
            | TorsoError::Binding { ctx, .. }
            | TorsoError::UnknownTest { ctx, .. }
            | TorsoError::NotExecutable { ctx, .. }
            | TorsoError::Timeout { ctx, .. }
            | TorsoError::Interrupted { ctx, .. }
            | TorsoError::Script { ctx, .. }
            | TorsoError::Config { ctx, .. }
            | TorsoError::Io { ctx, .. } => ctx.help = Some(help.into()),
        }
        self
    }

    /// Wraps an I/O failure on `path`.
    pub fn io(operation: &str, path: &std::path::Path, err: std::io::Error) -> Self {
        TorsoError::Io {
            message: format!("Failed to {} '{}': {}", operation, path.display(), err),
            ctx: ErrorContext::none(),
            source: Some(Box::new(err)),
        }
    }
}

impl Diagnostic for TorsoError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        Some(Box::new(format!(
            "torso::{}",
            self.error_type().as_str().to_lowercase()
        )))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.parts()
            .1
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn std::fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.parts()
            .1
            .source
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let (message, ctx) = self.parts();
        let span = ctx.span?;
        let len = if span.end > span.start {
            span.end - span.start
        } else {
            1
        };
        let label = LabeledSpan::new(Some(message.to_string()), span.start, len);
        Some(Box::new(std::iter::once(label)))
    }
}

/// Converts a file name and its text into a shareable named source.
pub fn to_named_source(name: impl AsRef<str>, text: impl Into<String>) -> SourceArc {
    Arc::new(NamedSource::new(name.as_ref(), text.into()))
}

/// Constructs a TorsoError variant with a formatted message and no context.
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::TorsoError::$variant {
            message: format!($fmt $(, $arg)*),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
    ($variant:ident, $msg:expr) => {
        $crate::TorsoError::$variant {
            message: format!("{}", $msg),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
}

/// Constructs a TorsoError variant pointing at a span of a pre-built named source.
#[macro_export]
macro_rules! err_src {
    // Message, pre-built source, span, help
    ($variant:ident, $msg:expr, $source:expr, $span:expr, $help:expr) => {
        $crate::TorsoError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext {
                source: Some(std::sync::Arc::clone($source)),
                span: Some($span),
                help: Some(format!("{}", $help)),
            },
            source: None,
        }
    };
    // Message, pre-built source, span
    ($variant:ident, $msg:expr, $source:expr, $span:expr) => {
        $crate::TorsoError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext::with_source_and_span(std::sync::Arc::clone($source), $span),
            source: None,
        }
    };
}
