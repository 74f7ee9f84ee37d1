pub use crate::diagnostics::{to_named_source, ErrorContext, ErrorType, SourceArc, TorsoError};
pub use crate::syntax::{Instruction, Span};

pub mod binding;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod executor;
pub mod interrupt;
pub mod logging;
pub mod report;
pub mod runner;
pub mod script;
pub mod step;
pub mod syntax;
