//! Error taxonomy for the engine.
//!
//! Mirrors the ErrorKinds in the design doc: `CompileError` fails template
//! registration at load time, `EvaluationError` is recovered locally in
//! lenient mode and only surfaces in strict mode, `EngineError` is the
//! top-level failure type returned from the public API.

use thiserror::Error;

/// Failure while compiling source text into a [`crate::construct::CompiledTemplate`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("unmatched {{{{ end }}}} at line {line}, column {col}")]
    UnmatchedEnd { line: usize, col: usize },

    #[error("unclosed {directive} opened at line {line}, column {col}")]
    UnclosedDirective {
        directive: &'static str,
        line: usize,
        col: usize,
    },

    #[error("unknown directive `{name}` at line {line}, column {col}")]
    UnknownDirective {
        name: String,
        line: usize,
        col: usize,
    },

    #[error("malformed path `{path}` at line {line}, column {col}")]
    MalformedPath {
        path: String,
        line: usize,
        col: usize,
    },

    #[error("empty template name at line {line}, column {col}")]
    EmptyTemplateName { line: usize, col: usize },
}

/// Failure while evaluating a compiled expression against a data context.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvaluationError {
    #[error("path not found: {path}")]
    PathNotFound { path: String },

    #[error("path `{path}` did not resolve to a {expected}")]
    TypeMismatch { path: String, expected: &'static str },

    #[error("template invocation recursion limit exceeded at `{path}`")]
    RecursionLimit { path: String },

    #[error("template `{name}` is not registered")]
    UnknownTemplate { name: String },
}

/// Top-level engine error, returned from the public render/session API.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("internal invariant violated: {0}")]
    Invariant(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("outbound queue exhausted")]
    ResourceExhausted,
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
