//! Non-fatal diagnostics.
//!
//! Scripts can never abort the host, so there is no runtime error type:
//! every irregularity degrades to a default value, a skipped construct, or
//! a no-op. [`Diagnostic`] records what was recovered from so host tooling
//! can display it; execution itself never reads these back.

use serde::Serialize;
use thiserror::Error;

/// Something the lexer, parser, or evaluator recovered from.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum Diagnostic {
    #[error("line {line}: unexpected character '{ch}'")]
    UnexpectedChar { ch: char, line: usize },

    #[error("line {line}: unterminated block comment")]
    UnterminatedComment { line: usize },

    #[error("line {line}: malformed number '{text}'")]
    MalformedNumber { text: String, line: usize },

    #[error("line {line}: expected {expected}")]
    Expected { expected: &'static str, line: usize },

    #[error("line {line}: skipped unrecognized {what}")]
    Skipped { what: &'static str, line: usize },

    #[error("read of undeclared variable '{name}'")]
    UndeclaredVariable { name: String },

    #[error("call to unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("expression is not addressable")]
    NotAddressable,

    #[error("push/pop target is not a stack")]
    NotAStack,

    #[error("call depth limit reached calling '{name}'")]
    CallDepthExceeded { name: String },
}
