//! Evaluator error taxonomy — the `EvalError` subkinds from the error
//! handling design: `UnsupportedSyntax`, `NameNotFound`, `BadOperand`,
//! `Subscript`, `Call`.

use thiserror::Error;

/// An expression failed to parse or evaluate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EvalError {
    /// A node kind with no visitor (mirrors `ast.NodeVisitor.generic_visit`
    /// raising on anything unhandled), or a parse failure.
    #[error("unsupported syntax in `{expr}`: {detail}")]
    UnsupportedSyntax {
        /// The full expression text being parsed/evaluated.
        expr: String,
        /// What specifically was unsupported.
        detail: String,
    },

    /// A name was not found in the name table or function registry.
    #[error("name not found: {0}")]
    NameNotFound(String),

    /// An operator was applied to operand types it doesn't support
    /// (e.g. string minus string).
    #[error("bad operand for {op}: {detail}")]
    BadOperand {
        /// The operator text (`+`, `and`, `not`, ...).
        op: String,
        /// Human-readable explanation.
        detail: String,
    },

    /// A subscript or slice operation failed (index out of range, wrong
    /// key type, indexing into a non-indexable value).
    #[error("subscript error: {0}")]
    Subscript(String),

    /// A call failed: the callee wasn't callable, wasn't registered, or
    /// raised during its own execution.
    #[error("call error: {0}")]
    Call(String),

    /// Catch-all for failures that don't fit a named variant.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
