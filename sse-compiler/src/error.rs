//! Compilation errors.

use thiserror::Error;

/// Structural problems in a configuration document, or failures raised
/// while materialising it into operators and initial state.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A `systems_definitions` entry (or a variable's initializer map)
    /// named a variable with no corresponding entry in `variables`.
    #[error("variable `{0}` has no entry in `variables`")]
    UnknownVariable(String),

    /// Two operators ended up with the same id after compilation.
    #[error("duplicate operator id `{0}` after compilation")]
    DuplicateOperatorId(String),

    /// A callable initializer string could not be parsed or evaluated.
    #[error("failed to evaluate initializer `{expr}`: {detail}")]
    BadInitializer {
        /// The initializer expression that failed.
        expr: String,
        /// What went wrong.
        detail: String,
    },

    /// A `next` (or implicit ring wiring) referenced an operator id that
    /// does not exist among the compiled operators.
    #[error("operator `{from}` has `next` referencing unknown operator `{to}`")]
    DanglingNext {
        /// The operator whose `next` is dangling.
        from: String,
        /// The missing target id.
        to: String,
    },

    /// Catch-all for errors that don't fit the named variants.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
