//! Operator and fall-through ("next") types.

use crate::value::{Map, Value};

/// Whether an operator samples from the LM or evaluates directly.
#[derive(Debug, Clone)]
pub enum UseLm {
    /// A fixed, compile-time known setting.
    Bool(bool),
    /// An expression re-evaluated against state every time the operator
    /// runs (e.g. `"world_time > 10"`).
    Expr(String),
}

impl Default for UseLm {
    fn default() -> Self {
        UseLm::Bool(false)
    }
}

/// The static-or-conditional successor relation between operators.
#[derive(Debug, Clone)]
pub enum Next {
    /// Always advance to this operator id.
    Static(String),
    /// Evaluate this expression (of the form `A if cond else B`) against
    /// the current state to determine the next operator id.
    Conditional(String),
}

impl Next {
    /// Parse a raw `next` string into `Static` or `Conditional`.
    ///
    /// Detection mirrors the original implementation's substring check:
    /// `next` is conditional iff the padded string `" {next} "` contains
    /// the token `" if "`. This is a literal substring test, not a parse,
    /// so an identifier that merely contains "if" (e.g. `operator_if_check`)
    /// is never misdetected as conditional.
    pub fn parse(raw: &str) -> Next {
        let padded = format!(" {raw} ");
        if padded.contains(" if ") {
            Next::Conditional(raw.trim().to_string())
        } else {
            Next::Static(raw.trim().to_string())
        }
    }
}

/// A named, idempotent step that reads world state and emits one
/// assignment line plus an optional state mutation.
#[derive(Debug, Clone)]
pub struct Operator {
    /// Unique identifier, conventionally `operator_<n>_<entity>_<component>`.
    pub id: String,
    /// A single assignment `LHS = RHS`, or the literal `"blank"`.
    pub formula: String,
    /// Declarative history filter used when this operator samples.
    /// Values may themselves name state keys, expanded at build time.
    pub query: Option<Map>,
    /// Whether this operator samples from the LM.
    pub use_lm: UseLm,
    /// The successor operator.
    pub next: Next,
    /// Arbitrary propagated metadata: `visibility`, `for_summary`,
    /// `experience`, `prompt`, and any other declared tags. Copied into
    /// state (minus `id`/`formula`/`next`) before the operator runs so
    /// that downstream queries can observe them.
    pub metadata: Map,
}

impl Operator {
    /// Resolve `op.prompt` if present as a metadata override, else `None`
    /// (callers fall back to `state.prompt`).
    pub fn prompt_override(&self) -> Option<&Value> {
        self.metadata.get("prompt")
    }
}
