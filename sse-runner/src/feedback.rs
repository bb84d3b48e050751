//! Sampler retry feedback: the verbatim feedback-block and shape-mismatch
//! texts, rendered purely from accumulated attempt state rather than from
//! loop-local variables threaded through the retry loop.
//!
//! Grounded on `original_source/simulation_utils.py::run_formula`'s
//! resampling branch — both strings below are carried over exactly.

use sse_core::{ExpectedType, Value};

/// Accumulated state across sampler retry attempts for one operator run.
#[derive(Debug, Clone, Default)]
pub struct AttemptCtx {
    last_text: Option<String>,
    last_error: Option<String>,
}

impl AttemptCtx {
    /// No attempts have failed yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed attempt's generated text and diagnosed error.
    pub fn record_failure(&mut self, generated_text: impl Into<String>, error: impl Into<String>) {
        self.last_text = Some(generated_text.into());
        self.last_error = Some(error.into());
    }

    /// Whether any attempt has failed yet — once true, it stays true for
    /// the rest of the run, matching `error_occurred`'s one-way latch in
    /// the original.
    pub fn has_failed(&self) -> bool {
        self.last_error.is_some()
    }

    /// The feedback block appended to the prompt on every attempt after
    /// the first failure, reflecting the most recent failure each time.
    pub fn feedback_block(&self) -> String {
        let last_text = self.last_text.as_deref().unwrap_or_default();
        let error_message = self.last_error.as_deref().unwrap_or_default();
        format!(
            "\nFeedback: You already tried (generated text: {last_text}) and got the following error: {error_message}. \nPlease adjust and try again, making sure to closely follow the format of the example from the previous block, do not use apostrophes within strings but skip them or use a * instead, which avoids unterminated string errors in the special setting used here."
        )
    }
}

/// The diagnostic used when a candidate line doesn't start with
/// `default_assignment` at all.
pub fn shape_mismatch_message(default_assignment: &str) -> String {
    format!(
        "The response did not follow the expected pattern, which is a one-line python assignment formula as in the example from the previous block with the same left-hand side ({default_assignment}). Do not otherwise communicate, only generate a one-line python formula inside single quations (no escape characters are required) and if the right-hand side is a string then use double quotes for the string and avoid apostrophes within it (skip them or use * instead)."
    )
}

/// The diagnostic used when a parsed candidate value doesn't match
/// `expected`.
pub fn type_mismatch_message(expected: ExpectedType, got: &Value) -> String {
    format!("Type mismatch: Expected {expected}, got {}.", python_type_name(got))
}

/// Python-style type name for a value, used only in diagnostic text —
/// never for dispatch.
fn python_type_name(value: &Value) -> &'static str {
    match value {
        Value::Int(_) => "int",
        Value::Float(_) => "float",
        Value::Bool(_) => "bool",
        Value::Str(_) => "str",
        Value::Tuple(_) => "tuple",
        Value::List(_) => "list",
        Value::Map(_) => "dict",
        Value::Handle(_) => "handle",
        Value::None => "NoneType",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_block_embeds_last_attempt() {
        let mut ctx = AttemptCtx::new();
        assert!(!ctx.has_failed());
        ctx.record_failure("x = 1", "Type mismatch: Expected str, got int.");
        assert!(ctx.has_failed());
        let block = ctx.feedback_block();
        assert!(block.starts_with("\nFeedback: You already tried (generated text: x = 1)"));
        assert!(block.contains("Type mismatch: Expected str, got int."));
        assert!(block.ends_with("special setting used here."));
    }

    #[test]
    fn shape_mismatch_names_the_default_assignment() {
        let msg = shape_mismatch_message("state['mood']");
        assert!(msg.contains("left-hand side (state['mood'])"));
    }

    #[test]
    fn type_mismatch_uses_python_style_names() {
        let msg = type_mismatch_message(ExpectedType::Str, &Value::Int(3));
        assert_eq!(msg, "Type mismatch: Expected str, got int.");
    }
}
