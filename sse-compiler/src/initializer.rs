//! Callable-initializer detection and `{index}` substitution.
//!
//! Grounded on `original_source/simulation_utils.py::is_callable_expression`,
//! which matches `^[a-zA-Z_][a-zA-Z0-9_]*\s*\(.*\)$` against the whole
//! (stripped) string. Reimplemented without a regex dependency — the
//! pattern is small enough to walk by hand.

/// An initial component value as it arrives from config: either a literal
/// JSON value, or a call-expression string to be evaluated lazily.
#[derive(Debug, Clone)]
pub enum Initializer {
    /// A plain value, used as-is.
    Literal(serde_json::Value),
    /// A call expression, e.g. `"zeros(5)"`, evaluated under the Safe
    /// Evaluator once `{index}` has been substituted.
    Callable(String),
}

/// Parse a raw JSON initializer value into [`Initializer`].
pub fn parse_initializer(raw: &serde_json::Value) -> Initializer {
    match raw {
        serde_json::Value::String(s) if is_callable_expression(s) => {
            Initializer::Callable(s.trim().to_string())
        }
        other => Initializer::Literal(other.clone()),
    }
}

/// Whether `value` looks like `identifier(...)` once leading/trailing
/// whitespace is stripped.
pub fn is_callable_expression(value: &str) -> bool {
    let trimmed = value.trim();
    let mut chars = trimmed.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    let mut rest = chars.as_str();
    let ident_end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    rest = &rest[ident_end..];
    rest.starts_with('(') && trimmed.ends_with(')')
}

/// Replace every occurrence of the literal token `{index}` with `index`'s
/// decimal rendering.
pub fn substitute_index(expr: &str, index: i64) -> String {
    expr.replace("{index}", &index.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_simple_call() {
        assert!(is_callable_expression("zeros(5)"));
        assert!(is_callable_expression("  zeros(5)  "));
    }

    #[test]
    fn rejects_non_calls() {
        assert!(!is_callable_expression("5"));
        assert!(!is_callable_expression("hello"));
        assert!(!is_callable_expression("\"a string\""));
    }

    #[test]
    fn rejects_call_with_trailing_garbage() {
        assert!(!is_callable_expression("zeros(5) + 1"));
    }

    #[test]
    fn substitutes_index_token() {
        assert_eq!(substitute_index("agent_{index}", 3), "agent_3");
    }
}
