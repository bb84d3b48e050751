#![deny(missing_docs)]
//! Safe, sandboxed AST-walking evaluator for the closed Python-like
//! expression subset used by operator formulas, `use_lm` predicates, and
//! conditional `next` expressions.
//!
//! No statements, no assignment, no imports, no exceptions, no side
//! effects beyond reading the injected name table and calling into the
//! [`FunctionRegistry`]. See [`Evaluator::eval`].

mod ast;
mod error;
mod eval;
mod lexer;
mod parser;
mod registry;

pub use ast::{BinOp, BoolOpKind, CmpOp, Expr, Subscript, Target, UnOp};
pub use error::EvalError;
pub use eval::Evaluator;
pub use parser::parse;
pub use registry::{EvalHost, FunctionRegistry, NativeFn};

#[cfg(test)]
mod tests {
    use super::*;
    use sse_core::{State, Value};

    fn eval(expr: &str, state: &State) -> Result<Value, EvalError> {
        Evaluator::new(state.clone(), FunctionRegistry::with_seed_set(), 42).eval(expr)
    }

    #[test]
    fn arithmetic_and_precedence() {
        let state = State::new();
        assert_eq!(eval("1 + 2 * 3", &state).unwrap(), Value::Int(7));
        assert_eq!(eval("(1 + 2) * 3", &state).unwrap(), Value::Int(9));
        assert_eq!(eval("2 ** 10", &state).unwrap(), Value::Int(1024));
        assert_eq!(eval("7 // 2", &state).unwrap(), Value::Int(3));
    }

    #[test]
    fn chained_comparison_short_circuits() {
        let state = State::new();
        assert_eq!(eval("1 < 2 < 3", &state).unwrap(), Value::Bool(true));
        assert_eq!(eval("1 < 2 < 0", &state).unwrap(), Value::Bool(false));
        assert_eq!(eval("3 < 2 < 1", &state).unwrap(), Value::Bool(false));
    }

    #[test]
    fn bool_op_returns_plain_bool() {
        let state = State::new();
        assert_eq!(eval("1 and 2", &state).unwrap(), Value::Bool(true));
        assert_eq!(eval("0 and 2", &state).unwrap(), Value::Bool(false));
        assert_eq!(eval("0 or 5", &state).unwrap(), Value::Bool(true));
    }

    #[test]
    fn ternary_picks_branch() {
        let state = State::new();
        assert_eq!(eval("1 if True else 2", &state).unwrap(), Value::Int(1));
        assert_eq!(eval("1 if False else 2", &state).unwrap(), Value::Int(2));
    }

    #[test]
    fn name_lookup_and_state_view() {
        let state = State::new();
        state.set("x", Value::Int(5));
        assert_eq!(eval("x + 1", &state).unwrap(), Value::Int(6));
        assert_eq!(eval("state['x']", &state).unwrap(), Value::Int(5));
    }

    #[test]
    fn unregistered_call_is_an_error() {
        let state = State::new();
        assert!(eval("not_a_real_fn(1)", &state).is_err());
    }

    #[test]
    fn list_comprehension_with_filter_and_unpack() {
        let state = State::new();
        state.set(
            "pairs",
            Value::List(vec![
                Value::Tuple(vec![Value::Int(1), Value::Int(2)]),
                Value::Tuple(vec![Value::Int(3), Value::Int(4)]),
            ]),
        );
        let result = eval("[a + b for (a, b) in pairs if a > 1]", &state).unwrap();
        assert_eq!(result, Value::List(vec![Value::Int(7)]));
    }

    #[test]
    fn comprehension_scope_does_not_leak() {
        let state = State::new();
        state.set("xs", Value::List(vec![Value::Int(1), Value::Int(2)]));
        eval("[x for x in xs]", &state).unwrap();
        assert!(eval("x", &state).is_err());
    }

    #[test]
    fn registered_function_call() {
        let state = State::new();
        assert_eq!(eval("sqrt(16.0)", &state).unwrap(), Value::Float(4.0));
        assert_eq!(eval("max(1, 5, 3)", &state).unwrap(), Value::Int(5));
    }

    #[test]
    fn unsupported_syntax_rejected() {
        let state = State::new();
        assert!(matches!(
            eval("x = 1", &state),
            Err(EvalError::UnsupportedSyntax { .. })
        ));
    }

    #[test]
    fn deterministic_with_same_seed() {
        let state = State::new();
        let e1 = Evaluator::new(state.clone(), FunctionRegistry::with_seed_set(), 7);
        let e2 = Evaluator::new(state.clone(), FunctionRegistry::with_seed_set(), 7);
        assert_eq!(e1.eval("random()").unwrap(), e2.eval("random()").unwrap());
    }
}
