//! The declarative context builder.

use crate::store::HistoryStore;
use sse_core::{State, Value};

/// Prepended verbatim whenever the assembled context is truncated, so a
/// sampled completion is never silently fed a mid-turn fragment without
/// warning.
pub const TRUNCATION_NOTICE: &str =
    "[Note: The following history has been truncated due to length constraints and can, due to this, start mid-turn.]\n\n";

/// A declarative query: a set of `(key, expression)` pairs. Each expression
/// is resolved against the current [`State`] at build time — a bare name
/// like `task_name` expands to `state['task_name']`, letting a config author
/// write queries without hardcoding literal values that drift from state.
#[derive(Debug, Clone, Default)]
pub struct Query {
    state_filters: Vec<(String, String)>,
    literal_filters: Vec<(String, Value)>,
    expanding_filters: Vec<(String, String)>,
}

impl Query {
    /// An empty query — matches every history step.
    pub fn new() -> Self {
        Self {
            state_filters: Vec::new(),
            literal_filters: Vec::new(),
            expanding_filters: Vec::new(),
        }
    }

    /// Add a `(state_key, state_key)` filter: match steps whose state at
    /// `state_key` equals the current state's value at `state_key`.
    pub fn filter_by_state_key(mut self, state_key: impl Into<String>) -> Self {
        let key = state_key.into();
        self.state_filters.push((key.clone(), key));
        self
    }

    /// Add a `(history_key, literal)` filter against a fixed value.
    pub fn filter_literal(mut self, history_key: impl Into<String>, value: Value) -> Self {
        self.literal_filters.push((history_key.into(), value));
        self
    }

    /// Add a `(history_key, value_or_state_key)` filter: if
    /// `value_or_state_key` names a key present in the live state at build
    /// time, match against that key's current value; otherwise treat
    /// `value_or_state_key` itself as a literal string. Mirrors
    /// `original_source/simulation_utils.py::read_context`'s per-query-value
    /// expansion (`current_state.get(v, v)`), used by the Runner to build
    /// an operator's declarative `query` map without hardcoding whether each
    /// entry names a state key or is a bare literal.
    pub fn filter_expanding(mut self, history_key: impl Into<String>, value_or_state_key: impl Into<String>) -> Self {
        self.expanding_filters.push((history_key.into(), value_or_state_key.into()));
        self
    }

    fn resolve(&self, state: &State) -> Vec<(String, Value)> {
        let mut out: Vec<(String, Value)> = self.literal_filters.clone();
        out.extend(
            self.state_filters
                .iter()
                .filter_map(|(history_key, state_key)| {
                    state.get(state_key).map(|v| (history_key.clone(), v))
                }),
        );
        out.extend(self.expanding_filters.iter().map(|(history_key, fallback)| {
            let value = state.get(fallback).unwrap_or_else(|| Value::Str(fallback.clone()));
            (history_key.clone(), value)
        }));
        out
    }
}

/// Builds a length-bounded context string from history plus live state.
#[derive(Debug, Default)]
pub struct ContextBuilder;

impl ContextBuilder {
    /// Assemble context: query the history, join matching output lines,
    /// and truncate to the last `max_chars` characters if needed. Returns
    /// `(context, was_truncated)`.
    pub fn build(history: &HistoryStore, query: &Query, state: &State, max_chars: usize) -> (String, bool) {
        let filters = query.resolve(state);
        let filter_refs: Vec<(&str, Value)> =
            filters.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        let raw = history.query(&filter_refs);
        truncate_tail(&raw, max_chars)
    }
}

/// Truncate to the last `max_chars` characters (char-boundary safe),
/// prepending [`TRUNCATION_NOTICE`] when truncation actually occurred.
fn truncate_tail(text: &str, max_chars: usize) -> (String, bool) {
    let char_count = text.chars().count();
    if char_count <= max_chars {
        return (text.to_string(), false);
    }
    let skip = char_count - max_chars;
    let tail: String = text.chars().skip(skip).collect();
    (format!("{TRUNCATION_NOTICE}{tail}"), true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sse_core::HistoryStep;

    #[test]
    fn no_truncation_when_within_budget() {
        let (out, truncated) = truncate_tail("short text", 100);
        assert_eq!(out, "short text");
        assert!(!truncated);
    }

    #[test]
    fn truncation_prepends_notice_and_keeps_tail() {
        let (out, truncated) = truncate_tail("0123456789", 4);
        assert!(truncated);
        assert!(out.starts_with(TRUNCATION_NOTICE));
        assert!(out.ends_with("6789"));
    }

    #[test]
    fn query_filters_by_live_state_value() {
        let mut history = HistoryStore::new();
        for (id, val) in [("a", "alpha"), ("b", "beta")] {
            let step_state = State::new();
            step_state.set("task_name", Value::Str(val.into()));
            history.push(HistoryStep::new(step_state, vec![format!("out-{id}")], id));
        }
        let live = State::new();
        live.set("task_name", Value::Str("alpha".into()));
        let query = Query::new().filter_by_state_key("task_name");
        let (ctx, truncated) = ContextBuilder::build(&history, &query, &live, 10_000);
        assert!(!truncated);
        assert_eq!(ctx, "out-a\n");
    }

    #[test]
    fn empty_query_is_unfiltered() {
        let mut history = HistoryStore::new();
        history.push(HistoryStep::new(State::new(), vec!["x".into()], "op"));
        let live = State::new();
        let (ctx, _) = ContextBuilder::build(&history, &Query::new(), &live, 10_000);
        assert_eq!(ctx, "x\n");
    }

    #[test]
    fn expanding_filter_falls_back_to_literal_when_not_a_state_key() {
        let mut history = HistoryStore::new();
        for (id, tag) in [("a", "Yes"), ("b", "No")] {
            let step_state = State::new();
            step_state.set("for_summary", Value::Str(tag.into()));
            history.push(HistoryStep::new(step_state, vec![format!("out-{id}")], id));
        }
        let live = State::new();
        let query = Query::new().filter_expanding("for_summary", "Yes");
        let (ctx, _) = ContextBuilder::build(&history, &query, &live, 10_000);
        assert_eq!(ctx, "out-a\n");
    }

    #[test]
    fn expanding_filter_prefers_live_state_value_when_present() {
        let mut history = HistoryStore::new();
        for (id, tag) in [("a", "alpha"), ("b", "beta")] {
            let step_state = State::new();
            step_state.set("task_name", Value::Str(tag.into()));
            history.push(HistoryStep::new(step_state, vec![format!("out-{id}")], id));
        }
        let live = State::new();
        live.set("task_name", Value::Str("beta".into()));
        let query = Query::new().filter_expanding("task_name", "task_name");
        let (ctx, _) = ContextBuilder::build(&history, &query, &live, 10_000);
        assert_eq!(ctx, "out-b\n");
    }
}
