//! The append-only history store.

use sse_core::HistoryStep;

/// Append-only log of `(state snapshot, output lines, operator id)`
/// triples. Owned exclusively by the Step Driver — no other writer
/// exists, and no step is ever mutated after it is appended.
#[derive(Debug, Default)]
pub struct HistoryStore {
    steps: Vec<HistoryStep>,
}

impl HistoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a step. The step's `state` must already be a defensive copy
    /// — this store never clones on your behalf.
    pub fn push(&mut self, step: HistoryStep) {
        self.steps.push(step);
    }

    /// All steps in append order.
    pub fn steps(&self) -> &[HistoryStep] {
        &self.steps
    }

    /// Number of steps recorded.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no steps have been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// `queryHistory(history, **filters) -> string`: a newline-joined
    /// concatenation of output lines from steps whose state matches every
    /// `(key, value)` filter, ending with exactly one trailing newline.
    /// Returns the empty string for an empty history or no matches.
    pub fn query(&self, filters: &[(&str, sse_core::Value)]) -> String {
        let mut lines = Vec::new();
        for step in &self.steps {
            let matches = filters.iter().all(|(k, v)| match step.state.get(k) {
                Some(actual) => match v {
                    sse_core::Value::List(candidates) => candidates.contains(&actual),
                    other => &actual == other,
                },
                None => false,
            });
            if matches {
                lines.extend(step.output.iter().cloned());
            }
        }
        if lines.is_empty() {
            return String::new();
        }
        let joined = lines.join("\n");
        format!("{}\n", joined.trim_end_matches('\n'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sse_core::{State, Value};

    #[test]
    fn empty_history_queries_to_empty_string() {
        let store = HistoryStore::new();
        assert_eq!(store.query(&[("all", Value::Bool(true))]), "");
    }

    #[test]
    fn query_all_concatenates_every_output_line() {
        let mut store = HistoryStore::new();
        for i in 0..3 {
            let state = State::new();
            store.push(HistoryStep::new(state, vec![format!("line{i}")], format!("op{i}")));
        }
        assert_eq!(store.query(&[]), "line0\nline1\nline2\n");
    }

    #[test]
    fn query_filters_by_tag() {
        let mut store = HistoryStore::new();
        for i in 0..4 {
            let state = State::new();
            state.set("for_summary", Value::Str(if i % 2 == 0 { "Yes" } else { "No" }.into()));
            store.push(HistoryStep::new(state, vec![format!("line{i}")], format!("op{i}")));
        }
        let result = store.query(&[("for_summary", Value::Str("Yes".into()))]);
        assert_eq!(result, "line0\nline2\n");
    }
}
