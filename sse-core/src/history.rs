//! The append-only history record.

use crate::state::State;

/// `{state snapshot, output lines, operator id}`, appended after each
/// operator runs. The snapshot is a defensive copy — later mutations to
/// the live state never alter a `HistoryStep` already yielded.
#[derive(Debug, Clone)]
pub struct HistoryStep {
    /// The state immediately after this operator ran, defensively copied.
    pub state: State,
    /// The formatted assignment line(s) this operator produced, optionally
    /// suffixed with ` # sampled` or ` # fallback`.
    pub output: Vec<String>,
    /// The id of the operator that produced this step.
    pub operator_id: String,
}

impl HistoryStep {
    /// Build a new history step.
    pub fn new(state: State, output: Vec<String>, operator_id: impl Into<String>) -> Self {
        Self {
            state,
            output,
            operator_id: operator_id.into(),
        }
    }
}
