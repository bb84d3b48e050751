//! The Step Driver: per-step metadata propagation, Runner invocation, and
//! `next`-id resolution.

use crate::cancel::CancellationToken;
use crate::error::DriverError;
use sse_core::{HistoryStep, Next, Operator, State, Value};
use sse_eval::{Evaluator, FunctionRegistry};
use sse_history::HistoryStore;
use sse_runner::Runner;
use std::collections::HashMap;

/// Seed for the evaluator the driver uses to resolve conditional `next`
/// expressions. Distinct from the Runner's own seed space — `next`
/// expressions in every config this engine ships with are pure
/// comparisons with no `random`/`randint` calls, but a fixed seed keeps
/// this reproducible if one ever does.
const NEXT_EVAL_SEED: u64 = 0;

/// Drives a compiled program one step at a time: look up the current
/// operator, copy its metadata into state, run it, snapshot, append to
/// history, and resolve the next operator id.
///
/// Unbounded by design (spec's "the driver itself is unbounded") — callers
/// impose their own stop condition, typically on `world_time`.
pub struct StepDriver {
    operators: HashMap<String, Operator>,
    state: State,
    runner: Runner,
    history: HistoryStore,
    registry: FunctionRegistry,
    current_id: String,
}

impl StepDriver {
    /// Build a driver over a compiled operator list and initial state,
    /// starting at `first_operator_id`.
    pub fn new(
        operators: Vec<Operator>,
        state: State,
        runner: Runner,
        registry: FunctionRegistry,
        first_operator_id: impl Into<String>,
    ) -> Result<Self, DriverError> {
        let first_operator_id = first_operator_id.into();
        let operators: HashMap<String, Operator> =
            operators.into_iter().map(|op| (op.id.clone(), op)).collect();
        if !operators.contains_key(&first_operator_id) {
            return Err(DriverError::UnknownOperator(first_operator_id));
        }
        Ok(Self {
            operators,
            state,
            runner,
            history: HistoryStore::new(),
            registry,
            current_id: first_operator_id,
        })
    }

    /// The live, mutable world state.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// The append-only history accumulated so far.
    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// The operator id that the next call to [`Self::step`] will run.
    pub fn current_operator_id(&self) -> &str {
        &self.current_id
    }

    /// Run one step: look up the current operator, copy its metadata into
    /// state, invoke the Runner, snapshot state into a new
    /// [`HistoryStep`], append it, and advance to the next operator id.
    ///
    /// Returns the step just appended.
    ///
    /// `Err` returned before the current operator is looked up
    /// (cancellation requested) leaves `state` and `history` untouched.
    /// Past that point there is no rollback: the operator's metadata is
    /// copied into `state` before the Runner even starts, so a sampler
    /// surrender (`Err` from the Runner) still leaves that metadata copy
    /// in place, and a failure to resolve `next` once the Runner has
    /// succeeded (a conditional `next` that doesn't evaluate to a string,
    /// fails to evaluate, or names an unknown operator) leaves this step's
    /// mutated `state` and its pushed `HistoryStep` in place too — only
    /// `current_operator_id` fails to advance.
    pub async fn step(&mut self, cancel: &CancellationToken) -> Result<&HistoryStep, DriverError> {
        if cancel.is_cancelled() {
            tracing::warn!(operator_id = %self.current_id, "step cancelled before start");
            return Err(DriverError::CancelRequested);
        }

        let operator = self
            .operators
            .get(&self.current_id)
            .cloned()
            .ok_or_else(|| DriverError::UnknownOperator(self.current_id.clone()))?;

        let world_time = self.state.get("world_time");
        let _span =
            tracing::debug_span!("driver_step", operator_id = %operator.id, ?world_time).entered();

        for (key, value) in &operator.metadata {
            self.state.set(key.clone(), value.clone());
        }

        let output = self.runner.run(&operator, &self.state, &self.history).await.map_err(|e| {
            tracing::warn!(operator_id = %operator.id, error = %e, "runner ended step early");
            e
        })?;

        let snapshot = self.state.snapshot();
        self.history.push(HistoryStep::new(snapshot, output, operator.id.clone()));

        self.current_id = self.resolve_next(&operator)?;

        Ok(self.history.steps().last().expect("step was just pushed"))
    }

    fn resolve_next(&self, operator: &Operator) -> Result<String, DriverError> {
        let next_id = match &operator.next {
            Next::Static(id) => id.clone(),
            Next::Conditional(expr) => {
                let evaluator = Evaluator::new(self.state.clone(), self.registry.clone(), NEXT_EVAL_SEED);
                match evaluator.eval(expr) {
                    Ok(Value::Str(id)) => id,
                    Ok(other) => {
                        tracing::warn!(expr, value = %other.render(), "conditional next did not evaluate to a string");
                        return Err(DriverError::UnknownOperator(other.render()));
                    }
                    Err(e) => {
                        tracing::warn!(expr, error = %e, "conditional next failed to evaluate");
                        return Err(DriverError::UnknownOperator(expr.clone()));
                    }
                }
            }
        };
        if !self.operators.contains_key(&next_id) {
            return Err(DriverError::UnknownOperator(next_id));
        }
        Ok(next_id)
    }
}
