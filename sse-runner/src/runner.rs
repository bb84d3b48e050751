//! The Operator Runner: direct evaluation, and the LM sampling retry loop.

use crate::assign::{assignment_path, split_assignment};
use crate::error::RunnerError;
use crate::feedback::{shape_mismatch_message, type_mismatch_message, AttemptCtx};
use crate::format::{render_assignment, render_exhaustion};
use sse_core::{ExpectedType, Operator, State, UseLm, Value};
use sse_eval::{Evaluator, FunctionRegistry};
use sse_history::{ContextBuilder, HistoryStore, Query};
use sse_sampler::{SampleMode, SampleRequest, Sampler};
use std::cell::Cell;
use std::rc::Rc;

/// Default retry budget, matching `simulation_stream_generator`'s
/// `max_attempts=3` default.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

const DEFAULT_MAX_CONTEXT_LENGTH: i64 = 1_000_000;

/// Executes a single [`Operator`] against [`State`], either by direct
/// evaluation or by driving the sampler retry loop, and returns the output
/// line(s) to append to the current history step.
///
/// Holds a single [`FunctionRegistry`] and a base RNG seed; each internal
/// [`Evaluator`] it constructs derives its own seed from an internal
/// counter so that distinct expressions within (and across) steps draw
/// distinct `random()`/`randint()` values while the whole run stays
/// reproducible given the same base seed and call sequence.
pub struct Runner {
    sampler: Rc<dyn Sampler>,
    registry: FunctionRegistry,
    base_seed: u64,
    call_counter: Cell<u64>,
    max_attempts: usize,
    fallback_marker: bool,
    model: String,
}

impl Runner {
    /// Build a runner around `sampler`, evaluating with `registry` and
    /// sampling against `model`.
    pub fn new(sampler: Rc<dyn Sampler>, registry: FunctionRegistry, seed: u64, model: impl Into<String>) -> Self {
        Self {
            sampler,
            registry,
            base_seed: seed,
            call_counter: Cell::new(0),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            fallback_marker: false,
            model: model.into(),
        }
    }

    /// Override the retry budget (default [`DEFAULT_MAX_ATTEMPTS`]).
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// When `true`, the exhaustion-branch suffix becomes ` # fallback`
    /// instead of the default ` # sampled`. See `SPEC_FULL.md`'s resolved
    /// sampler-exhaustion-marker question.
    pub fn with_fallback_marker(mut self, on: bool) -> Self {
        self.fallback_marker = on;
        self
    }

    fn marker(&self) -> &'static str {
        if self.fallback_marker {
            "# fallback"
        } else {
            "# sampled"
        }
    }

    fn next_seed(&self) -> u64 {
        let n = self.call_counter.get();
        self.call_counter.set(n.wrapping_add(1));
        self.base_seed.wrapping_add(n)
    }

    fn evaluator(&self, state: &State) -> Evaluator {
        Evaluator::new(state.clone(), self.registry.clone(), self.next_seed())
    }

    /// Run `op` against `state`, returning the output line(s) produced.
    /// Never returns an empty output vector. `Err` only when the sampler
    /// adapter surrenders a transport failure — the step should be treated
    /// as ended early, with `state` left exactly as it was found.
    pub async fn run(&self, op: &Operator, state: &State, history: &HistoryStore) -> Result<Vec<String>, RunnerError> {
        let formula = op.formula.trim();
        let use_lm = self.resolve_use_lm(op, state);

        if !use_lm {
            if formula == "blank" {
                return Ok(vec!["# \n".to_string()]);
            }
            return Ok(vec![self.run_direct(formula, state)]);
        }

        self.run_sampled(op, formula, state, history).await
    }

    fn resolve_use_lm(&self, op: &Operator, state: &State) -> bool {
        match &op.use_lm {
            UseLm::Bool(b) => *b,
            UseLm::Expr(expr) => {
                let evaluator = self.evaluator(state);
                match evaluator.eval(expr) {
                    Ok(Value::Bool(b)) => b,
                    _ => false,
                }
            }
        }
    }

    /// Non-LM branch: evaluate the RHS once, assign, and render a single
    /// output line. Never fails outward — an evaluation or assignment
    /// failure becomes a comment line rather than an empty output, so the
    /// "never returns with empty output" invariant holds even where the
    /// grounding source would have silently swallowed the exception.
    fn run_direct(&self, formula: &str, state: &State) -> String {
        let Some((lhs, rhs)) = split_assignment(formula) else {
            tracing::warn!(formula, "direct-eval formula has no `=`");
            return format!("# malformed formula: {formula}");
        };
        let evaluator = self.evaluator(state);
        let value = match evaluator.eval(&rhs) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(%lhs, error = %e, "direct-eval RHS failed");
                return format!("# {lhs} failed to evaluate: {e}");
            }
        };
        if let Err(e) = state.assign_path(&assignment_path(&lhs), value.clone()) {
            tracing::warn!(%lhs, error = %e, "direct-eval assignment failed");
            return format!("# {lhs} failed to assign: {e}");
        }
        render_assignment(&lhs, &value, None)
    }

    /// LM branch: resolve the expected type and context once, then retry
    /// sampling up to `max_attempts`, accumulating feedback into the prompt
    /// on every attempt after the first failure.
    async fn run_sampled(
        &self,
        op: &Operator,
        formula: &str,
        state: &State,
        history: &HistoryStore,
    ) -> Result<Vec<String>, RunnerError> {
        let (default_assignment, rhs_default) = match split_assignment(formula) {
            Some((lhs, rhs)) => (lhs, Some(rhs)),
            None => (formula.to_string(), None),
        };

        let expected_type = match &rhs_default {
            Some(rhs) => {
                let evaluator = self.evaluator(state);
                match evaluator.eval(rhs) {
                    Ok(v) => v.expected_tag(),
                    Err(_) => ExpectedType::Str,
                }
            }
            None => ExpectedType::Str,
        };

        let context = self.build_context(op, state, history);
        let mut prompt = self.resolve_prompt(op, state);
        let marker = self.marker();

        let mut attempts = 0usize;
        let mut ctx = AttemptCtx::new();

        while attempts < self.max_attempts {
            if ctx.has_failed() {
                prompt.push_str(&ctx.feedback_block());
            }

            let sample_mode = match state.get("sample_mode") {
                Some(Value::Str(s)) if s == "rhs_only" => SampleMode::RhsOnly,
                _ => SampleMode::Full,
            };
            let current_value = state.get(&default_assignment).unwrap_or_else(|| Value::Str("Unknown".into()));

            let request = match sample_mode {
                SampleMode::Full => SampleRequest::new(
                    prompt.clone(),
                    context.clone(),
                    default_assignment.clone(),
                    current_value,
                    SampleMode::Full,
                    self.model.clone(),
                ),
                SampleMode::RhsOnly => SampleRequest::new(
                    prompt.clone(),
                    format!("{context}{default_assignment} = "),
                    default_assignment.clone(),
                    current_value,
                    SampleMode::RhsOnly,
                    self.model.clone(),
                ),
            };

            let reply = self.sampler.sample(&request).await?;
            let candidate = match sample_mode {
                SampleMode::Full => reply,
                SampleMode::RhsOnly => format!("{default_assignment} = {reply}"),
            };

            if !candidate.starts_with(&default_assignment) {
                let error_message = shape_mismatch_message(&default_assignment);
                tracing::debug!(attempt = attempts, "sampled candidate did not match expected shape");
                ctx.record_failure(candidate, error_message);
                attempts += 1;
                continue;
            }

            let rhs_text = candidate.splitn(2, '=').nth(1).unwrap_or_default().trim();
            let evaluator = self.evaluator(state);
            let value = match evaluator.eval(rhs_text) {
                Ok(v) => v,
                Err(e) => {
                    let error_message = format!("Error evaluating sampled formula. Reason: {e}. ");
                    tracing::debug!(attempt = attempts, error = %e, "sampled candidate failed to evaluate");
                    ctx.record_failure(candidate, error_message);
                    attempts += 1;
                    continue;
                }
            };

            if value.matches(expected_type) {
                state.set(default_assignment.clone(), value.clone());
                return Ok(vec![render_assignment(&default_assignment, &value, Some(marker))]);
            }

            let error_message = type_mismatch_message(expected_type, &value);
            tracing::debug!(attempt = attempts, "sampled candidate failed the type check");
            ctx.record_failure(candidate, error_message);
            attempts += 1;
        }

        tracing::warn!(%default_assignment, attempts, "sampler exhausted retry budget");
        let value = state.get(&default_assignment).unwrap_or_else(|| Value::Str("Unknown".into()));
        Ok(vec![render_exhaustion(&default_assignment, &value, marker)])
    }

    fn resolve_prompt(&self, op: &Operator, state: &State) -> String {
        match op.prompt_override() {
            Some(Value::Str(key)) => match state.get(key) {
                Some(v) => display_string(&v),
                None => key.clone(),
            },
            Some(other) => display_string(other),
            None => state.get("prompt").map(|v| display_string(&v)).unwrap_or_default(),
        }
    }

    /// Build the sampling context: empty when the operator has no `query`,
    /// otherwise the truncated, query-filtered history per the Context
    /// Builder. Each `query` entry is expanded exactly like
    /// `read_context`: a string value that names a live state key resolves
    /// to that key's current value, else it's used as a literal.
    fn build_context(&self, op: &Operator, state: &State, history: &HistoryStore) -> String {
        let Some(query_map) = &op.query else {
            return String::new();
        };
        let mut query = Query::new();
        for (key, value) in query_map {
            match value {
                Value::Str(s) => query = query.filter_expanding(key.clone(), s.clone()),
                other => query = query.filter_literal(key.clone(), other.clone()),
            }
        }
        let max_context_length = match state.get("max_context_length") {
            Some(Value::Int(n)) => n.max(0) as usize,
            Some(Value::Float(f)) => f.max(0.0) as usize,
            _ => DEFAULT_MAX_CONTEXT_LENGTH as usize,
        };
        let (context, _truncated) = ContextBuilder::build(history, &query, state, max_context_length);
        context
    }
}

fn display_string(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        other => other.render(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sse_core::{Map, Next};
    use sse_sampler::MockSampler;

    fn op(id: &str, formula: &str, use_lm: UseLm) -> Operator {
        Operator {
            id: id.into(),
            formula: formula.into(),
            query: None,
            use_lm,
            next: Next::Static(id.into()),
            metadata: Map::new(),
        }
    }

    fn runner(sampler: Rc<dyn Sampler>) -> Runner {
        Runner::new(sampler, FunctionRegistry::with_seed_set(), 7, "gpt-4o-mini")
    }

    #[tokio::test]
    async fn blank_formula_emits_the_literal_comment_line() {
        let r = runner(Rc::new(MockSampler::new()));
        let state = State::new();
        let history = HistoryStore::new();
        let operator = op("op1", "blank", UseLm::Bool(false));
        let out = r.run(&operator, &state, &history).await.unwrap();
        assert_eq!(out, vec!["# \n".to_string()]);
    }

    #[tokio::test]
    async fn direct_eval_assigns_state_and_renders_without_marker() {
        let r = runner(Rc::new(MockSampler::new()));
        let state = State::new();
        state.set("world_time", Value::Int(4));
        let history = HistoryStore::new();
        let operator = op("op1", "world_time = world_time + 1", UseLm::Bool(false));
        let out = r.run(&operator, &state, &history).await.unwrap();
        assert_eq!(out, vec!["world_time = 5".to_string()]);
        assert_eq!(state.get("world_time"), Some(Value::Int(5)));
    }

    #[tokio::test]
    async fn direct_eval_assigns_into_nested_bracket_path() {
        let r = runner(Rc::new(MockSampler::new()));
        let state = State::new();
        let history = HistoryStore::new();
        let operator = op("op1", "state['agent']['hp'] = 10", UseLm::Bool(false));
        let out = r.run(&operator, &state, &history).await.unwrap();
        assert_eq!(out, vec!["state['agent']['hp'] = 10".to_string()]);
        if let Some(Value::Map(m)) = state.get("agent") {
            assert_eq!(m.get("hp"), Some(&Value::Int(10)));
        } else {
            panic!("expected nested map");
        }
    }

    #[tokio::test]
    async fn sampled_success_assigns_and_tags_the_output() {
        let sampler = Rc::new(MockSampler::new());
        sampler.push_line("agent_1_mood = 3");
        let r = runner(sampler);
        let state = State::new();
        state.set("prompt", Value::Str("describe mood".into()));
        let history = HistoryStore::new();
        let operator = op("op1", "agent_1_mood = 1", UseLm::Bool(true));
        let out = r.run(&operator, &state, &history).await.unwrap();
        assert_eq!(out, vec!["agent_1_mood = 3 # sampled".to_string()]);
        assert_eq!(state.get("agent_1_mood"), Some(Value::Int(3)));
    }

    #[tokio::test]
    async fn sampled_type_mismatch_then_retry_succeeds() {
        let sampler = Rc::new(MockSampler::new());
        sampler.push_line("agent_1_mood = \"glad\"");
        sampler.push_line("agent_1_mood = 5");
        let r = runner(sampler.clone());
        let state = State::new();
        let history = HistoryStore::new();
        let operator = op("op1", "agent_1_mood = 1", UseLm::Bool(true));
        let out = r.run(&operator, &state, &history).await.unwrap();
        assert_eq!(out, vec!["agent_1_mood = 5 # sampled".to_string()]);
        assert_eq!(sampler.requests().len(), 2);
        let second_prompt = &sampler.requests()[1].prompt;
        assert!(second_prompt.contains("Feedback: You already tried"));
    }

    #[tokio::test]
    async fn sampler_exhaustion_falls_back_to_current_value_single_quoted() {
        let sampler = Rc::new(MockSampler::new());
        for _ in 0..DEFAULT_MAX_ATTEMPTS {
            sampler.push_line("agent_1_mood = not_a_valid_formula(");
        }
        let r = runner(sampler);
        let state = State::new();
        state.set("agent_1_mood", Value::Str("neutral".into()));
        let history = HistoryStore::new();
        let operator = op("op1", "agent_1_mood = \"x\"", UseLm::Bool(true));
        let out = r.run(&operator, &state, &history).await.unwrap();
        assert_eq!(out, vec!["agent_1_mood = 'neutral' # sampled".to_string()]);
    }

    #[tokio::test]
    async fn sampler_transport_surrender_propagates() {
        let sampler = Rc::new(MockSampler::new());
        sampler.push_error(sse_sampler::SamplerError::Transport("gave up".into()));
        let r = runner(sampler);
        let state = State::new();
        let history = HistoryStore::new();
        let operator = op("op1", "agent_1_mood = \"x\"", UseLm::Bool(true));
        assert!(r.run(&operator, &state, &history).await.is_err());
    }

    #[tokio::test]
    async fn use_lm_expression_is_evaluated_against_state() {
        let sampler = Rc::new(MockSampler::new());
        sampler.push_line("agent_1_mood = 9");
        let r = runner(sampler);
        let state = State::new();
        state.set("world_time", Value::Int(11));
        let history = HistoryStore::new();
        let operator = op("op1", "agent_1_mood = 1", UseLm::Expr("world_time > 10".into()));
        let out = r.run(&operator, &state, &history).await.unwrap();
        assert_eq!(out, vec!["agent_1_mood = 9 # sampled".to_string()]);
    }

    #[tokio::test]
    async fn use_lm_expression_error_falls_back_to_direct_eval() {
        let r = runner(Rc::new(MockSampler::new()));
        let state = State::new();
        let history = HistoryStore::new();
        let operator = op("op1", "agent_1_mood = 1 + 1", UseLm::Expr("not_a_real_name".into()));
        let out = r.run(&operator, &state, &history).await.unwrap();
        assert_eq!(out, vec!["agent_1_mood = 2".to_string()]);
    }
}
