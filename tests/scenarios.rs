//! End-to-end scenarios against a compiled [`Simulation`], covering the
//! six canonical behaviors a config author relies on: a pure-formula
//! clock, a blank no-op operator, a successful LM sample, a sampled value
//! that needs a retry before it type-checks, conditional `next` routing,
//! and a declarative history query.

use sse::prelude::*;
use std::rc::Rc;

fn compile(doc_json: serde_json::Value, world_entity: &str, task_name: &str, sampler: Rc<dyn Sampler>, seed: u64) -> Simulation {
    let doc: ConfigDocument = serde_json::from_value(doc_json).unwrap();
    Simulation::compile(&doc, world_entity, task_name, sampler, "gpt-4o-mini", seed).unwrap()
}

#[tokio::test]
async fn clock_advances_world_time_every_step() {
    let doc = serde_json::json!({
        "entities": { "world": ["clock"] },
        "variables": { "clock": { "world_time": 0 } },
        "systems_definitions": {
            "clock": [
                { "formula": "world_time = world_time + 1", "use_lm": false }
            ]
        }
    });
    let mut sim = compile(doc, "world", "clock-test", Rc::new(MockSampler::new()), 1);
    let token = CancellationToken::new();

    for expected in 1..=3 {
        let step = sim.step(&token).await.unwrap();
        assert_eq!(step.output, vec![format!("world_time = {expected}")]);
    }
    assert_eq!(sim.state().get("world_time"), Some(Value::Int(3)));
}

#[tokio::test]
async fn blank_operator_emits_a_comment_and_touches_no_state() {
    let doc = serde_json::json!({
        "entities": { "world": ["noop"] },
        "variables": { "noop": { "marker": 0 } },
        "systems_definitions": {
            "noop": [
                { "formula": "blank", "use_lm": false }
            ]
        }
    });
    let mut sim = compile(doc, "world", "blank-test", Rc::new(MockSampler::new()), 1);
    let token = CancellationToken::new();

    let step = sim.step(&token).await.unwrap();
    assert_eq!(step.output, vec!["# \n".to_string()]);
    assert_eq!(sim.state().get("marker"), Some(Value::Int(0)));
}

#[tokio::test]
async fn sampled_integer_is_accepted_on_the_first_reply() {
    let doc = serde_json::json!({
        "entities": { "world": ["counter"] },
        "variables": { "counter": { "score": 0 } },
        "systems_definitions": {
            "counter": [
                { "formula": "score = 7", "use_lm": true }
            ]
        }
    });
    let sampler = Rc::new(MockSampler::new());
    sampler.push_line("score = 42");
    let mut sim = compile(doc, "world", "counter-test", sampler.clone(), 1);
    let token = CancellationToken::new();

    let step = sim.step(&token).await.unwrap();
    assert_eq!(step.output, vec!["score = 42 # sampled".to_string()]);
    assert_eq!(sim.state().get("score"), Some(Value::Int(42)));
    assert_eq!(sampler.requests().len(), 1);
}

#[tokio::test]
async fn sampled_type_mismatch_retries_then_succeeds() {
    let doc = serde_json::json!({
        "entities": { "world": ["counter"] },
        "variables": { "counter": { "score": 0 } },
        "systems_definitions": {
            "counter": [
                { "formula": "score = 7", "use_lm": true }
            ]
        }
    });
    let sampler = Rc::new(MockSampler::new());
    // First reply doesn't type-check against the int default (`7`); the
    // runner should record feedback and retry rather than failing the step.
    sampler.push_line("score = \"not a number\"");
    sampler.push_line("score = 99");
    let mut sim = compile(doc, "world", "counter-test", sampler.clone(), 1);
    let token = CancellationToken::new();

    let step = sim.step(&token).await.unwrap();
    assert_eq!(step.output, vec!["score = 99 # sampled".to_string()]);
    assert_eq!(sim.state().get("score"), Some(Value::Int(99)));
    assert_eq!(sampler.requests().len(), 2);

    let second_prompt = &sampler.requests()[1].prompt;
    assert!(second_prompt.len() > sampler.requests()[0].prompt.len());
}

#[tokio::test]
async fn sampled_retry_budget_exhausted_falls_back_to_current_value() {
    let doc = serde_json::json!({
        "entities": { "world": ["counter"] },
        "variables": { "counter": { "score": 0 } },
        "systems_definitions": {
            "counter": [
                { "formula": "score = 7", "use_lm": true }
            ]
        }
    });
    let sampler = Rc::new(MockSampler::new());
    for _ in 0..sse_runner::DEFAULT_MAX_ATTEMPTS {
        sampler.push_line("score = \"still wrong\"");
    }
    let mut sim = compile(doc, "world", "counter-test", sampler.clone(), 1);
    let token = CancellationToken::new();

    let step = sim.step(&token).await.unwrap();
    assert_eq!(step.output, vec!["score = 0 # sampled".to_string()]);
    assert_eq!(sim.state().get("score"), Some(Value::Int(0)));
    assert_eq!(sampler.requests().len(), sse_runner::DEFAULT_MAX_ATTEMPTS);
}

#[tokio::test]
async fn conditional_next_routes_on_live_state() {
    // The compiler forces the index-0 template in a systems_definition to
    // the default `operator_1_{entity}_{variable}` id even though only
    // later templates here set `id` explicitly.
    let doc = serde_json::json!({
        "entities": { "world": ["router"] },
        "variables": { "router": { "flag": true } },
        "systems_definitions": {
            "router": [
                { "formula": "blank", "use_lm": false, "next": "'op_c' if world_flag else 'op_b'" },
                { "id": "op_b", "formula": "blank", "use_lm": false, "next": "operator_1_world_router" },
                { "id": "op_c", "formula": "blank", "use_lm": false, "next": "operator_1_world_router" }
            ]
        }
    });
    let mut sim = compile(doc, "world", "router-test", Rc::new(MockSampler::new()), 1);
    let token = CancellationToken::new();
    let op_a = "operator_1_world_router".to_string();

    sim.step(&token).await.unwrap();
    assert_eq!(sim.current_operator_id(), "op_c");

    sim.state().set("world_flag", Value::Bool(false));
    sim.step(&token).await.unwrap();
    assert_eq!(sim.current_operator_id(), op_a);

    sim.step(&token).await.unwrap();
    assert_eq!(sim.current_operator_id(), "op_b");
}

#[tokio::test]
async fn context_query_filters_history_by_live_state() {
    // Two operators alternate, each tagging its own step with a different
    // `tag` value, so a query pinned to `tag == "a"` should pick out only
    // every other step's output.
    let doc = serde_json::json!({
        "entities": { "world": ["logger"] },
        "variables": { "logger": { "tag": "a" } },
        "systems_definitions": {
            "logger": [
                { "formula": "tag = 'a'", "use_lm": false, "next": "op_b" },
                { "id": "op_b", "formula": "tag = 'b'", "use_lm": false, "next": "operator_1_world_logger" }
            ]
        }
    });
    let mut sim = compile(doc, "world", "logger-test", Rc::new(MockSampler::new()), 1);
    let token = CancellationToken::new();

    for _ in 0..4 {
        sim.step(&token).await.unwrap();
    }

    let live = State::new();
    live.set("tag", Value::Str("a".into()));
    let query = Query::new().filter_by_state_key("tag");
    let (context, truncated) = ContextBuilder::build(sim.history(), &query, &live, 10_000);

    assert!(!truncated);
    assert_eq!(context, "tag = \"a\"\ntag = \"a\"\n");
}
