use sse_compiler::{compile, ConfigDocument};
use sse_core::{Map, Value};
use sse_driver::{CancellationToken, StepDriver};
use sse_eval::FunctionRegistry;
use sse_runner::Runner;
use sse_sampler::MockSampler;
use std::rc::Rc;

fn clock_config() -> ConfigDocument {
    let doc = serde_json::json!({
        "entities": { "world": ["clock"] },
        "variables": {
            "clock": { "world_time": 0 }
        },
        "systems_definitions": {
            "clock": [
                { "formula": "world_time = world_time + 1", "use_lm": false }
            ]
        }
    });
    serde_json::from_value(doc).unwrap()
}

#[tokio::test]
async fn clock_operator_advances_world_time_and_rings_to_itself() {
    let registry = FunctionRegistry::with_seed_set();
    let doc = clock_config();
    let (operators, state) = compile(&doc, "world", "clock-test", &registry, &Map::new()).unwrap();
    let first_id = operators[0].id.clone();

    let sampler = Rc::new(MockSampler::new());
    let runner = Runner::new(sampler, registry.clone(), 1, "gpt-4o-mini");
    let mut driver = StepDriver::new(operators, state, runner, registry, first_id.clone()).unwrap();

    let token = CancellationToken::new();
    for expected in 1..=3 {
        let step = driver.step(&token).await.unwrap();
        assert_eq!(step.output, vec![format!("world_time = {expected}")]);
        assert_eq!(step.operator_id, first_id);
    }
    assert_eq!(driver.state().get("world_time"), Some(Value::Int(3)));
    assert_eq!(driver.history().len(), 3);
}

fn conditional_config() -> ConfigDocument {
    // The compiler always assigns the first template in a variable's
    // system list the default `operator_1_{entity}_{variable}` id,
    // ignoring any explicit `id` override there — only later templates in
    // the list may override. So `op_a` below relies on that default id,
    // and only `op_b`/`op_c` set `id` explicitly.
    let doc = serde_json::json!({
        "entities": { "world": ["router"] },
        "variables": {
            "router": { "flag": true }
        },
        "systems_definitions": {
            "router": [
                {
                    "formula": "blank",
                    "use_lm": false,
                    "next": "'op_c' if world_flag else 'op_b'"
                },
                { "id": "op_b", "formula": "blank", "use_lm": false, "next": "operator_1_world_router" },
                { "id": "op_c", "formula": "blank", "use_lm": false, "next": "operator_1_world_router" }
            ]
        }
    });
    serde_json::from_value(doc).unwrap()
}

#[tokio::test]
async fn conditional_next_follows_the_flag() {
    let registry = FunctionRegistry::with_seed_set();
    let doc = conditional_config();
    let (operators, state) = compile(&doc, "world", "router-test", &registry, &Map::new()).unwrap();
    let op_a = "operator_1_world_router".to_string();

    let sampler = Rc::new(MockSampler::new());
    let runner = Runner::new(sampler, registry.clone(), 1, "gpt-4o-mini");
    let mut driver = StepDriver::new(operators, state, runner, registry, op_a.clone()).unwrap();

    let token = CancellationToken::new();
    driver.step(&token).await.unwrap();
    assert_eq!(driver.current_operator_id(), "op_c");

    driver.state().set("world_flag", Value::Bool(false));
    driver.step(&token).await.unwrap();
    assert_eq!(driver.current_operator_id(), op_a);

    driver.step(&token).await.unwrap();
    assert_eq!(driver.current_operator_id(), "op_b");
}

#[tokio::test]
async fn cancellation_discards_the_pending_step() {
    let registry = FunctionRegistry::with_seed_set();
    let doc = clock_config();
    let (operators, state) = compile(&doc, "world", "cancel-test", &registry, &Map::new()).unwrap();
    let first_id = operators[0].id.clone();

    let sampler = Rc::new(MockSampler::new());
    let runner = Runner::new(sampler, registry.clone(), 1, "gpt-4o-mini");
    let mut driver = StepDriver::new(operators, state, runner, registry, first_id).unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let result = driver.step(&token).await;
    assert!(result.is_err());
    assert_eq!(driver.history().len(), 0);
}
