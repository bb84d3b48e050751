use sse::prelude::*;
use std::rc::Rc;

fn clock_config() -> ConfigDocument {
    let doc = serde_json::json!({
        "entities": { "world": ["clock"] },
        "variables": { "clock": { "world_time": 0 } },
        "systems_definitions": {
            "clock": [
                { "formula": "world_time = world_time + 1", "use_lm": false }
            ]
        }
    });
    serde_json::from_value(doc).unwrap()
}

#[tokio::test]
async fn simulation_compiles_and_steps() {
    let doc = clock_config();
    let sampler = Rc::new(MockSampler::new());
    let mut sim = Simulation::compile(&doc, "world", "clock-test", sampler, "gpt-4o-mini", 1).unwrap();

    let token = CancellationToken::new();
    for expected in 1..=3 {
        let step = sim.step(&token).await.unwrap();
        assert_eq!(step.output, vec![format!("world_time = {expected}")]);
    }
    assert_eq!(sim.state().get("world_time"), Some(Value::Int(3)));
    assert_eq!(sim.history().len(), 3);
}
