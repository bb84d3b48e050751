//! The compiler entry point: `compile(entities, variables, systems, …)`.

use crate::config::{ConfigDocument, OperatorTemplate};
use crate::convert::json_to_value;
use crate::error::ConfigError;
use crate::initializer::{parse_initializer, substitute_index, Initializer};
use sse_core::{Map, Next, Operator, State, UseLm, Value};
use sse_eval::{Evaluator, FunctionRegistry};
use std::collections::HashSet;

/// Seed used for the evaluator that resolves callable initializers.
/// Initializer evaluation never calls `random`/`randint` in any config
/// this engine ships with, but a fixed seed keeps it reproducible if one
/// ever does.
const INITIALIZER_SEED: u64 = 0;

/// Translate a declarative configuration into an ordered list of
/// operators plus the initial state, per the ECS Compiler contract.
///
/// `defaults` supplies metadata fields merged into every operator template
/// missing them (the config-level `defaults` pseudo-variable, if present,
/// should be folded in by the caller before invoking this).
pub fn compile(
    doc: &ConfigDocument,
    world_entity_name: &str,
    task_name: &str,
    registry: &FunctionRegistry,
    defaults: &Map,
) -> Result<(Vec<Operator>, State), ConfigError> {
    tracing::debug!(task_name, world_entity_name, "compiling configuration");
    let state = State::new();

    let components = evaluate_components(doc, registry)?;
    for (name, value) in components {
        state.set(name, value);
    }

    let operators = render_systems(doc, world_entity_name, defaults, registry)?;
    let operators = wire_next(operators);

    apply_default_state_keys(&state);

    check_unique_ids(&operators)?;
    check_next_targets(&operators)?;

    Ok((operators, state))
}

/// Evaluate every entity's component initializers. Callable initializers
/// are evaluated against the state as it exists *before* any component is
/// merged in — matching `generate_operators`, where `s.names` is bound to
/// the real state object but `state.update(components)` only happens
/// after this whole pass completes, so sibling components never see each
/// other's freshly computed values.
fn evaluate_components(
    doc: &ConfigDocument,
    registry: &FunctionRegistry,
) -> Result<Vec<(String, Value)>, ConfigError> {
    let pristine_state = State::new();
    let evaluator = Evaluator::new(pristine_state, registry.clone(), INITIALIZER_SEED);

    let mut components = Vec::new();
    for (index, (entity, variables)) in doc.entities.iter().enumerate() {
        for variable in variables {
            let Some(attrs) = doc.variables.get(variable) else {
                return Err(ConfigError::UnknownVariable(variable.clone()));
            };
            for (attr, raw) in attrs {
                let full_name = format!("{entity}_{attr}");
                let value = match parse_initializer(raw) {
                    Initializer::Literal(json) => json_to_value(&json),
                    Initializer::Callable(expr) => {
                        let substituted = substitute_index(&expr, index as i64);
                        match evaluator.eval(&substituted) {
                            Ok(v) => v,
                            Err(e) => {
                                tracing::warn!(
                                    expr = %substituted,
                                    error = %e,
                                    "initializer evaluation failed, storing raw expression"
                                );
                                Value::Str(expr)
                            }
                        }
                    }
                };
                components.push((full_name, value));
            }
        }
    }
    Ok(components)
}

struct RenderedOperator {
    id: String,
    formula: String,
    query: Option<Map>,
    use_lm: UseLm,
    next_raw: Option<String>,
    metadata: Map,
}

fn render_systems(
    doc: &ConfigDocument,
    world_entity_name: &str,
    defaults: &Map,
    registry: &FunctionRegistry,
) -> Result<Vec<RenderedOperator>, ConfigError> {
    let mut rendered = Vec::new();

    for (entity, variables) in &doc.entities {
        for variable in variables {
            if let Some(templates) = doc.systems_definitions.get(variable) {
                for (i, template) in templates.iter().enumerate() {
                    let id = assign_operator_id(entity, variable, i, template.id.as_deref());
                    rendered.push(render_operator(template, entity, world_entity_name, id, defaults));
                }
                continue;
            }

            // No static systems_definitions entry: fall back to a
            // programmatic system generator registered under this
            // variable's name, mirroring `generate_operators`'s
            // `elif variable in s.functions` branch. A generator yields one
            // or more operator dicts (a single `Value::Map`, or a
            // `Value::List`/`Value::Tuple` of them), wrapped identically to
            // a static template.
            if let Some(dicts) = generate_dynamic_operators(variable, registry) {
                for (i, dict) in dicts.iter().enumerate() {
                    let id = assign_operator_id(entity, variable, i, dict_str(dict, "id").as_deref());
                    match render_operator_from_dict(dict, entity, world_entity_name, id, defaults) {
                        Some(op) => rendered.push(op),
                        None => tracing::warn!(variable, "generated operator dict missing a string `formula`, skipping"),
                    }
                }
            }
        }
    }
    Ok(rendered)
}

/// First operator for a given `(entity, variable)` pair always takes the
/// default id regardless of any explicit `id`; later ones use their own
/// `id` if given, else the positional default.
fn assign_operator_id(entity: &str, variable: &str, index: usize, explicit_id: Option<&str>) -> String {
    if index == 0 {
        format!("operator_1_{entity}_{variable}")
    } else {
        explicit_id
            .map(str::to_string)
            .unwrap_or_else(|| format!("operator_{}_{entity}_{variable}", index + 1))
    }
}

/// Look `variable` up in the Function Registry and, if present, invoke it
/// with no arguments to synthesize operator dicts. Matches
/// `system_generator()`'s zero-arg call and its tolerant treatment of a
/// single dict vs. a list/tuple of dicts; any failure (missing function,
/// non-Map/List result, or an evaluation error) is logged and treated as
/// "no operators generated" rather than propagated, matching the
/// original's broad `except Exception` around this call.
fn generate_dynamic_operators(variable: &str, registry: &FunctionRegistry) -> Option<Vec<Map>> {
    let f = registry.get(variable)?.clone();
    let host = Evaluator::new(State::new(), registry.clone(), INITIALIZER_SEED);
    let result = match f(&[], &host) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(variable, error = %e, "error generating systems for variable");
            return None;
        }
    };
    match result {
        Value::Map(m) => Some(vec![m]),
        Value::List(items) | Value::Tuple(items) => {
            let mut dicts = Vec::new();
            for item in items {
                match item {
                    Value::Map(m) => dicts.push(m),
                    other => {
                        tracing::warn!(variable, ?other, "generated system entry is not a dict, skipping");
                    }
                }
            }
            Some(dicts)
        }
        other => {
            tracing::warn!(variable, ?other, "system generator did not return a dict or list of dicts");
            None
        }
    }
}

fn dict_str(dict: &Map, key: &str) -> Option<String> {
    match dict.get(key) {
        Some(Value::Str(s)) => Some(s.clone()),
        _ => None,
    }
}

/// Build a [`RenderedOperator`] from a dynamically generated operator dict,
/// applying the same `{entity}`/`{world_entity}` substitution and
/// defaults-merge as a static template. Returns `None` when `formula` is
/// missing or not a string, since that dict can't be wrapped into an
/// operator at all.
fn render_operator_from_dict(
    dict: &Map,
    entity: &str,
    world_entity_name: &str,
    id: String,
    defaults: &Map,
) -> Option<RenderedOperator> {
    let formula = match dict.get("formula") {
        Some(Value::Str(s)) => s.replace("{entity}", entity).replace("{world_entity}", world_entity_name),
        _ => return None,
    };

    let query = match dict.get("query") {
        Some(Value::Map(m)) => Some(m.clone()),
        _ => None,
    };

    let use_lm = match dict.get("use_lm") {
        Some(Value::Bool(b)) => UseLm::Bool(*b),
        Some(Value::Str(s)) => UseLm::Expr(s.clone()),
        _ => UseLm::Bool(false),
    };

    let next_raw = dict_str(dict, "next");

    let mut metadata = Map::new();
    for (k, v) in dict {
        if !matches!(k.as_str(), "formula" | "query" | "use_lm" | "next" | "id") {
            metadata.insert(k.clone(), v.clone());
        }
    }
    for (k, v) in defaults {
        metadata.entry(k.clone()).or_insert_with(|| v.clone());
    }

    Some(RenderedOperator {
        id,
        formula,
        query,
        use_lm,
        next_raw,
        metadata,
    })
}

fn render_operator(
    template: &OperatorTemplate,
    entity: &str,
    world_entity_name: &str,
    id: String,
    defaults: &Map,
) -> RenderedOperator {
    let formula = template
        .formula
        .replace("{entity}", entity)
        .replace("{world_entity}", world_entity_name);

    let query = template.query.as_ref().map(|q| {
        let mut m = Map::new();
        for (k, v) in q {
            m.insert(k.clone(), json_to_value(v));
        }
        m
    });

    let use_lm = match &template.use_lm {
        Some(serde_json::Value::Bool(b)) => UseLm::Bool(*b),
        Some(serde_json::Value::String(s)) => UseLm::Expr(s.clone()),
        Some(other) => {
            tracing::warn!(?other, "unsupported use_lm shape, defaulting to false");
            UseLm::Bool(false)
        }
        None => UseLm::Bool(false),
    };

    let mut metadata = Map::new();
    for (k, v) in &template.extra {
        metadata.insert(k.clone(), json_to_value(v));
    }
    for (k, v) in defaults {
        metadata.entry(k.clone()).or_insert_with(|| v.clone());
    }

    RenderedOperator {
        id,
        formula,
        query,
        use_lm,
        next_raw: template.next.clone(),
        metadata,
    }
}

/// Assign `next` for every operator missing it: the following operator in
/// render order, wrapping the last back to the first (a ring). A
/// single-operator config rings to itself.
fn wire_next(rendered: Vec<RenderedOperator>) -> Vec<Operator> {
    let len = rendered.len();
    let ids: Vec<String> = rendered.iter().map(|r| r.id.clone()).collect();
    rendered
        .into_iter()
        .enumerate()
        .map(|(i, r)| {
            let next_raw = r.next_raw.unwrap_or_else(|| {
                if i + 1 < len {
                    ids[i + 1].clone()
                } else {
                    ids[0].clone()
                }
            });
            Operator {
                id: r.id,
                formula: r.formula,
                query: r.query,
                use_lm: r.use_lm,
                next: Next::parse(&next_raw),
                metadata: r.metadata,
            }
        })
        .collect()
}

/// The fixed keys `generate_operators` always sets at the very end, after
/// components have already been merged — so these five always win over a
/// same-named component, matching the original's unconditional final
/// `state.update({...})` call. `world_time` is the one exception: it's
/// only seeded if no component already set it.
fn apply_default_state_keys(state: &State) {
    state.set("agent_index", Value::Int(0));
    state.set("prompt", Value::Str(String::new()));
    state.set("max_context_length", Value::Int(1_000_000));
    state.set("sample_mode", Value::Str("full".to_string()));
    state.set("all", Value::Bool(true));
    if !state.contains("world_time") {
        state.set("world_time", Value::Int(0));
    }
}

fn check_unique_ids(operators: &[Operator]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for op in operators {
        if !seen.insert(op.id.clone()) {
            return Err(ConfigError::DuplicateOperatorId(op.id.clone()));
        }
    }
    Ok(())
}

fn check_next_targets(operators: &[Operator]) -> Result<(), ConfigError> {
    let ids: HashSet<&str> = operators.iter().map(|o| o.id.as_str()).collect();
    for op in operators {
        if let Next::Static(target) = &op.next {
            if !ids.contains(target.as_str()) {
                return Err(ConfigError::DanglingNext {
                    from: op.id.clone(),
                    to: target.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(json: serde_json::Value) -> ConfigDocument {
        serde_json::from_value(json).expect("valid config document")
    }

    #[test]
    fn clock_config_compiles_one_ring_operator() {
        let doc = doc(serde_json::json!({
            "entities": {"world": ["heading"]},
            "variables": {"heading": {"time": 0}},
            "systems_definitions": {
                "heading": [{"formula": "world_time = world_time + 1"}]
            }
        }));
        let (operators, state) = compile(&doc, "world", "", &FunctionRegistry::with_seed_set(), &Map::new()).unwrap();
        assert_eq!(operators.len(), 1);
        assert_eq!(operators[0].id, "operator_1_world_heading");
        assert!(matches!(&operators[0].next, Next::Static(id) if id == "operator_1_world_heading"));
        assert_eq!(state.get("world_time"), Some(Value::Int(0)));
        assert_eq!(state.get("world_heading_time"), Some(Value::Int(0)));
    }

    #[test]
    fn multi_operator_ring_wires_in_order() {
        let doc = doc(serde_json::json!({
            "entities": {"world": ["a", "b"]},
            "variables": {"a": {"x": 1}, "b": {"y": 2}},
            "systems_definitions": {
                "a": [{"formula": "blank"}],
                "b": [{"formula": "blank"}]
            }
        }));
        let (operators, _) = compile(&doc, "world", "", &FunctionRegistry::with_seed_set(), &Map::new()).unwrap();
        assert_eq!(operators.len(), 2);
        assert!(matches!(&operators[0].next, Next::Static(id) if id == "operator_1_world_b"));
        assert!(matches!(&operators[1].next, Next::Static(id) if id == "operator_1_world_a"));
    }

    #[test]
    fn fixed_default_state_keys_are_always_present() {
        let doc = doc(serde_json::json!({
            "entities": {"world": ["cfg"]},
            "variables": {"cfg": {"x": 7}},
            "systems_definitions": {}
        }));
        let (_, state) = compile(&doc, "world", "", &FunctionRegistry::with_seed_set(), &Map::new()).unwrap();
        assert_eq!(state.get("all"), Some(Value::Bool(true)));
        assert_eq!(state.get("sample_mode"), Some(Value::Str("full".into())));
        assert_eq!(state.get("agent_index"), Some(Value::Int(0)));
        assert_eq!(state.get("world_cfg_x"), Some(Value::Int(7)));
    }

    #[test]
    fn duplicate_operator_ids_are_rejected() {
        let doc = doc(serde_json::json!({
            "entities": {"world": ["a"]},
            "variables": {"a": {"x": 1}},
            "systems_definitions": {
                "a": [
                    {"formula": "blank", "id": "dup"},
                    {"formula": "blank", "id": "dup"}
                ]
            }
        }));
        let err = compile(&doc, "world", "", &FunctionRegistry::with_seed_set(), &Map::new()).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateOperatorId(_)));
    }

    #[test]
    fn dangling_next_is_rejected() {
        let doc = doc(serde_json::json!({
            "entities": {"world": ["a"]},
            "variables": {"a": {"x": 1}},
            "systems_definitions": {
                "a": [{"formula": "blank", "next": "does_not_exist"}]
            }
        }));
        let err = compile(&doc, "world", "", &FunctionRegistry::with_seed_set(), &Map::new()).unwrap_err();
        assert!(matches!(err, ConfigError::DanglingNext { .. }));
    }

    #[test]
    fn metadata_defaults_fill_missing_tags_only() {
        let doc = doc(serde_json::json!({
            "entities": {"world": ["a"]},
            "variables": {"a": {"x": 1}},
            "systems_definitions": {
                "a": [{"formula": "blank", "visibility": "public"}]
            }
        }));
        let mut defaults = Map::new();
        defaults.insert("visibility".into(), Value::Str("private".into()));
        defaults.insert("experience".into(), Value::Str("none".into()));
        let (operators, _) = compile(&doc, "world", "", &FunctionRegistry::with_seed_set(), &defaults).unwrap();
        assert_eq!(operators[0].metadata.get("visibility"), Some(&Value::Str("public".into())));
        assert_eq!(operators[0].metadata.get("experience"), Some(&Value::Str("none".into())));
    }

    #[test]
    fn callable_initializer_is_evaluated() {
        let doc = doc(serde_json::json!({
            "entities": {"world": ["a"]},
            "variables": {"a": {"x": "abs(-3)"}},
            "systems_definitions": {}
        }));
        let (_, state) = compile(&doc, "world", "", &FunctionRegistry::with_seed_set(), &Map::new()).unwrap();
        assert_eq!(state.get("world_a_x"), Some(Value::Int(3)));
    }
}

/// Extract the `defaults` pseudo-variable from `variables`, if present, as
/// a metadata-field default map (spec §6.1). Returns the remaining
/// variables unchanged — `defaults` is never itself a renderable variable.
pub fn extract_variable_defaults(doc: &ConfigDocument) -> Map {
    let mut out = Map::new();
    if let Some(defaults) = doc.variables.get("defaults") {
        for (k, v) in defaults {
            out.insert(k.clone(), json_to_value(v));
        }
    }
    out
}
