//! Result snapshotting: `{metricName -> [value, ...]}` JSON, written under
//! a numeric-suffixed filename so repeated runs never clobber each other.
//!
//! Grounded on `original_source/app.py`'s `run_simulation_and_extract_metrics`
//! (one value per step, per tracked metric) and `get_unique_filename` /
//! `save_results_to_file` (collision-avoidance scheme: append `_{n}` before
//! the extension, starting at 1) — reimplemented without the Flask
//! `results/` directory convention since this is a standalone CLI.

use sse_core::Value;
use sse_history::HistoryStore;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// For each requested metric, collect its value at every step where the
/// state snapshot held it, in step order. Steps where a metric is absent
/// are skipped rather than padded with `null`.
pub fn collect_metric_series(history: &HistoryStore, metric_names: &[String]) -> BTreeMap<String, Vec<serde_json::Value>> {
    let mut out: BTreeMap<String, Vec<serde_json::Value>> = metric_names.iter().map(|m| (m.clone(), Vec::new())).collect();
    for step in history.steps() {
        for name in metric_names {
            if let Some(value) = step.state.get(name) {
                out.get_mut(name).expect("seeded above").push(value_to_json(&value));
            }
        }
    }
    out
}

/// Convert an engine [`Value`] to `serde_json::Value` for snapshotting.
/// `Handle` has no JSON representation, so it degrades to its type name.
fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Int(i) => serde_json::json!(i),
        Value::Float(f) => serde_json::json!(f),
        Value::Bool(b) => serde_json::json!(b),
        Value::Str(s) => serde_json::json!(s),
        Value::Tuple(items) | Value::List(items) => {
            serde_json::Value::Array(items.iter().map(value_to_json).collect())
        }
        Value::Map(m) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in m {
                obj.insert(k.clone(), value_to_json(v));
            }
            serde_json::Value::Object(obj)
        }
        Value::Handle(h) => serde_json::json!(format!("<{}>", h.0.type_name())),
        Value::None => serde_json::Value::Null,
    }
}

/// Pick a filename that doesn't already exist by appending `_{n}` (starting
/// at 1) before the extension until one is free.
pub fn unique_path(base: &Path) -> PathBuf {
    if !base.exists() {
        return base.to_path_buf();
    }
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("snapshot");
    let ext = base.extension().and_then(|s| s.to_str());
    let parent = base.parent().unwrap_or_else(|| Path::new(""));

    let mut index = 1u32;
    loop {
        let candidate_name = match ext {
            Some(ext) => format!("{stem}_{index}.{ext}"),
            None => format!("{stem}_{index}"),
        };
        let candidate = parent.join(candidate_name);
        if !candidate.exists() {
            return candidate;
        }
        index += 1;
    }
}

/// Build the default snapshot filename: `{config_name}_step{n}.json`.
pub fn default_filename(config_name: &str, step: usize) -> PathBuf {
    PathBuf::from(format!("{config_name}_step{step}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sse_core::{HistoryStep, State};
    use tempfile::TempDir;

    fn push_step(history: &mut HistoryStore, mood: &str, time: i64) {
        let state = State::new();
        state.set("mood", Value::Str(mood.to_string()));
        state.set("world_time", Value::Int(time));
        history.push(HistoryStep::new(state.snapshot(), vec![format!("world_time = {time}")], "op".to_string()));
    }

    #[test]
    fn collects_one_value_per_step_for_each_metric() {
        let mut history = HistoryStore::new();
        push_step(&mut history, "glad", 1);
        push_step(&mut history, "sad", 2);

        let series = collect_metric_series(&history, &["mood".to_string(), "world_time".to_string()]);
        assert_eq!(series["mood"], vec![serde_json::json!("glad"), serde_json::json!("sad")]);
        assert_eq!(series["world_time"], vec![serde_json::json!(1), serde_json::json!(2)]);
    }

    #[test]
    fn unknown_metric_collects_an_empty_series() {
        let mut history = HistoryStore::new();
        push_step(&mut history, "glad", 1);
        let series = collect_metric_series(&history, &["missing".to_string()]);
        assert!(series["missing"].is_empty());
    }

    #[test]
    fn unique_path_appends_numeric_suffix_on_collision() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("run.json");
        std::fs::write(&base, "{}").unwrap();
        let first = unique_path(&base);
        assert_eq!(first, dir.path().join("run_1.json"));
        std::fs::write(&first, "{}").unwrap();
        let second = unique_path(&base);
        assert_eq!(second, dir.path().join("run_2.json"));
    }

    #[test]
    fn unique_path_returns_base_when_free() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("run.json");
        assert_eq!(unique_path(&base), base);
    }
}
