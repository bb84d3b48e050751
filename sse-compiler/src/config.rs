//! Deserializable shape of a configuration document.

use indexmap::IndexMap;
use serde::Deserialize;

/// A full configuration document: `entities`, `variables`,
/// `systems_definitions`, matching the canonical language-neutral shape.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigDocument {
    /// Entity name → the variable names attached to it, in declaration
    /// order.
    pub entities: IndexMap<String, Vec<String>>,
    /// Variable name → `{componentAttr → initialValueOrCallable}`.
    pub variables: IndexMap<String, IndexMap<String, serde_json::Value>>,
    /// Variable name → ordered list of operator templates.
    #[serde(default)]
    pub systems_definitions: IndexMap<String, Vec<OperatorTemplate>>,
}

/// One operator template, as it appears under `systems_definitions`.
#[derive(Debug, Clone, Deserialize)]
pub struct OperatorTemplate {
    /// `LHS = RHS`, or the literal `"blank"`. `{entity}`/`{world_entity}`
    /// tokens are substituted at render time.
    #[serde(default)]
    pub formula: String,
    /// Explicit id override; otherwise assigned positionally.
    pub id: Option<String>,
    /// Declarative history filter, values possibly naming state keys.
    pub query: Option<IndexMap<String, serde_json::Value>>,
    /// `true`/`false`, or a string expression re-evaluated every step.
    pub use_lm: Option<serde_json::Value>,
    /// Literal successor id, or a conditional `A if cond else B` string.
    pub next: Option<String>,
    /// Every other key (`visibility`, `for_summary`, `experience`,
    /// `prompt`, arbitrary tags) flows through untouched as metadata.
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}
