//! The mutable simulation state.

use crate::value::{Handle, HandleOps, Map, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// The single shared mutable world. Cloning a `State` clones the `Rc`, not
/// the underlying map — use [`State::snapshot`] for a defensive deep copy.
#[derive(Clone, Default)]
pub struct State(Rc<RefCell<Map>>);

/// Reserved key under which the whole state is reflectively reachable
/// during evaluation, per the data model's self-referential requirement.
pub const SELF_KEY: &str = "state";

impl State {
    /// Build an empty state.
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(Map::new())))
    }

    /// Build a state from an existing map.
    pub fn from_map(map: Map) -> Self {
        Self(Rc::new(RefCell::new(map)))
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().get(key).cloned()
    }

    /// Set a top-level key.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.0.borrow_mut().insert(key.into(), value);
    }

    /// Whether a top-level key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.borrow().contains_key(key)
    }

    /// Number of top-level keys.
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Whether the state has no keys.
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// A deep, defensive copy: mutations to the returned state never affect
    /// `self` or vice versa. Used by the Step Driver to freeze a
    /// `HistoryStep` snapshot.
    pub fn snapshot(&self) -> State {
        State::from_map(self.0.borrow().clone())
    }

    /// A reflective handle to this same state, for injection under
    /// [`SELF_KEY`] into an evaluator's name table. Does not create a
    /// literal cycle in the stored map — the handle is constructed fresh
    /// for each evaluation rather than stored.
    pub fn view(&self) -> Value {
        Value::Handle(Handle(Rc::new(StateView(self.0.clone()))))
    }

    /// Write into a (possibly nested) subscript path, auto-vivifying
    /// intermediate maps, per the `assignPath` design note. Refuses to
    /// index into a non-map value.
    pub fn assign_path(&self, path: &[String], value: Value) -> Result<(), AssignPathError> {
        let mut map_ref = self.0.borrow_mut();
        let Some((last, init)) = path.split_last() else {
            return Err(AssignPathError::EmptyPath);
        };
        let mut current = &mut *map_ref;
        for key in init {
            let entry = current
                .entry(key.clone())
                .or_insert_with(|| Value::Map(Map::new()));
            match entry {
                Value::Map(m) => current = m,
                other => return Err(AssignPathError::NotAMap(format!("{other:?}"))),
            }
        }
        current.insert(last.clone(), value);
        Ok(())
    }

    /// Iterate over the top-level entries in declaration order.
    pub fn iter(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.borrow().iter()).finish()
    }
}

/// Error from [`State::assign_path`].
#[derive(Debug, thiserror::Error)]
pub enum AssignPathError {
    /// The path had zero segments.
    #[error("assignment path must have at least one segment")]
    EmptyPath,
    /// An intermediate segment named a non-map value.
    #[error("cannot index into non-map value: {0}")]
    NotAMap(String),
}

#[derive(Debug)]
struct StateView(Rc<RefCell<Map>>);

impl HandleOps for StateView {
    fn get_item(&self, key: &Value) -> Option<Value> {
        match key {
            Value::Str(k) => self.0.borrow().get(k).cloned(),
            _ => None,
        }
    }

    fn get_attr(&self, name: &str) -> Option<Value> {
        self.0.borrow().get(name).cloned()
    }

    fn type_name(&self) -> &'static str {
        "state"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_path_autovivifies() {
        let state = State::new();
        state.assign_path(
            &["a".into(), "b".into(), "c".into()],
            Value::Int(1),
        )
        .unwrap();
        match state.get("a") {
            Some(Value::Map(m)) => match m.get("b") {
                Some(Value::Map(m2)) => assert_eq!(m2.get("c"), Some(&Value::Int(1))),
                _ => panic!("expected nested map"),
            },
            _ => panic!("expected map at a"),
        }
    }

    #[test]
    fn assign_path_preserves_sibling_keys() {
        let state = State::new();
        state.assign_path(&["a".into(), "x".into()], Value::Int(1)).unwrap();
        state.assign_path(&["a".into(), "y".into()], Value::Int(2)).unwrap();
        if let Some(Value::Map(m)) = state.get("a") {
            assert_eq!(m.get("x"), Some(&Value::Int(1)));
            assert_eq!(m.get("y"), Some(&Value::Int(2)));
        } else {
            panic!("expected map");
        }
    }

    #[test]
    fn snapshot_is_independent() {
        let state = State::new();
        state.set("x", Value::Int(1));
        let snap = state.snapshot();
        state.set("x", Value::Int(2));
        assert_eq!(snap.get("x"), Some(Value::Int(1)));
        assert_eq!(state.get("x"), Some(Value::Int(2)));
    }

    #[test]
    fn view_reflects_state() {
        let state = State::new();
        state.set("x", Value::Int(7));
        let Value::Handle(h) = state.view() else {
            panic!("expected handle");
        };
        assert_eq!(h.0.get_attr("x"), Some(Value::Int(7)));
    }
}
