use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::value::Value;

/// One mutable layer of a scope chain.
///
/// Layers are shared by reference: cloning a layer yields a handle onto the
/// same storage, so a write through one handle is visible through all of
/// them. Context globals are shared across renders this way while
/// render-local layers are fresh per call.
#[derive(Clone, Default)]
pub struct ScopeLayer(Arc<RwLock<HashMap<String, Value>>>);

impl ScopeLayer {
    pub fn new() -> Self {
        ScopeLayer::default()
    }

    pub fn from_map(map: HashMap<String, Value>) -> Self {
        ScopeLayer(Arc::new(RwLock::new(map)))
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.read().expect("poisoned scope layer").get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.read().expect("poisoned scope layer").contains_key(name)
    }

    pub fn set(&self, name: &str, value: Value) {
        self.0
            .write()
            .expect("poisoned scope layer")
            .insert(name.to_string(), value);
    }

    pub fn remove(&self, name: &str) {
        self.0.write().expect("poisoned scope layer").remove(name);
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().expect("poisoned scope layer").is_empty()
    }
}

/// An ordered chain of scope layers, innermost first.
///
/// Lookup walks layers inward-out. Declarations write the innermost layer;
/// plain assignment to a name no layer holds targets the outermost
/// (global) layer.
#[derive(Clone)]
pub struct ScopeChain {
    layers: Vec<ScopeLayer>,
}

impl Default for ScopeChain {
    fn default() -> Self {
        ScopeChain::new()
    }
}

impl ScopeChain {
    /// A chain with a single fresh layer.
    pub fn new() -> Self {
        ScopeChain {
            layers: vec![ScopeLayer::new()],
        }
    }

    /// Build a chain from layers listed outermost first, pushing a fresh
    /// local layer on top.
    pub fn stacked(outer: Vec<ScopeLayer>) -> Self {
        let mut layers = vec![ScopeLayer::new()];
        layers.extend(outer.into_iter().rev());
        ScopeChain { layers }
    }

    /// Child chain: a fresh innermost layer sharing every outer layer.
    pub fn child(&self) -> ScopeChain {
        let mut layers = Vec::with_capacity(self.layers.len() + 1);
        layers.push(ScopeLayer::new());
        layers.extend(self.layers.iter().cloned());
        ScopeChain { layers }
    }

    /// Innermost layer, the target of declarations.
    pub fn local(&self) -> &ScopeLayer {
        &self.layers[0]
    }

    fn global(&self) -> &ScopeLayer {
        self.layers.last().unwrap_or(&self.layers[0])
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        for layer in &self.layers {
            if let Some(value) = layer.get(name) {
                return Some(value);
            }
        }
        None
    }

    pub fn contains(&self, name: &str) -> bool {
        self.layers.iter().any(|layer| layer.contains(name))
    }

    /// Introduce a binding into the innermost layer.
    pub fn declare(&self, name: &str, value: Value) {
        self.local().set(name, value);
    }

    /// Assign to the innermost layer already holding `name`, or to the
    /// outermost layer when the name is undeclared.
    pub fn assign(&self, name: &str, value: Value) {
        for layer in &self.layers {
            if layer.contains(name) {
                layer.set(name, value);
                return;
            }
        }
        self.global().set(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undeclared_assignment_targets_outermost_layer() {
        let globals = ScopeLayer::new();
        let scope = ScopeChain::stacked(vec![globals.clone()]);
        let inner = scope.child();

        inner.assign("x", Value::Int(1));
        assert_eq!(globals.get("x"), Some(Value::Int(1)));
    }

    #[test]
    fn declared_binding_shadows_outer() {
        let globals = ScopeLayer::new();
        globals.set("x", Value::Int(1));
        let scope = ScopeChain::stacked(vec![globals.clone()]);

        scope.declare("x", Value::Int(2));
        assert_eq!(scope.lookup("x"), Some(Value::Int(2)));
        assert_eq!(globals.get("x"), Some(Value::Int(1)));
    }

    #[test]
    fn layer_mutation_is_visible_through_all_handles() {
        let layer = ScopeLayer::new();
        let alias = layer.clone();
        layer.set("n", Value::Int(42));
        assert_eq!(alias.get("n"), Some(Value::Int(42)));
    }
}
