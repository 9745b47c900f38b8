use std::collections::HashMap;
use std::sync::Arc;

use crate::context::ScriptContext;
use crate::error::ScriptError;
use crate::evaluator::Evaluator;
use crate::scope::ScopeChain;
use crate::value::Value;

/// A registered filter function.
///
/// The pipeline value is always prepended to the argument vector before
/// dispatch, so a filter written as `add(a, b)` serves both `add(1, 2)` and
/// `1 |> add(2)`. The invocation context gives filters access to the
/// ambient render state without counting toward their user-visible arity.
pub type FilterFn =
    Arc<dyn Fn(&FilterInvocation<'_, '_>, Vec<Value>) -> Result<Value, ScriptError> + Send + Sync>;

/// Ambient state handed to every filter invocation: the evaluator (for
/// calling arrow-function arguments), the current scope chain, and the
/// directory of the page being rendered (for partial resolution).
pub struct FilterInvocation<'e, 'c> {
    pub evaluator: &'e Evaluator<'c>,
    pub scope: ScopeChain,
    pub page_dir: String,
}

impl FilterInvocation<'_, '_> {
    pub fn ctx(&self) -> &ScriptContext {
        self.evaluator.ctx()
    }

    /// Invoke a callable value, typically an arrow function passed as a
    /// filter argument (`items |> where(x => x > 1)`).
    pub fn call(&self, callee: &Value, args: Vec<Value>) -> Result<Value, ScriptError> {
        self.evaluator.call_value(callee, args)
    }
}

struct FilterOverload {
    /// Explicit argument count including the piped value; `None` accepts
    /// any arity.
    arity: Option<usize>,
    /// Host-registered filters get their failures wrapped as host errors.
    host: bool,
    func: FilterFn,
}

/// The filter table: name to overload set, resolved by (name, arity).
///
/// Built once at context initialization and sealed afterwards; lookups are
/// read-only and lock-free.
#[derive(Default)]
pub struct FilterRegistry {
    filters: HashMap<String, Vec<FilterOverload>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        FilterRegistry::default()
    }

    pub(crate) fn register(&mut self, name: &str, arity: Option<usize>, host: bool, func: FilterFn) {
        self.filters
            .entry(name.to_string())
            .or_default()
            .push(FilterOverload { arity, host, func });
    }

    /// Register a built-in filter with a fixed arity.
    pub fn insert(&mut self, name: &str, arity: usize, func: FilterFn) {
        self.register(name, Some(arity), false, func);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Resolve by name and argument count: an exact-arity overload wins,
    /// otherwise a variadic one.
    pub(crate) fn resolve(&self, name: &str, argc: usize) -> Option<(&FilterFn, bool)> {
        let overloads = self.filters.get(name)?;
        overloads
            .iter()
            .find(|o| o.arity == Some(argc))
            .or_else(|| overloads.iter().find(|o| o.arity.is_none()))
            .map(|o| (&o.func, o.host))
    }
}
