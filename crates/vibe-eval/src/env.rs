//! Scoped variable environment for the evaluator.

use crate::value::Value;
use std::collections::BTreeMap;

/// A single scope level.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: BTreeMap<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: &str, value: Value) {
        self.bindings.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn into_bindings(self) -> BTreeMap<String, Value> {
        self.bindings
    }
}

/// Scoped variable environment with push/pop semantics.
///
/// Scope 0 is the session's global namespace and lives for the whole
/// session. Everything above it belongs to the function call or `let`
/// block currently running. Lookups go from innermost to outermost;
/// `define` always binds in the innermost scope.
#[derive(Debug, Clone)]
pub struct Environment {
    scopes: Vec<Scope>,
}

impl Environment {
    /// Create a new environment with one global scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    /// Pop the innermost scope. The global scope is never popped.
    pub fn pop_scope(&mut self) -> Option<Scope> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    /// Define a variable in the current (innermost) scope.
    pub fn define(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.define(name, value);
        }
    }

    /// Look up a variable, searching from innermost to outermost scope.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// All bindings in the global scope.
    pub fn globals(&self) -> &BTreeMap<String, Value> {
        &self.scopes[0].bindings
    }

    pub fn global_names(&self) -> impl Iterator<Item = &str> {
        self.scopes[0].bindings.keys().map(String::as_str)
    }

    pub fn is_global_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    /// Copy of every non-global scope, innermost last. Closures capture this.
    pub fn local_scopes(&self) -> Vec<Scope> {
        self.scopes[1..].to_vec()
    }

    /// Swap the non-global scopes for `locals`, returning the old ones.
    pub fn replace_locals(&mut self, locals: Vec<Scope>) -> Vec<Scope> {
        let previous = self.scopes.split_off(1);
        self.scopes.extend(locals);
        previous
    }

    /// Drop every non-global scope, leaving the globals intact.
    pub fn clear_locals(&mut self) {
        self.scopes.truncate(1);
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_scopes_shadow_and_pop() {
        let mut env = Environment::new();
        env.define("x", Value::Int(1));
        env.push_scope();
        env.define("x", Value::Int(2));
        assert_eq!(env.get("x"), Some(&Value::Int(2)));
        env.pop_scope();
        assert_eq!(env.get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn global_scope_is_never_popped() {
        let mut env = Environment::new();
        assert!(env.pop_scope().is_none());
        env.define("g", Value::None);
        assert!(env.globals().contains_key("g"));
    }

    #[test]
    fn replace_locals_round_trip() {
        let mut env = Environment::new();
        env.define("g", Value::Int(0));
        env.push_scope();
        env.define("a", Value::Int(1));

        let mut call = Scope::new();
        call.define("b", Value::Int(2));
        let saved = env.replace_locals(vec![call]);
        assert_eq!(env.get("a"), None);
        assert_eq!(env.get("b"), Some(&Value::Int(2)));
        assert_eq!(env.get("g"), Some(&Value::Int(0)));

        env.replace_locals(saved);
        assert_eq!(env.get("a"), Some(&Value::Int(1)));
        assert_eq!(env.get("b"), None);
    }

    #[test]
    fn clear_locals_keeps_globals() {
        let mut env = Environment::new();
        env.define("g", Value::Int(0));
        env.push_scope();
        env.push_scope();
        env.clear_locals();
        assert!(env.is_global_scope());
        assert_eq!(env.global_names().collect::<Vec<_>>(), vec!["g"]);
    }
}
