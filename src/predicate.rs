//! Named predicates that `validations.custom` may refer to.
//!
//! A schema never carries executable code. `custom: "nonEmpty"` is looked up
//! here at compile time; a name that isn't registered is a compile error.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::validator::Predicate;

#[derive(Clone, Default)]
pub struct PredicateRegistry {
    predicates: IndexMap<String, Predicate>,
}

impl fmt::Debug for PredicateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.predicates.keys()).finish()
    }
}

impl PredicateRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `nonEmpty`, `integer`, `positive`, `nonNegative` and `trimmed`.
    pub fn with_builtins() -> Self {
        Self::new()
            .with("nonEmpty", |v| match v {
                Value::String(s) => !s.is_empty(),
                Value::Array(xs) => !xs.is_empty(),
                Value::Object(map) => !map.is_empty(),
                Value::Null => false,
                _ => true,
            })
            .with("integer", |v| v.as_f64().is_some_and(|n| n.fract() == 0.0))
            .with("positive", |v| v.as_f64().is_some_and(|n| n > 0.0))
            .with("nonNegative", |v| v.as_f64().is_some_and(|n| n >= 0.0))
            .with("trimmed", |v| v.as_str().is_none_or(|s| s.trim() == s))
    }

    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.register(name, predicate);
        self
    }

    /// Later registrations replace earlier ones under the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.predicates.insert(name.into(), Arc::new(predicate));
    }

    pub fn get(&self, name: &str) -> Option<Predicate> {
        self.predicates.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.predicates.keys().map(String::as_str)
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtins() {
        let registry = PredicateRegistry::with_builtins();
        let check = |name: &str, v: Value| (registry.get(name).unwrap())(&v);
        assert!(check("nonEmpty", json!("a")));
        assert!(!check("nonEmpty", json!("")));
        assert!(!check("nonEmpty", json!([])));
        assert!(check("integer", json!(3)));
        assert!(!check("integer", json!(3.5)));
        assert!(check("positive", json!(0.1)));
        assert!(!check("positive", json!(0)));
        assert!(check("nonNegative", json!(0)));
        assert!(check("trimmed", json!("x")));
        assert!(!check("trimmed", json!(" x")));
    }

    #[test]
    fn registration_order_and_replacement() {
        let registry = PredicateRegistry::new()
            .with("b", |_| true)
            .with("a", |_| true)
            .with("b", |_| false);
        assert_eq!(registry.names().collect::<Vec<_>>(), ["b", "a"]);
        assert!(!(registry.get("b").unwrap())(&json!(null)));
        assert!(registry.get("missing").is_none());
        assert_eq!(format!("{registry:?}"), r#"{"b", "a"}"#);
    }
}
