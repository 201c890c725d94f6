//! Named caller-supplied predicates for the `custom` operator.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::coerce::parse_number;

type CellFn = dyn Fn(&str) -> bool + Send + Sync;

/// A named function over a raw cell value.
///
/// The name is what filter text shows for the operand, and what identifies the
/// function when a predicate is compared or parsed back.
#[derive(Clone)]
pub struct CustomFn {
    name: Arc<str>,
    func: Arc<CellFn>,
}

impl CustomFn {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, value: &str) -> bool {
        (self.func)(value)
    }
}

impl fmt::Debug for CustomFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CustomFn").field(&self.name).finish()
    }
}

impl PartialEq for CustomFn {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Lookup table used when filter text refers to a custom function by name.
#[derive(Debug, Clone, Default)]
pub struct CustomRegistry {
    functions: HashMap<String, CustomFn>,
}

impl CustomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `empty` and `numeric`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(CustomFn::new("empty", |value| value.trim().is_empty()));
        registry.register(CustomFn::new("numeric", |value| parse_number(value).is_some()));
        registry
    }

    /// Adds a function, replacing any previous one with the same name.
    pub fn register(&mut self, func: CustomFn) {
        if self.functions.contains_key(func.name()) {
            tracing::warn!("Custom predicate '{}' redefined", func.name());
        }
        self.functions.insert(func.name().to_string(), func);
    }

    pub fn get(&self, name: &str) -> Option<&CustomFn> {
        self.functions.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let registry = CustomRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["empty", "numeric"]);

        let empty = registry.get("empty").unwrap();
        assert!(empty.call("   "));
        assert!(!empty.call("x"));

        let numeric = registry.get("numeric").unwrap();
        assert!(numeric.call("1500,50"));
        assert!(!numeric.call("n/a"));
    }

    #[test]
    fn functions_compare_by_name() {
        let a = CustomFn::new("even_len", |v| v.len() % 2 == 0);
        let b = CustomFn::new("even_len", |_| false);
        assert_eq!(a, b);
    }
}
