//! Variables visible to a template while it renders.

use std::collections::HashMap;

use crate::value::Value;

/// Named variables for one render.
///
/// `#set` and `#foreach` write into the same context the caller passed in,
/// so variables assigned by a template are visible to the caller afterwards.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    vars: HashMap<String, Value>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, returning the previous value.
    pub fn put(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.vars.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    /// Bound names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.vars.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_remove() {
        let mut ctx = RenderContext::new();
        assert_eq!(ctx.put("b", 1i64), None);
        ctx.put("a", "x");
        assert_eq!(ctx.get("a"), Some(&Value::from("x")));
        assert_eq!(ctx.names(), vec!["a", "b"]);
        assert_eq!(ctx.remove("b"), Some(Value::Int(1)));
        assert!(!ctx.contains_key("b"));
    }
}
