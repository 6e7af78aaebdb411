//! Variable environment for the Tether interpreter.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::value::{Builtin, Function, Value};

/// The locals of one function activation, shared with any closures
/// defined inside it.
pub type Scope = Rc<RefCell<HashMap<String, Value>>>;

pub(crate) fn new_scope() -> Scope {
    Rc::new(RefCell::new(HashMap::new()))
}

/// The session's persistent namespace.
///
/// Globals live for the whole session and are never rolled back; a failed
/// unit keeps whatever it assigned before failing. Builtins sit behind the
/// globals, so a script may shadow `len` and `del` the shadow to get the
/// builtin back.
#[derive(Default)]
pub struct Environment {
    globals: BTreeMap<String, Value>,
    builtins: BTreeMap<String, Value>,
}

impl Environment {
    /// Create an environment with no globals and no builtins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a global, replacing any previous binding.
    pub fn define(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    /// Look a name up in the globals, then the builtins.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.globals.get(name).or_else(|| self.builtins.get(name))
    }

    pub fn get_global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Remove a global. Returns the removed value, if any.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.globals.remove(name)
    }

    /// Register a native function under `name`.
    pub fn define_builtin(&mut self, builtin: Builtin) {
        let name = builtin.name.clone();
        self.builtins.insert(name, Value::Builtin(Rc::new(builtin)));
    }

    pub fn has_builtin(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    /// Every global binding, sorted by name.
    pub fn globals(&self) -> &BTreeMap<String, Value> {
        &self.globals
    }
}

/// One active call of a user function.
pub(crate) struct Frame {
    pub locals: Scope,
    pub function: Rc<Function>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::CallArgs;

    fn noop(name: &str) -> Builtin {
        Builtin::new(name, |_: &mut dyn std::io::Write, _: CallArgs| Ok(Value::None))
    }

    #[test]
    fn test_globals_shadow_builtins() {
        let mut env = Environment::new();
        env.define_builtin(noop("len"));
        assert!(matches!(env.get("len"), Some(Value::Builtin(_))));

        env.define("len", Value::Int(3));
        assert_eq!(env.get("len"), Some(&Value::Int(3)));

        env.remove("len");
        assert!(matches!(env.get("len"), Some(Value::Builtin(_))));
    }

    #[test]
    fn test_define_replaces() {
        let mut env = Environment::new();
        env.define("x", Value::Int(1));
        env.define("x", Value::Int(2));
        assert_eq!(env.get_global("x"), Some(&Value::Int(2)));
        assert_eq!(env.globals().len(), 1);
    }

    #[test]
    fn test_missing_name() {
        let env = Environment::new();
        assert!(env.get("nope").is_none());
        assert!(!env.has_builtin("nope"));
    }
}
