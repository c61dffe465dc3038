use std::collections::HashMap;
use std::rc::Rc;
use crate::interpreter::value::Value;

/// Flat symbol table. There is no parent link: a function call works on a full copy of the
/// caller's table, which is dropped when the call returns.
#[derive(Clone, Debug, Default)]
pub struct Environment {
    variables: HashMap<Rc<str>, Value>,
}

impl Environment {
    pub fn new_global() -> Environment {
        let mut environment = Environment::default();
        environment.define(Rc::from("nil"), Value::nil());
        environment
    }

    /// Copy of every binding visible right now, for a function call.
    pub fn snapshot(&self) -> Environment {
        self.clone()
    }

    /// A binding that holds `undefined` is treated as absent.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.variables.get(name).filter(|value| !matches!(value, Value::Undefined))
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Binds or overwrites `name`.
    pub fn define(&mut self, name: Rc<str>, value: Value) {
        self.variables.insert(name, value);
    }

    /// Overwrites an existing binding. Returns `false` and leaves the table untouched if
    /// `name` is not bound.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        match self.variables.get_mut(name) {
            Some(slot) if !matches!(slot, Value::Undefined) => {
                *slot = value;
                true
            },
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
