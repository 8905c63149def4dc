use crate::callable::Callable;
use crate::error::{LoxError, Result};
use crate::value::Value;
use log::trace;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One lexical scope.  Children point at their parent, never the other way
/// round, so a closure keeping a scope alive keeps its whole ancestry alive
/// without forming a cycle.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    /// A root scope holding `natives` under their own names.
    pub fn with_natives(natives: impl IntoIterator<Item = Rc<dyn Callable>>) -> Self {
        let values: HashMap<String, Value> = natives
            .into_iter()
            .map(|native| (native.name().to_string(), Value::NativeFunction(native)))
            .collect();

        Environment {
            values,
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Binds a new name in *this* scope.  Redefinition in the same scope is
    /// an error; shadowing an outer scope is not.
    pub fn define(&mut self, name: &str, value: Value, line: usize) -> Result<()> {
        if self.values.contains_key(name) {
            return Err(LoxError::runtime(
                line,
                format!("Redefining existing variable '{}' is not allowed.", name),
            ));
        }

        trace!("Defining '{}' = {}", name, value);
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Walks outward until some scope has `name`.
    pub fn get(&self, name: &str, line: usize) -> Result<Value> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    pub fn assign(&mut self, name: &str, value: Value, line: usize) -> Result<()> {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    /// Reads `name` from the scope exactly `distance` hops out.  A miss means
    /// the resolver and interpreter disagree, not a user error.
    pub fn get_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
        line: usize,
    ) -> Result<Value> {
        let target = Self::ancestor(env, distance).ok_or_else(|| {
            LoxError::internal(format!(
                "no scope {} level(s) out for '{}' [line {}]",
                distance, name, line
            ))
        })?;

        let value = target.borrow().values.get(name).cloned();

        value.ok_or_else(|| {
            LoxError::internal(format!(
                "'{}' not bound at resolved distance {} [line {}]",
                name, distance, line
            ))
        })
    }

    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
        value: Value,
        line: usize,
    ) -> Result<()> {
        let target = Self::ancestor(env, distance).ok_or_else(|| {
            LoxError::internal(format!(
                "no scope {} level(s) out for '{}' [line {}]",
                distance, name, line
            ))
        })?;

        let mut target = target.borrow_mut();

        match target.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(LoxError::internal(format!(
                "'{}' not bound at resolved distance {} [line {}]",
                name, distance, line
            ))),
        }
    }

    fn ancestor(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
    ) -> Option<Rc<RefCell<Environment>>> {
        let mut current = env.clone();

        for _ in 0..distance {
            let next = current.borrow().enclosing.clone()?;
            current = next;
        }

        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::Clock;

    fn shared(env: Environment) -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(env))
    }

    #[test]
    fn redefinition_in_same_scope_fails() {
        let mut env = Environment::new();
        env.define("a", Value::Number(1.0), 1).unwrap();

        let err = env.define("a", Value::Number(2.0), 2).unwrap_err();
        assert!(matches!(err, LoxError::Runtime { line: 2, .. }));
    }

    #[test]
    fn shadowing_in_child_scope_is_allowed() {
        let global = shared(Environment::new());
        global
            .borrow_mut()
            .define("a", Value::Number(1.0), 1)
            .unwrap();

        let mut child = Environment::with_enclosing(global.clone());
        child.define("a", Value::Number(2.0), 2).unwrap();

        assert_eq!(child.get("a", 3).unwrap(), Value::Number(2.0));
        assert_eq!(global.borrow().get("a", 3).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn assign_walks_outward() {
        let global = shared(Environment::new());
        global.borrow_mut().define("a", Value::Nil, 1).unwrap();

        let mut child = Environment::with_enclosing(global.clone());
        child.assign("a", Value::Bool(true), 2).unwrap();

        assert_eq!(global.borrow().get("a", 3).unwrap(), Value::Bool(true));
    }

    #[test]
    fn undefined_variable_is_a_runtime_error() {
        let env = Environment::new();
        let err = env.get("missing", 7).unwrap_err();

        assert_eq!(err.to_string(), "Undefined variable 'missing'.\n[line 7]");
    }

    #[test]
    fn get_at_and_assign_at_address_one_scope() {
        let global = shared(Environment::new());
        global
            .borrow_mut()
            .define("a", Value::Number(1.0), 1)
            .unwrap();
        let middle = shared(Environment::with_enclosing(global.clone()));
        middle
            .borrow_mut()
            .define("a", Value::Number(2.0), 1)
            .unwrap();
        let inner = shared(Environment::with_enclosing(middle.clone()));

        assert_eq!(
            Environment::get_at(&inner, 2, "a", 1).unwrap(),
            Value::Number(1.0)
        );

        Environment::assign_at(&inner, 1, "a", Value::Number(5.0), 1).unwrap();
        assert_eq!(
            Environment::get_at(&inner, 1, "a", 1).unwrap(),
            Value::Number(5.0)
        );
        assert_eq!(
            Environment::get_at(&inner, 2, "a", 1).unwrap(),
            Value::Number(1.0)
        );
    }

    #[test]
    fn natives_are_bound_by_name() {
        let env = Environment::with_natives([Rc::new(Clock) as Rc<dyn Callable>]);

        let clock = env.get("clock", 1).unwrap();
        assert!(matches!(clock, Value::NativeFunction(_)));
        assert_eq!(clock.to_string(), "<native fn clock>");
    }

    #[test]
    fn resolved_miss_is_internal() {
        let env = shared(Environment::new());

        assert!(matches!(
            Environment::get_at(&env, 0, "x", 1),
            Err(LoxError::Internal(_))
        ));
        assert!(matches!(
            Environment::get_at(&env, 3, "x", 1),
            Err(LoxError::Internal(_))
        ));
    }
}
