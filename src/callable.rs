//! The `Callable` capability and its two in-tree implementors besides
//! classes: user functions (closures) and the native `clock`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use chrono::Utc;
use log::{debug, trace};

use crate::ast::FunctionDecl;
use crate::class::LoxInstance;
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::interpreter::{ControlFlow, Interpreter};
use crate::value::Value;

/// Anything that can appear in callee position.
///
/// The interpreter checks `arity` against the argument count before
/// `call` runs, so implementors may index `arguments` freely.
pub trait Callable: fmt::Debug {
    fn name(&self) -> &str;

    fn arity(&self) -> usize;

    fn call(
        self: Rc<Self>,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
        line: usize,
    ) -> Result<Value>;
}

/// A user function: declaration plus the environment it closed over.
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: Rc<RefCell<Environment>>,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    /// A fresh function whose closure is one extra scope holding `this`.
    /// `self` is left untouched.
    pub fn bind(&self, instance: Rc<RefCell<LoxInstance>>, line: usize) -> Result<LoxFunction> {
        trace!("Binding '{}' to an instance", self.name());

        let mut environment = Environment::with_enclosing(self.closure.clone());
        environment.define("this", Value::Instance(instance), line)?;

        Ok(LoxFunction {
            declaration: self.declaration.clone(),
            closure: Rc::new(RefCell::new(environment)),
            is_initializer: self.is_initializer,
        })
    }
}

impl Callable for LoxFunction {
    fn name(&self) -> &str {
        self.declaration.name().unwrap_or("")
    }

    fn arity(&self) -> usize {
        self.declaration.arity()
    }

    fn call(
        self: Rc<Self>,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
        line: usize,
    ) -> Result<Value> {
        debug!("Calling user-defined function '{}'", self.name());

        let mut environment = Environment::with_enclosing(self.closure.clone());

        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            environment.define(&param.lexeme, argument, param.line)?;
        }

        let flow = interpreter.execute_block(
            &self.declaration.body,
            Rc::new(RefCell::new(environment)),
        )?;

        let returned = match flow {
            ControlFlow::Normal => Value::Nil,
            ControlFlow::Return(value) => value,
            ControlFlow::Break => {
                return Err(LoxError::internal(format!(
                    "'break' escaped the body of '{}'",
                    self.name()
                )));
            }
        };

        // `init` always yields the instance, even after a bare `return;`.
        if self.is_initializer {
            return Environment::get_at(&self.closure, 0, "this", line);
        }

        Ok(returned)
    }
}

impl fmt::Debug for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.declaration.name() {
            Some(name) => write!(f, "<fn {}>", name),
            None => write!(f, "<fn>"),
        }
    }
}

/// `clock()`: seconds since the Unix epoch as a float.
#[derive(Debug)]
pub struct Clock;

impl Callable for Clock {
    fn name(&self) -> &str {
        "clock"
    }

    fn arity(&self) -> usize {
        0
    }

    fn call(
        self: Rc<Self>,
        _interpreter: &mut Interpreter,
        _arguments: Vec<Value>,
        _line: usize,
    ) -> Result<Value> {
        let seconds: f64 = Utc::now().timestamp_micros() as f64 / 1_000_000.0;

        debug!("Native function 'clock' returned: {}", seconds);

        Ok(Value::Number(seconds))
    }
}
