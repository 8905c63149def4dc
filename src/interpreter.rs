use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::callable::{Callable, Clock, LoxFunction};
use crate::class::{LoxClass, LoxInstance, INITIALIZER};
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::resolver::Locals;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Default bound on nested calls before `Stack overflow.` is raised.  Sized
/// to trip well inside an ordinary 8 MiB thread stack; hosts running the
/// interpreter on a bigger stack can raise it with `set_max_call_depth`.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// How a statement finished.  `Return` is absorbed by the nearest call,
/// `Break` by the nearest loop; neither is ever an error.
#[derive(Debug)]
pub enum ControlFlow {
    Normal,
    Return(Value),
    Break,
}

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: Locals,
    output: Box<dyn Write>,
    call_depth: usize,
    max_call_depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Creates an interpreter printing to stdout, with native functions
    /// such as `clock` already defined.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Same as [`new`](Self::new) but `print` writes to `output`.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let natives: [Rc<dyn Callable>; 1] = [Rc::new(Clock)];
        let globals = Rc::new(RefCell::new(Environment::with_natives(natives)));

        Self {
            environment: globals.clone(),
            globals,
            locals: HashMap::new(),
            output,
            call_depth: 0,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    pub fn set_max_call_depth(&mut self, depth: usize) {
        self.max_call_depth = depth;
    }

    /// Installs a native callable in the global scope under its own name.
    pub fn define_native(&mut self, native: Rc<dyn Callable>) -> Result<()> {
        let name = native.name().to_string();

        self.globals
            .borrow_mut()
            .define(&name, Value::NativeFunction(native), 0)
    }

    /// Merges a resolver side-table.  Tables from earlier runs stay valid
    /// because expression ids are never reused.
    pub fn resolve(&mut self, locals: Locals) {
        debug!("Recording {} resolved local(s)", locals.len());

        self.locals.extend(locals);
    }

    /// Looks a name up in the global scope.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.borrow().get(name, 0).ok()
    }

    /// Interprets a list of statements (a "program").  The first runtime
    /// error aborts the whole run.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        let result = self.execute_top_level(statements);
        self.output.flush()?;

        if result.is_ok() {
            info!("Interpretation completed successfully");
        }

        result
    }

    fn execute_top_level(&mut self, statements: &[Stmt]) -> Result<()> {
        for stmt in statements {
            match self.execute(stmt)? {
                ControlFlow::Normal => {}
                ControlFlow::Return(_) => {
                    return Err(LoxError::internal("'return' escaped to top level"));
                }
                ControlFlow::Break => {
                    return Err(LoxError::internal("'break' escaped to top level"));
                }
            }
        }

        Ok(())
    }

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> Result<ControlFlow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(ControlFlow::Normal)
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(self.output, "{}", value)?;
                Ok(ControlFlow::Normal)
            }

            Stmt::Var { name, initializer } => {
                debug!("Defining variable '{}'", name.lexeme);
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                self.environment
                    .borrow_mut()
                    .define(&name.lexeme, value, name.line)?;
                Ok(ControlFlow::Normal)
            }

            Stmt::Block(statements) => {
                let environment = Environment::with_enclosing(self.environment.clone());
                self.execute_block(statements, Rc::new(RefCell::new(environment)))
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(ControlFlow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        ControlFlow::Normal => {}
                        ControlFlow::Break => break,
                        returned @ ControlFlow::Return(_) => return Ok(returned),
                    }
                }
                Ok(ControlFlow::Normal)
            }

            Stmt::Break(_) => Ok(ControlFlow::Break),

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);
                Ok(ControlFlow::Return(value))
            }

            Stmt::Function(declaration) => {
                let Some(name) = &declaration.name else {
                    return Err(LoxError::internal("function statement without a name"));
                };

                debug!("Defining function '{}'", name.lexeme);

                // Closure over the *current* scope; bound into that same scope.
                let function =
                    LoxFunction::new(declaration.clone(), self.environment.clone(), false);
                self.environment.borrow_mut().define(
                    &name.lexeme,
                    Value::Function(Rc::new(function)),
                    name.line,
                )?;
                Ok(ControlFlow::Normal)
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                self.execute_class(name, superclass.as_ref(), methods)?;
                Ok(ControlFlow::Normal)
            }
        }
    }

    /// Runs `statements` in `environment`, then restores the previous
    /// environment whatever the outcome.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<ControlFlow> {
        let previous = std::mem::replace(&mut self.environment, environment);

        let result = self.execute_sequence(statements);

        self.environment = previous;
        result
    }

    fn execute_sequence(&mut self, statements: &[Stmt]) -> Result<ControlFlow> {
        for stmt in statements {
            match self.execute(stmt)? {
                ControlFlow::Normal => {}
                exit => return Ok(exit),
            }
        }

        Ok(ControlFlow::Normal)
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<()> {
        debug!("Defining class '{}'", name.lexeme);

        // Placeholder first; replaced once the class is complete.
        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Nil, name.line)?;

        let superclass: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    let line = match expr {
                        Expr::Variable { name, .. } => name.line,
                        _ => name.line,
                    };
                    return Err(LoxError::runtime(line, "Superclass must be a class."));
                }
            },
            None => None,
        };

        // Methods close over a scope holding `super` when there is one.
        let method_env = match &superclass {
            Some(superclass) => {
                let mut env = Environment::with_enclosing(self.environment.clone());
                env.define("super", Value::Class(superclass.clone()), name.line)?;
                Rc::new(RefCell::new(env))
            }
            None => self.environment.clone(),
        };

        let mut table: HashMap<String, Rc<LoxFunction>> = HashMap::new();

        for method in methods {
            let method_name = method.name().unwrap_or_default().to_string();
            let is_initializer = method_name == INITIALIZER;
            let function = LoxFunction::new(method.clone(), method_env.clone(), is_initializer);
            table.insert(method_name, Rc::new(function));
        }

        let class = LoxClass::new(name.lexeme.clone(), superclass, table);

        self.environment.borrow_mut().assign(
            &name.lexeme,
            Value::Class(Rc::new(class)),
            name.line,
        )?;

        info!("Class '{}' defined", name.lexeme);
        Ok(())
    }

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;

                let short_circuit = if operator.token_type == TokenType::OR {
                    left.is_truthy()
                } else {
                    !left.is_truthy()
                };

                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(distance) => Environment::assign_at(
                        &self.environment,
                        *distance,
                        &name.lexeme,
                        value.clone(),
                        name.line,
                    )?,
                    None => self
                        .globals
                        .borrow_mut()
                        .assign(&name.lexeme, value.clone(), name.line)?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => self.evaluate_call(callee, paren, arguments),

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => LoxInstance::get(&instance, name),
                _ => Err(LoxError::runtime(
                    name.line,
                    "Only instances have properties.",
                )),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(LoxError::runtime(name.line, "Only instances have fields."));
                };

                let value = self.evaluate(value)?;
                instance.borrow_mut().set(name, value.clone());
                Ok(value)
            }

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),

            Expr::AnonymousFunction(declaration) => {
                let function =
                    LoxFunction::new(declaration.clone(), self.environment.clone(), false);
                Ok(Value::Function(Rc::new(function)))
            }
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value> {
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match right {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operand must be a number.",
                )),
            },
            TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),
            _ => Err(LoxError::internal(format!(
                "invalid unary operator '{}'",
                operator.lexeme
            ))),
        }
    }

    /// Both operands are evaluated, left first, before any type check.
    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), right) => Ok(Value::String(a + &right.to_string())),
                (left, Value::String(b)) => Ok(Value::String(left.to_string() + &b)),
                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be two numbers or at least one string.",
                )),
            },

            TokenType::MINUS => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Ok(Value::Number(a * b))
            }

            TokenType::SLASH => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Ok(Value::Number(a / b))
            }

            TokenType::GREATER => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Ok(Value::Bool(a > b))
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Ok(Value::Bool(a >= b))
            }

            TokenType::LESS => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Ok(Value::Bool(a < b))
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Ok(Value::Bool(a <= b))
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left == right)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left != right)),

            _ => Err(LoxError::internal(format!(
                "invalid binary operator '{}'",
                operator.lexeme
            ))),
        }
    }

    /// Arguments are evaluated left to right before the arity check.
    fn evaluate_call(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> Result<Value> {
        let callee = self.evaluate(callee)?;

        let mut values: Vec<Value> = Vec::with_capacity(arguments.len());
        for argument in arguments {
            values.push(self.evaluate(argument)?);
        }

        let Some(callable) = callee.as_callable() else {
            return Err(LoxError::runtime(
                paren.line,
                "Can only call functions and classes.",
            ));
        };

        if values.len() != callable.arity() {
            return Err(LoxError::runtime(
                paren.line,
                format!(
                    "Expected {} arguments but got {}.",
                    callable.arity(),
                    values.len()
                ),
            ));
        }

        if self.call_depth >= self.max_call_depth {
            return Err(LoxError::runtime(paren.line, "Stack overflow."));
        }

        debug!("Calling '{}' with {} argument(s)", callable.name(), values.len());

        self.call_depth += 1;
        let result = callable.call(self, values, paren.line);
        self.call_depth -= 1;

        result
    }

    /// `super.method`: the superclass comes from the scope captured when the
    /// class was defined, `this` from the scope right inside it.
    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value> {
        let distance = *self
            .locals
            .get(&id)
            .ok_or_else(|| LoxError::internal("'super' was not resolved"))?;

        let this_distance = distance
            .checked_sub(1)
            .ok_or_else(|| LoxError::internal("'super' resolved at distance 0"))?;

        let Value::Class(superclass) =
            Environment::get_at(&self.environment, distance, "super", keyword.line)?
        else {
            return Err(LoxError::internal("'super' is not bound to a class"));
        };

        let Value::Instance(instance) =
            Environment::get_at(&self.environment, this_distance, "this", keyword.line)?
        else {
            return Err(LoxError::internal("'this' is not bound to an instance"));
        };

        let function = superclass.find_method(&method.lexeme).ok_or_else(|| {
            LoxError::runtime(
                method.line,
                format!("Undefined property '{}'.", method.lexeme),
            )
        })?;

        Ok(Value::Function(Rc::new(function.bind(instance, keyword.line)?)))
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        match self.locals.get(&id) {
            Some(distance) => {
                Environment::get_at(&self.environment, *distance, &name.lexeme, name.line)
            }
            None => self.globals.borrow().get(&name.lexeme, name.line),
        }
    }
}

fn number_operands(operator: &Token, left: &Value, right: &Value) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => {
            debug!(
                "Non-numeric operands for '{}': {} and {}",
                operator.lexeme,
                left.type_name(),
                right.type_name()
            );
            Err(LoxError::runtime(operator.line, "Operands must be numbers."))
        }
    }
}
