//! Tree‑walking evaluator.
//!
//! Statements execute to a [`Completion`]: either they finish normally or a
//! `return` is carrying a value out to the nearest call boundary.  Runtime
//! faults travel separately as [`RuntimeError`], so `return` is never
//! mistaken for an error and vice versa.
//!
//! Variable accesses the resolver annotated go straight to the frame at the
//! recorded distance; everything else is a global looked up by name.

use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info, warn};

use crate::ast::{BinaryOp, Expr, ExprId, LiteralValue, LogicalOp, Stmt, UnaryOp};
use crate::callable::{Callable, LoxClass, LoxFunction, LoxInstance, NativeFunction, INITIALIZER};
use crate::environment::{EnvRef, Environment};
use crate::error::RuntimeError;
use crate::resolver::Locals;
use crate::stack::ensure_sufficient_stack;
use crate::value::Value;

/// Nested user calls allowed before [`RuntimeError::StackOverflow`].
pub const DEFAULT_MAX_DEPTH: usize = 2048;

/// Convenient alias for interpreter results.
pub type IResult<T> = Result<T, RuntimeError>;

/// How a statement finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Normal,
    Return(Value),
}

pub struct Interpreter {
    globals: EnvRef,
    environment: EnvRef,
    locals: Locals,
    out: Box<dyn Write>,
    depth: usize,
    max_depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Creates a new Interpreter printing to stdout, with native functions
    /// such as `clock` defined.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Creates a new Interpreter whose `print` statements write to `out`.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals: EnvRef = Rc::new(std::cell::RefCell::new(Environment::new()));

        debug!("Defining native function 'clock'");

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction(Rc::new(NativeFunction {
                name: "clock".to_string(),
                arity: 0,
                func: clock,
            })),
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            out,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Limit the depth of nested user function calls.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Record the resolver's binding distances.  Tables from successive
    /// resolve passes accumulate, which is what a REPL needs.
    pub fn resolve(&mut self, locals: Locals) {
        debug!("Merging {} resolved local(s)", locals.len());
        self.locals.extend(locals);
    }

    /// Interprets a list of statements (a "program").  The first runtime error
    /// aborts the remaining statements.
    pub fn interpret(&mut self, statements: &[Stmt]) -> IResult<()> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            match self.execute(stmt) {
                Ok(Completion::Normal) => {}
                Ok(Completion::Return(value)) => {
                    warn!("'return' escaped to top level with value {}", value);
                }
                Err(e) => {
                    // Output printed before the failure still reaches the sink.
                    if let Err(flush) = self.out.flush() {
                        warn!("Failed to flush output after runtime error: {}", flush);
                    }
                    return Err(e);
                }
            }
        }

        self.out.flush().map_err(|e| output_error(0, e))?;

        info!("Interpretation completed successfully");
        Ok(())
    }

    // ───────────────────────────── statements ─────────────────────────────

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> IResult<Completion> {
        ensure_sufficient_stack(|| self.execute_stmt(stmt))
    }

    fn execute_stmt(&mut self, stmt: &Stmt) -> IResult<Completion> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value).map_err(|e| output_error(expr.line(), e))?;
                debug!("Printed value: {}", value);
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Defining variable '{}'", name.lexeme);
                self.environment.borrow_mut().define(&name.lexeme, value);
            }

            Stmt::Block(statements) => {
                let environment: EnvRef = Environment::child_of(&self.environment);
                return self.execute_block(statements, environment);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    return self.execute(then_branch);
                } else if let Some(else_branch) = else_branch {
                    return self.execute(else_branch);
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Completion::Return(value) = self.execute(body)? {
                        return Ok(Completion::Return(value));
                    }
                }
            }

            Stmt::Function(declaration) => {
                debug!("Defining function '{}'", declaration.name.lexeme);
                // When defining a function, capture the current environment as the closure.
                let function = LoxFunction::new(
                    Rc::clone(declaration),
                    Rc::clone(&self.environment),
                    false,
                );
                self.environment
                    .borrow_mut()
                    .define(&declaration.name.lexeme, Value::Function(Rc::new(function)));
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);
                return Ok(Completion::Return(value));
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let superclass: Option<Rc<LoxClass>> = match superclass {
                    Some(expr) => match self.evaluate(expr)? {
                        Value::Class(class) => Some(class),
                        _ => {
                            return Err(RuntimeError::new(
                                expr.line(),
                                "Superclass must be a class.",
                            ))
                        }
                    },
                    None => None,
                };

                // Methods of a subclass close over a frame that binds `super`.
                let method_closure: EnvRef = match &superclass {
                    Some(class) => {
                        let environment: EnvRef = Environment::child_of(&self.environment);
                        environment
                            .borrow_mut()
                            .define("super", Value::Class(Rc::clone(class)));
                        environment
                    }
                    None => Rc::clone(&self.environment),
                };

                let table: HashMap<String, Rc<LoxFunction>> = methods
                    .iter()
                    .map(|method| {
                        let is_initializer: bool = method.name.lexeme == INITIALIZER;
                        let function = LoxFunction::new(
                            Rc::clone(method),
                            Rc::clone(&method_closure),
                            is_initializer,
                        );
                        (method.name.lexeme.clone(), Rc::new(function))
                    })
                    .collect();

                let class = LoxClass::new(name.lexeme.clone(), superclass, table);
                info!("Class '{}' defined", name.lexeme);

                self.environment
                    .borrow_mut()
                    .define(&name.lexeme, Value::Class(Rc::new(class)));
            }
        }

        Ok(Completion::Normal)
    }

    /// Run `statements` with `environment` as the current frame, restoring the
    /// previous frame on every exit path.
    pub fn execute_block(&mut self, statements: &[Stmt], environment: EnvRef) -> IResult<Completion> {
        let previous: EnvRef = std::mem::replace(&mut self.environment, environment);

        let result: IResult<Completion> = self.execute_sequence(statements);

        self.environment = previous;
        result
    }

    fn execute_sequence(&mut self, statements: &[Stmt]) -> IResult<Completion> {
        for stmt in statements {
            if let Completion::Return(value) = self.execute(stmt)? {
                return Ok(Completion::Return(value));
            }
        }

        Ok(Completion::Normal)
    }

    /// Run a function body in its call frame.  This is the boundary where a
    /// `return` completion stops propagating.
    pub(crate) fn execute_call(
        &mut self,
        body: &[Stmt],
        environment: EnvRef,
        line: usize,
    ) -> IResult<Completion> {
        if self.depth >= self.max_depth {
            debug!("Call depth {} exceeds limit", self.depth);
            return Err(RuntimeError::StackOverflow { line });
        }

        self.depth += 1;
        let result: IResult<Completion> = self.execute_block(body, environment);
        self.depth -= 1;

        result
    }

    // ───────────────────────────── expressions ────────────────────────────

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> IResult<Value> {
        ensure_sufficient_stack(|| self.evaluate_expr(expr))
    }

    fn evaluate_expr(&mut self, expr: &Expr) -> IResult<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary {
                operator,
                right,
                line,
            } => {
                let right: Value = self.evaluate(right)?;
                match operator {
                    UnaryOp::Not => Ok(Value::Bool(!right.is_truthy())),
                    UnaryOp::Negate => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        other => Err(RuntimeError::new(
                            *line,
                            format!("Operand of '-' must be a number, got {}.", other.type_name()),
                        )),
                    },
                }
            }

            Expr::Binary {
                left,
                operator,
                right,
                line,
            } => {
                let left: Value = self.evaluate(left)?;
                let right: Value = self.evaluate(right)?;
                binary(*operator, left, right, *line)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;
                let short_circuit: bool = match operator {
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::And => !left.is_truthy(),
                };

                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, &name.lexeme, name.line),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => Environment::assign_at(
                        &self.environment,
                        distance,
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
                arguments,
                line,
            } => {
                let callee: Value = self.evaluate(callee)?;

                let mut values: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.evaluate(argument)?);
                }

                let Some(callable) = callee.as_callable() else {
                    return Err(RuntimeError::new(
                        *line,
                        "Can only call functions and classes.",
                    ));
                };

                if values.len() != callable.arity() {
                    return Err(RuntimeError::new(
                        *line,
                        format!(
                            "Expected {} arguments but got {}.",
                            callable.arity(),
                            values.len()
                        ),
                    ));
                }

                debug!("Calling {} with {} argument(s)", callee, values.len());
                callable.call(self, values, *line)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => LoxInstance::get(&instance, name),
                _ => Err(RuntimeError::new(
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
                    return Err(RuntimeError::new(name.line, "Only instances have fields."));
                };

                let value: Value = self.evaluate(value)?;
                instance.set(name, value.clone());
                Ok(value)
            }

            Expr::This { id, line } => self.look_up_variable(*id, "this", *line),

            Expr::Super { id, line, method } => self.evaluate_super(*id, *line, &method.lexeme),
        }
    }

    /// `super.method`: search from the superclass of the class the enclosing
    /// method was declared in, then bind the result to the current `this`.
    fn evaluate_super(&mut self, id: ExprId, line: usize, method: &str) -> IResult<Value> {
        let distance: usize = self.locals.get(&id).copied().ok_or_else(|| {
            RuntimeError::new(line, "Can't use 'super' outside of a class.")
        })?;

        let Value::Class(superclass) = Environment::get_at(&self.environment, distance, "super", line)?
        else {
            return Err(RuntimeError::new(line, "Superclass must be a class."));
        };

        // `this` always lives in the frame just inside the one binding `super`.
        let this_distance: usize = distance.saturating_sub(1);
        let Value::Instance(instance) =
            Environment::get_at(&self.environment, this_distance, "this", line)?
        else {
            return Err(RuntimeError::new(line, "Only instances have properties."));
        };

        match superclass.find_method(method) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(instance)))),
            None => Err(RuntimeError::new(
                line,
                format!("Undefined property '{}'.", method),
            )),
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &str, line: usize) -> IResult<Value> {
        match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(&self.environment, distance, name, line),
            None => self.globals.borrow().get(name, line),
        }
    }
}

/// Arithmetic, comparison and equality on two evaluated operands.
fn binary(operator: BinaryOp, left: Value, right: Value, line: usize) -> IResult<Value> {
    match operator {
        BinaryOp::Equal => return Ok(Value::Bool(left == right)),
        BinaryOp::NotEqual => return Ok(Value::Bool(left != right)),
        BinaryOp::Add => {
            return match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                (a, b) => Err(RuntimeError::new(
                    line,
                    format!(
                        "Operands must be two numbers or two strings, got {} and {}.",
                        a.type_name(),
                        b.type_name()
                    ),
                )),
            }
        }
        _ => {}
    }

    let (Value::Number(a), Value::Number(b)) = (&left, &right) else {
        return Err(RuntimeError::new(
            line,
            format!(
                "Operands of '{}' must be numbers, got {} and {}.",
                operator.symbol(),
                left.type_name(),
                right.type_name()
            ),
        ));
    };
    let (a, b) = (*a, *b);

    Ok(match operator {
        BinaryOp::Subtract => Value::Number(a - b),
        BinaryOp::Multiply => Value::Number(a * b),
        BinaryOp::Divide => Value::Number(a / b),
        BinaryOp::Less => Value::Bool(a < b),
        BinaryOp::LessEqual => Value::Bool(a <= b),
        BinaryOp::Greater => Value::Bool(a > b),
        BinaryOp::GreaterEqual => Value::Bool(a >= b),
        BinaryOp::Add | BinaryOp::Equal | BinaryOp::NotEqual => unreachable!("handled above"),
    })
}

fn output_error(line: usize, e: io::Error) -> RuntimeError {
    RuntimeError::new(line, format!("Failed to write output: {}", e))
}

/// Native `clock()`: seconds since the Unix epoch.
fn clock(_args: &[Value]) -> Result<Value, String> {
    let micros: i64 = Utc::now().timestamp_micros();
    Ok(Value::Number(micros as f64 / 1_000_000.0))
}
