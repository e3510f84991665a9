//! The runtime object model: everything a Lox program can call, plus the
//! instances classes produce.
//!
//! Three kinds of value are callable: host functions ([`NativeFunction`]),
//! user functions and methods ([`LoxFunction`]), and classes ([`LoxClass`]),
//! which construct a [`LoxInstance`] when called.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::ast::{FunctionDecl, Name};
use crate::environment::{owns_object, release, EnvRef, Environment};
use crate::error::RuntimeError;
use crate::interpreter::{Completion, Interpreter};
use crate::value::Value;

/// Name of the method that runs when a class is called.
pub const INITIALIZER: &str = "init";

/// Something a Lox call expression can invoke.
///
/// The caller has already checked `arguments.len() == self.arity()`.
pub trait Callable {
    fn arity(&self) -> usize;

    /// `line` is the line of the call site, for errors raised by the callee
    /// itself.
    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
        line: usize,
    ) -> Result<Value, RuntimeError>;
}

// ───────────────────────────── native functions ─────────────────────────────

/// A function implemented by the host, e.g. `clock`.
pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub func: fn(&[Value]) -> Result<Value, String>,
}

impl Callable for NativeFunction {
    fn arity(&self) -> usize {
        self.arity
    }

    fn call(
        &self,
        _interpreter: &mut Interpreter,
        arguments: Vec<Value>,
        line: usize,
    ) -> Result<Value, RuntimeError> {
        debug!("Calling native function '{}'", self.name);

        (self.func)(&arguments).map_err(|message| RuntimeError::new(line, message))
    }
}

impl fmt::Display for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

// ───────────────────────────── user functions ───────────────────────────────

/// A closure: a declaration paired with the frame it was created in.
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: EnvRef,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: EnvRef, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    pub(crate) fn closure(&self) -> &EnvRef {
        &self.closure
    }

    /// A copy of this method whose closure binds `this` to `instance`.
    pub fn bind(&self, instance: Rc<LoxInstance>) -> LoxFunction {
        let environment: EnvRef = Environment::child_of(&self.closure);
        environment
            .borrow_mut()
            .define("this", Value::Instance(instance));

        LoxFunction::new(
            Rc::clone(&self.declaration),
            environment,
            self.is_initializer,
        )
    }
}

impl Callable for LoxFunction {
    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
        line: usize,
    ) -> Result<Value, RuntimeError> {
        debug!("Calling user-defined function '{}'", self.name());

        let environment: EnvRef = Environment::child_of(&self.closure);
        {
            let mut frame = environment.borrow_mut();
            for (param, argument) in self.declaration.params.iter().zip(arguments) {
                frame.define(&param.lexeme, argument);
            }
        }

        let completion: Completion =
            interpreter.execute_call(&self.declaration.body, environment, line)?;

        // An initializer always hands back its instance, whatever `return` did.
        if self.is_initializer {
            return Environment::get_at(&self.closure, 0, "this", line);
        }

        Ok(match completion {
            Completion::Return(value) => value,
            Completion::Normal => Value::Nil,
        })
    }
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

// ───────────────────────────── classes ──────────────────────────────────────

pub struct LoxClass {
    name: String,
    superclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    pub fn new(
        name: String,
        superclass: Option<Rc<LoxClass>>,
        methods: HashMap<String, Rc<LoxFunction>>,
    ) -> Self {
        Self {
            name,
            superclass,
            methods,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Search this class, then each superclass in turn.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        let mut class: &LoxClass = self;

        loop {
            if let Some(method) = class.methods.get(name) {
                return Some(Rc::clone(method));
            }

            match &class.superclass {
                Some(superclass) => class = superclass.as_ref(),
                None => return None,
            }
        }
    }
}

impl Callable for Rc<LoxClass> {
    fn arity(&self) -> usize {
        self.find_method(INITIALIZER)
            .map_or(0, |init| init.arity())
    }

    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
        line: usize,
    ) -> Result<Value, RuntimeError> {
        debug!("Constructing instance of '{}'", self.name);

        let instance: Rc<LoxInstance> = Rc::new(LoxInstance::new(Rc::clone(self)));

        if let Some(init) = self.find_method(INITIALIZER) {
            init.bind(Rc::clone(&instance))
                .call(interpreter, arguments, line)?;
        }

        Ok(Value::Instance(instance))
    }
}

impl fmt::Display for LoxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

// ───────────────────────────── instances ────────────────────────────────────

/// An object created by calling a class.  Fields spring into existence on
/// first assignment.
pub struct LoxInstance {
    class: Rc<LoxClass>,
    fields: RefCell<HashMap<String, Value>>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        Self {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    /// Property read: a field shadows a method of the same name.  Methods come
    /// back bound to `this`.
    pub fn get(this: &Rc<LoxInstance>, name: &Name) -> Result<Value, RuntimeError> {
        if let Some(value) = this.fields.borrow().get(&name.lexeme) {
            return Ok(value.clone());
        }

        match this.class.find_method(&name.lexeme) {
            Some(method) => Ok(Value::Function(Rc::new(method.bind(Rc::clone(this))))),
            None => Err(RuntimeError::new(
                name.line,
                format!("Undefined property '{}'.", name.lexeme),
            )),
        }
    }

    pub fn set(&self, name: &Name, value: Value) {
        self.fields.borrow_mut().insert(name.lexeme.clone(), value);
    }

    /// Hand the fields that own an object to the teardown worklist.
    pub(crate) fn detach(&self, values: &mut Vec<Value>) {
        values.extend(
            self.fields
                .borrow_mut()
                .drain()
                .map(|(_, value)| value)
                .filter(owns_object),
        );
    }
}

impl Drop for LoxInstance {
    fn drop(&mut self) {
        let mut values: Vec<Value> = Vec::new();
        self.detach(&mut values);
        release(values, Vec::new());
    }
}

impl fmt::Display for LoxInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} instance>", self.class.name)
    }
}
