//! Runtime variable frames.
//!
//! An [`Environment`] is one frame of name → value bindings plus an optional
//! link to its enclosing frame.  Frames are shared through [`EnvRef`]: a block
//! or call activation holds its frame, and so does every closure created while
//! that frame was current.  Writes through any holder are seen by all of them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::error::RuntimeError;
use crate::value::Value;

/// Shared handle to a frame.
pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    /// A root frame (the globals).
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: EnvRef) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Wrap a fresh frame chained to `enclosing` in a shared handle.
    pub fn child_of(enclosing: &EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            enclosing,
        ))))
    }

    /// Bind `name` in this frame only, replacing any previous binding here.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Look `name` up in this frame, then outward through the chain.
    pub fn get(&self, name: &str, line: usize) -> Result<Value, RuntimeError> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(RuntimeError::new(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    /// Overwrite the nearest existing binding of `name`.
    pub fn assign(&mut self, name: &str, value: Value, line: usize) -> Result<(), RuntimeError> {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(RuntimeError::new(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    /// Follow exactly `distance` enclosing links from `env`.
    pub fn ancestor(env: &EnvRef, distance: usize) -> EnvRef {
        let mut current: EnvRef = Rc::clone(env);

        for _ in 0..distance {
            let next: Option<EnvRef> = current.borrow().enclosing.clone();
            match next {
                Some(parent) => current = parent,
                None => break,
            }
        }

        current
    }

    /// Read `name` directly from the frame `distance` links out, with no
    /// outward search.
    pub fn get_at(
        env: &EnvRef,
        distance: usize,
        name: &str,
        line: usize,
    ) -> Result<Value, RuntimeError> {
        let frame: EnvRef = Self::ancestor(env, distance);
        let value: Option<Value> = frame.borrow().values.get(name).cloned();

        debug!("get_at({}, '{}') found={}", distance, name, value.is_some());

        value.ok_or_else(|| RuntimeError::new(line, format!("Undefined variable '{}'.", name)))
    }

    /// Write `name` directly into the frame `distance` links out.
    pub fn assign_at(
        env: &EnvRef,
        distance: usize,
        name: &str,
        value: Value,
        line: usize,
    ) -> Result<(), RuntimeError> {
        let frame: EnvRef = Self::ancestor(env, distance);
        let mut frame = frame.borrow_mut();

        match frame.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(RuntimeError::new(
                line,
                format!("Undefined variable '{}'.", name),
            )),
        }
    }

    /// Move this frame's contents into the teardown worklists.  Handles that
    /// are not the last owner of anything drop here as plain decrements.
    fn detach(&mut self, values: &mut Vec<Value>, frames: &mut Vec<EnvRef>) {
        values.extend(self.values.drain().map(|(_, value)| value).filter(owns_object));
        frames.extend(self.enclosing.take().filter(|frame| Rc::strong_count(frame) == 1));
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        let mut values: Vec<Value> = Vec::new();
        let mut frames: Vec<EnvRef> = Vec::new();
        self.detach(&mut values, &mut frames);
        release(values, frames);
    }
}

/// Whether dropping `value` would also drop the instance or function it
/// points to.
pub(crate) fn owns_object(value: &Value) -> bool {
    match value {
        Value::Instance(instance) => Rc::strong_count(instance) == 1,
        Value::Function(function) => Rc::strong_count(function) == 1,
        _ => false,
    }
}

/// Drop uniquely owned objects and frames one link at a time.
///
/// Each object is emptied into the worklist before it goes, so its own
/// destructor has nothing left to recurse into.  A long linked list of instances
/// or a long frame chain is freed in a loop on the current stack frame.
pub(crate) fn release(mut values: Vec<Value>, mut frames: Vec<EnvRef>) {
    loop {
        if let Some(frame) = frames.pop() {
            if Rc::strong_count(&frame) == 1 {
                frame.borrow_mut().detach(&mut values, &mut frames);
            }
        } else if let Some(value) = values.pop() {
            match &value {
                Value::Instance(instance) if Rc::strong_count(instance) == 1 => {
                    instance.detach(&mut values);
                }
                Value::Function(function) if Rc::strong_count(function) == 1 => {
                    frames.push(Rc::clone(function.closure()));
                }
                _ => {}
            }
        } else {
            break;
        }
    }
}
