#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use rox::error::LoxError;
use rox::interpreter::Interpreter;
use rox::Lox;

/// An in-memory `print` sink that the test keeps a handle to.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn session() -> (Lox, SharedBuffer) {
    session_with(|interpreter| interpreter)
}

pub fn session_with(configure: impl FnOnce(Interpreter) -> Interpreter) -> (Lox, SharedBuffer) {
    let buffer = SharedBuffer::default();
    let interpreter = configure(Interpreter::with_output(Box::new(buffer.clone())));
    (Lox::with_interpreter(interpreter), buffer)
}

/// Run a program, returning what it printed.
pub fn run(source: &str) -> Result<String, (String, Vec<LoxError>)> {
    let (mut lox, buffer) = session();
    match lox.run(source) {
        Ok(()) => Ok(buffer.contents()),
        Err(errors) => Err((buffer.contents(), errors)),
    }
}

pub fn run_ok(source: &str) -> String {
    match run(source) {
        Ok(output) => output,
        Err((_, errors)) => {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            panic!("program failed: {:?}", messages)
        }
    }
}

/// Run a program expected to fail; returns output printed before the failure
/// and the error messages.
pub fn run_err(source: &str) -> (String, Vec<String>) {
    match run(source) {
        Ok(output) => panic!("program succeeded unexpectedly, printed {:?}", output),
        Err((output, errors)) => (output, errors.iter().map(ToString::to_string).collect()),
    }
}

/// The single runtime error a program stops with.
pub fn runtime_error(source: &str) -> rox::error::RuntimeError {
    let (mut lox, _) = session();
    let errors = lox.run(source).expect_err("expected a runtime error");
    assert_eq!(errors.len(), 1, "expected one error, got {:?}", errors);
    match errors.into_iter().next() {
        Some(LoxError::Runtime(e)) => e,
        other => panic!("expected runtime error, got {:?}", other),
    }
}
