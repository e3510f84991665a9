pub mod ast;
pub mod ast_printer;
pub mod callable;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod stack;
pub mod token;
pub mod value;

use log::{debug, info};

use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::parser::Parser;

/// A running Lox session: one interpreter fed any number of source inputs.
///
/// Each call to [`Lox::run`] scans, parses, resolves and interprets its input
/// against the same globals, so definitions persist from one input to the
/// next.  Diagnostics are returned to the caller instead of being latched in
/// shared state; a failed input leaves the session ready for the next one.
pub struct Lox {
    interpreter: Interpreter,
    next_id: u32,
}

impl Default for Lox {
    fn default() -> Self {
        Self::new()
    }
}

impl Lox {
    pub fn new() -> Self {
        Self::with_interpreter(Interpreter::new())
    }

    pub fn with_interpreter(interpreter: Interpreter) -> Self {
        Self {
            interpreter,
            next_id: 0,
        }
    }

    /// Run one source input.
    ///
    /// Lexical and syntax errors are reported together; resolution
    /// diagnostics are reported together and suppress execution; a runtime
    /// error stops the input at the failing statement.
    pub fn run(&mut self, source: &str) -> Result<(), Vec<LoxError>> {
        let (tokens, mut errors) = scanner::scan_tokens(source);

        let mut parser = Parser::with_first_id(&tokens, self.next_id);
        let parsed = parser.parse();
        self.next_id = parser.next_id();

        let statements = match parsed {
            Ok(statements) => statements,
            Err(parse_errors) => {
                errors.extend(parse_errors);
                return Err(errors);
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        let locals = resolver::resolve(&statements).into_result()?;
        debug!("Resolved {} local(s)", locals.len());
        self.interpreter.resolve(locals);

        self.interpreter
            .interpret(&statements)
            .map_err(|e| vec![LoxError::from(e)])?;

        info!("Input executed successfully");
        Ok(())
    }
}
