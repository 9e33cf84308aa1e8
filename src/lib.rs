use std::{cell::RefCell, rc::Rc};

pub mod ast;
pub mod parser;
mod span;
pub mod tokenizer;
pub mod tree_walk_interpreter;
pub mod type_checker;

pub use span::Span;

use self::{
    ast::Program,
    tree_walk_interpreter::{Interpreter, Value},
    type_checker::TypeChecker,
};

#[derive(Debug, thiserror::Error)]
pub enum InterpretError {
    #[error(transparent)]
    Tokenize(#[from] tokenizer::TokenizeError),
    #[error(transparent)]
    Syntax(#[from] parser::SyntaxError),
    #[error(transparent)]
    Type(#[from] type_checker::TypeError),
    #[error(transparent)]
    Execution(#[from] tree_walk_interpreter::ExecutionError),
}

pub fn parse(source: &str) -> Result<Program, InterpretError> {
    let tokens = tokenizer::tokenize(source)?;
    Ok(parser::program(&tokens)?)
}

/// Tokenizes, parses, type checks and evaluates `source`, writing printed
/// output to `stdout`. Returns the value of the last top-level statement.
pub fn run(source: &str, stdout: Rc<RefCell<dyn std::io::Write>>) -> Result<Value, InterpretError> {
    let program = parse(source)?;
    TypeChecker::new().check(&program)?;
    Ok(Interpreter::new(stdout).interpret(&program)?)
}
