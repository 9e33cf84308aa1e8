use std::rc::Rc;

use crate::ast::{Expression, Function};

use super::{environment::Environment, Flow, Interpreter, RuntimeError, Value};

#[derive(Debug, Clone)]
pub enum Callable {
    Builtin(Builtin),
    Function(Rc<Function>),
}

#[derive(Debug, Clone, Copy)]
pub enum Builtin {
    Print,
}

impl Callable {
    /// `print` always names the builtin. Any other name must have been defined
    /// by an earlier function definition.
    pub fn resolve(interpreter: &Interpreter, name: &str) -> Result<Callable, RuntimeError> {
        if name == "print" {
            return Ok(Callable::Builtin(Builtin::Print));
        }
        interpreter
            .functions
            .get(name)
            .cloned()
            .map(Callable::Function)
            .ok_or_else(|| RuntimeError::UndefinedFunction(name.to_string()))
    }

    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        args: &[Expression],
    ) -> Result<Value, RuntimeError> {
        match self {
            Callable::Builtin(Builtin::Print) => print(interpreter, args),
            Callable::Function(function) => call_function(function, interpreter, args),
        }
    }
}

fn evaluate_args(
    interpreter: &mut Interpreter,
    args: &[Expression],
) -> Result<Vec<Value>, RuntimeError> {
    args.iter()
        .map(|arg| interpreter.evaluate(arg))
        .collect::<Result<Vec<_>, _>>()
}

fn print(interpreter: &mut Interpreter, args: &[Expression]) -> Result<Value, RuntimeError> {
    let values = evaluate_args(interpreter, args)?;
    let line = values
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(interpreter.stdout.borrow_mut(), "{}", line)?;
    Ok(Value::None)
}

fn call_function(
    function: &Function,
    interpreter: &mut Interpreter,
    args: &[Expression],
) -> Result<Value, RuntimeError> {
    if args.len() != function.params.len() {
        return Err(RuntimeError::Arity {
            name: function.name.clone(),
            expected: function.params.len(),
            found: args.len(),
        });
    }

    let _span = tracing::trace_span!("call", name = %function.name).entered();
    let values = evaluate_args(interpreter, args)?;
    let environment = Environment::with_bindings(
        function
            .params
            .iter()
            .map(|param| param.name.clone())
            .zip(values),
    );

    let flow = interpreter.execute_in_environment(environment, |interpreter| {
        interpreter.execute_block(&function.body)
    })?;

    Ok(match flow {
        Flow::Return(value) | Flow::Normal(value) => value,
        Flow::Break | Flow::Continue => Value::None,
    })
}
