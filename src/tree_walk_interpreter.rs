mod callable;
mod environment;
mod value;

use std::{cell::RefCell, fmt::Debug, rc::Rc};

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::ast::{
    Expression, Function, InfixOperator, Literal, Number, Program, Statement, StringPart,
};

use self::{callable::Callable, environment::Environment};

pub use self::value::Value;

/// Outcome of executing a statement or block.
#[derive(Debug, Clone, PartialEq)]
enum Flow {
    Normal(Value),
    Break,
    Continue,
    Return(Value),
}

pub struct Interpreter {
    functions: FxHashMap<String, Rc<Function>>,
    environment: Environment,
    stdout: Rc<RefCell<dyn std::io::Write>>,
}

impl Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("environment", &self.environment)
            .finish()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Rc::new(RefCell::new(std::io::stdout())))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{kind}\nWhile executing: {current_statement}")]
pub struct ExecutionError {
    pub kind: RuntimeError,
    pub current_statement: Statement,
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),
    #[error("Undefined function: {0}")]
    UndefinedFunction(String),
    #[error("Invalid function call: {name} called with {found} arguments, expected {expected}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Undefined method: {0}")]
    UndefinedMethod(String),
    #[error("Method {method} is not available on {receiver}")]
    InvalidReceiver { method: String, receiver: Value },
    #[error("Index {index} out of range for list of length {length}")]
    IndexOutOfRange { index: i64, length: usize },
    #[error("List index must be an integer, got {0}")]
    InvalidIndex(Value),
    #[error("Cannot index into {0}")]
    NotIndexable(Value),
    #[error("Invalid operands for {op}: {left} and {right}")]
    InvalidOperands {
        op: InfixOperator,
        left: Value,
        right: Value,
    },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Integer overflow: {left} {op} {right}")]
    IntegerOverflow {
        op: InfixOperator,
        left: i64,
        right: i64,
    },
}

impl Interpreter {
    pub fn new(stdout: Rc<RefCell<dyn std::io::Write>>) -> Self {
        Self {
            functions: FxHashMap::default(),
            environment: Environment::default(),
            stdout,
        }
    }

    /// Runs the program's top-level statements in order and returns the value
    /// of the last one. A top-level `return` ends the run with its value.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn interpret(&mut self, program: &Program) -> Result<Value, ExecutionError> {
        let mut result = Value::None;
        for stmt in program.0.iter() {
            match self.execute(stmt) {
                Ok(Flow::Normal(value)) => result = value,
                Ok(Flow::Return(value)) => return Ok(value),
                // Only reachable without the type checker.
                Ok(Flow::Break | Flow::Continue) => return Ok(result),
                Err(kind) => {
                    return Err(ExecutionError {
                        kind,
                        current_statement: stmt.clone(),
                    })
                }
            }
        }

        Ok(result)
    }

    fn execute(&mut self, stmt: &Statement) -> Result<Flow, RuntimeError> {
        let flow = match stmt {
            Statement::Expression(expression) => Flow::Normal(self.evaluate(expression)?),
            Statement::VarDeclaration(_, name, expression) => {
                let value = self.evaluate(expression)?;
                self.environment.set(name.clone(), value);
                Flow::Normal(Value::None)
            }
            Statement::Assignment(name, expression) => {
                let value = self.evaluate(expression)?;
                self.environment.set(name.clone(), value.clone());
                Flow::Normal(value)
            }
            Statement::IndexAssignment { name, index, value } => {
                let list = self.lookup(name)?;
                let index = self.evaluate(index)?;
                let value = self.evaluate(value)?;
                let items = match list {
                    Value::List(items) => items,
                    other => return Err(RuntimeError::NotIndexable(other)),
                };
                let mut items = items.borrow_mut();
                let slot = position(&index, items.len())?;
                items[slot] = value.clone();
                Flow::Normal(value)
            }
            Statement::FunctionDefinition(function) => {
                debug!(name = %function.name, "defining function");
                self.functions
                    .insert(function.name.clone(), Rc::new(function.clone()));
                Flow::Normal(Value::None)
            }
            Statement::If(condition, then_branch, else_branch) => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute_block(then_branch)?
                } else if let Some(else_branch) = else_branch {
                    self.execute_block(else_branch)?
                } else {
                    Flow::Normal(Value::None)
                }
            }
            Statement::While(condition, body) => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute_block(body)? {
                        Flow::Normal(_) => {}
                        Flow::Continue => trace!("continue"),
                        Flow::Break => {
                            trace!("break");
                            break;
                        }
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Flow::Normal(Value::None)
            }
            Statement::Break => Flow::Break,
            Statement::Continue => Flow::Continue,
            Statement::Return(expression) => Flow::Return(match expression {
                Some(expression) => self.evaluate(expression)?,
                None => Value::None,
            }),
        };

        Ok(flow)
    }

    /// Executes statements in order, stopping at the first one that does not
    /// complete normally.
    fn execute_block(&mut self, statements: &[Statement]) -> Result<Flow, RuntimeError> {
        let mut last = Value::None;
        for statement in statements.iter() {
            match self.execute(statement)? {
                Flow::Normal(value) => last = value,
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal(last))
    }

    fn execute_in_environment<T>(
        &mut self,
        environment: Environment,
        f: impl FnOnce(&mut Self) -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        let prev = std::mem::replace(&mut self.environment, environment);
        let result = f(self);
        self.environment = prev;
        result
    }

    fn lookup(&self, name: &str) -> Result<Value, RuntimeError> {
        self.environment
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UndefinedVariable(name.to_string()))
    }

    fn evaluate(&mut self, expression: &Expression) -> Result<Value, RuntimeError> {
        match expression {
            Expression::Literal(literal) => Ok(match literal {
                Literal::Number(Number::Integer(n)) => Value::Int(*n),
                Literal::Number(Number::Decimal(n)) => Value::Float(*n),
                Literal::String(s) => Value::Str(s.clone()),
                Literal::Boolean(b) => Value::Bool(*b),
            }),
            Expression::Interpolated(parts) => {
                let mut text = String::new();
                for part in parts.iter() {
                    match part {
                        StringPart::Text(s) => text.push_str(s),
                        StringPart::Expression(expression) => {
                            text.push_str(&self.evaluate(expression)?.to_string())
                        }
                    }
                }
                Ok(Value::Str(text))
            }
            Expression::Identifier(name) => self.lookup(name),
            Expression::Grouping(x) => self.evaluate(x),
            Expression::Binary(a, op, b) => {
                let a = self.evaluate(a)?;
                let b = self.evaluate(b)?;
                apply(*op, a, b)
            }
            Expression::List(items) => {
                let items = items
                    .iter()
                    .map(|item| self.evaluate(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::list(items))
            }
            Expression::Index(list, index) => {
                let list = self.evaluate(list)?;
                let index = self.evaluate(index)?;
                let items = match list {
                    Value::List(items) => items,
                    other => return Err(RuntimeError::NotIndexable(other)),
                };
                let items = items.borrow();
                let slot = position(&index, items.len())?;
                Ok(items[slot].clone())
            }
            Expression::MethodCall {
                receiver,
                method,
                args,
            } => {
                let receiver = self.evaluate(receiver)?;
                if method != "length" {
                    return Err(RuntimeError::UndefinedMethod(method.clone()));
                }
                if !args.is_empty() {
                    return Err(RuntimeError::Arity {
                        name: method.clone(),
                        expected: 0,
                        found: args.len(),
                    });
                }
                let length = match &receiver {
                    Value::List(items) => items.borrow().len(),
                    Value::Str(s) => s.chars().count(),
                    _ => {
                        return Err(RuntimeError::InvalidReceiver {
                            method: method.clone(),
                            receiver,
                        })
                    }
                };
                Ok(Value::Int(length as i64))
            }
            Expression::FunctionCall(name, args) => {
                let callable = Callable::resolve(self, name)?;
                callable.call(self, args)
            }
        }
    }
}

/// Bounds-checked slot for `index` in a list of `length` elements.
fn position(index: &Value, length: usize) -> Result<usize, RuntimeError> {
    let Value::Int(index) = index else {
        return Err(RuntimeError::InvalidIndex(index.clone()));
    };
    usize::try_from(*index)
        .ok()
        .filter(|slot| *slot < length)
        .ok_or(RuntimeError::IndexOutOfRange {
            index: *index,
            length,
        })
}

fn apply(op: InfixOperator, left: Value, right: Value) -> Result<Value, RuntimeError> {
    match op {
        InfixOperator::Plus
        | InfixOperator::Minus
        | InfixOperator::Multiply
        | InfixOperator::Divide => arithmetic(op, left, right),
        InfixOperator::Equal => Ok(Value::Bool(left == right)),
        InfixOperator::NotEqual => Ok(Value::Bool(left != right)),
        InfixOperator::LessThan
        | InfixOperator::LessThanOrEqual
        | InfixOperator::GreaterThan
        | InfixOperator::GreaterThanOrEqual => {
            let Some(ordering) = left.compare(&right) else {
                return Err(RuntimeError::InvalidOperands { op, left, right });
            };
            Ok(Value::Bool(match op {
                InfixOperator::LessThan => ordering.is_lt(),
                InfixOperator::LessThanOrEqual => ordering.is_le(),
                InfixOperator::GreaterThan => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        InfixOperator::And | InfixOperator::Or => match (&left, &right) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(if op == InfixOperator::And {
                *a && *b
            } else {
                *a || *b
            })),
            _ => Err(RuntimeError::InvalidOperands { op, left, right }),
        },
    }
}

fn arithmetic(op: InfixOperator, left: Value, right: Value) -> Result<Value, RuntimeError> {
    if let (Value::Int(a), Value::Int(b)) = (&left, &right) {
        let (a, b) = (*a, *b);
        let result = match op {
            InfixOperator::Plus => a.checked_add(b),
            InfixOperator::Minus => a.checked_sub(b),
            InfixOperator::Multiply => a.checked_mul(b),
            _ => {
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                a.checked_div(b)
            }
        };
        return result.map(Value::Int).ok_or(RuntimeError::IntegerOverflow {
            op,
            left: a,
            right: b,
        });
    }

    let Some((a, b)) = left.numeric_pair(&right) else {
        return Err(RuntimeError::InvalidOperands { op, left, right });
    };
    Ok(Value::Float(match op {
        InfixOperator::Plus => a + b,
        InfixOperator::Minus => a - b,
        InfixOperator::Multiply => a * b,
        _ => a / b,
    }))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{parser, tokenizer};

    fn run(source: &str) -> (Result<Value, ExecutionError>, String) {
        let tokens = tokenizer::tokenize(source).expect("tokenize");
        let program = parser::program(&tokens).expect("parse");
        let stdout = Rc::new(RefCell::new(Vec::<u8>::new()));
        let result = Interpreter::new(stdout.clone()).interpret(&program);
        let output = String::from_utf8(stdout.borrow().clone()).expect("utf8");
        (result, output)
    }

    fn value(source: &str) -> Value {
        run(source).0.expect("program should run")
    }

    fn error(source: &str) -> RuntimeError {
        run(source).0.expect_err("program should fail").kind
    }

    #[test]
    fn test_final_value() {
        assert_eq!(value("1 + 2"), Value::Int(3));
        assert_eq!(value("int x = 4"), Value::None);
        assert_eq!(value("int x = 4\nx = x * 2"), Value::Int(8));
        assert_eq!(value(""), Value::None);
    }

    #[test]
    fn test_flat_precedence() {
        assert_eq!(value("1 + 2 * 3"), Value::Int(9));
        assert_eq!(value("1 + (2 * 3)"), Value::Int(7));
        assert_eq!(value("7 / 2"), Value::Int(3));
        assert_eq!(value("1.5 + 1"), Value::Float(2.5));
    }

    #[test]
    fn test_arithmetic_errors() {
        assert!(matches!(error("1 / 0"), RuntimeError::DivisionByZero));
        assert!(matches!(
            error("9223372036854775807 + 1"),
            RuntimeError::IntegerOverflow { .. }
        ));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(value("\"a\" < \"b\""), Value::Bool(true));
        assert_eq!(value("[1, 2] == [1, 2]"), Value::Bool(true));
        assert_eq!(value("1 != 1"), Value::Bool(false));
        assert!(matches!(
            error("[1] < [2]"),
            RuntimeError::InvalidOperands {
                op: InfixOperator::LessThan,
                ..
            }
        ));
    }

    #[test]
    fn test_print() {
        let (result, output) = run("print(1, \"two\", [\"three\"], true)\nprint()");
        assert_eq!(result.expect("run"), Value::None);
        assert_eq!(output, "1 two [\"three\"] true\n\n");
    }

    #[test]
    fn test_while_with_break_and_continue() {
        let source = "\
int i = 0
while i < 6
    i = i + 1
    if i == 3
        continue
    if i == 5
        break
    print(i)
";
        let (result, output) = run(source);
        assert!(result.is_ok());
        assert_eq!(output, "1\n2\n4\n");
    }

    #[test]
    fn test_if_value() {
        assert_eq!(value("if false\n    1\nelse\n    2\n"), Value::Int(2));
        assert_eq!(value("if false\n    1\n"), Value::None);
    }

    #[test]
    fn test_function_calls() {
        let source = "\
int add(int a, int b)
    return a + b
add(2, 3)
";
        assert_eq!(value(source), Value::Int(5));

        let implicit = "\
int double(int a)
    a * 2
double(4)
";
        assert_eq!(value(implicit), Value::Int(8));
    }

    #[test]
    fn test_return_inside_loop_leaves_function() {
        let source = "\
int first_over(list<int> xs, int limit)
    int i = 0
    while i < xs.length()
        if xs[i] > limit
            return xs[i]
        i = i + 1
    return 0
first_over([1, 5, 9], 4)
";
        assert_eq!(value(source), Value::Int(5));
    }

    #[test]
    fn test_calls_do_not_see_caller_locals() {
        let source = "\
int secret = 1
int peek()
    return secret
peek()
";
        assert!(matches!(
            error(source),
            RuntimeError::UndefinedVariable(name) if name == "secret"
        ));
    }

    #[test]
    fn test_call_errors() {
        assert!(matches!(
            error("missing(1)"),
            RuntimeError::UndefinedFunction(name) if name == "missing"
        ));
        let source = "int one(int a)\n    return a\none(1, 2)";
        assert!(matches!(
            error(source),
            RuntimeError::Arity {
                expected: 1,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_arity_checked_before_arguments() {
        let source = "\
int one(int a)
    return a
one(print(\"side effect\"), 2)
";
        let (result, output) = run(source);
        assert!(result.is_err());
        assert_eq!(output, "");
    }

    #[test]
    fn test_lists() {
        assert_eq!(value("list<int> xs = [1, 2, 3]\nxs[1]"), Value::Int(2));
        assert_eq!(
            value("list<int> xs = [1, 2]\nxs[0] = 7\nxs"),
            Value::list(vec![Value::Int(7), Value::Int(2)])
        );
        assert_eq!(
            value("list<int> a = [1]\nlist<int> b = a\nb[0] = 5\na[0]"),
            Value::Int(5)
        );
        assert!(matches!(
            error("list<int> xs = [1]\nxs[1]"),
            RuntimeError::IndexOutOfRange {
                index: 1,
                length: 1
            }
        ));
        assert!(matches!(
            error("list<int> xs = [1]\nxs[0 - 1] = 3"),
            RuntimeError::IndexOutOfRange { index: -1, .. }
        ));
    }

    #[test]
    fn test_methods() {
        assert_eq!(value("[1, 2, 3].length()"), Value::Int(3));
        assert_eq!(value("\"héllo\".length()"), Value::Int(5));
        assert!(matches!(
            error("[1].push(2)"),
            RuntimeError::UndefinedMethod(name) if name == "push"
        ));
        assert!(matches!(
            error("int x = 1\nx.length()"),
            RuntimeError::InvalidReceiver { .. }
        ));
    }

    #[test]
    fn test_interpolation() {
        assert_eq!(
            value("int x = 2\n\"x is {x}, doubled {x * 2}\""),
            Value::Str("x is 2, doubled 4".to_string())
        );
    }

    #[test]
    fn test_error_reports_statement() {
        let err = run("int x = 1\nprint(y)").0.expect_err("should fail");
        assert_eq!(err.current_statement.to_string(), "print(y)");
        assert!(err.to_string().starts_with("Undefined variable: y"));
    }

    #[test]
    fn test_top_level_return_ends_program() {
        let (result, output) = run("print(1)\nreturn 5\nprint(2)");
        assert_eq!(result.expect("run"), Value::Int(5));
        assert_eq!(output, "1\n");
    }
}
