use rustc_hash::FxHashMap;
use tracing::debug;

use crate::ast::{Expression, Function, InfixOperator, Literal, Program, Statement, StringPart, Type};

#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub parameters: Vec<Type>,
    pub return_type: Type,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TypeError {
    #[error("Type mismatch: {0}")]
    Mismatch(#[from] TypeMismatch),
    #[error("Undefined symbol: {0}")]
    UndefinedSymbol(#[from] UndefinedSymbol),
    #[error("{0}")]
    ControlFlow(#[from] ControlFlowError),
    #[error("Function {0} is already defined")]
    FunctionRedefinition(String),
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TypeMismatch {
    #[error("variable {name} declared as {expected} but initialized with {found}")]
    Declaration {
        name: String,
        expected: Type,
        found: Type,
    },
    #[error("cannot assign {found} to {name} of type {expected}")]
    Assignment {
        name: String,
        expected: Type,
        found: Type,
    },
    #[error("cannot store {found} in {name} of type {list}")]
    IndexAssignment { name: String, list: Type, found: Type },
    #[error("{name} expects argument {position} to be {expected}, got {found}")]
    Argument {
        name: String,
        position: usize,
        expected: Type,
        found: Type,
    },
    #[error("{name} expects {expected} arguments, got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("function returns {expected} but return gives {found}")]
    Return { expected: Type, found: Type },
    #[error("condition must be bool, got {0}")]
    Condition(Type),
    #[error("operator '{op}' cannot be applied to {left} and {right}")]
    Operands {
        op: InfixOperator,
        left: Type,
        right: Type,
    },
    #[error("list elements must share one type, found {first} and {other}")]
    HeterogeneousList { first: Type, other: Type },
    #[error("{0} cannot be indexed")]
    NotIndexable(Type),
    #[error("list index must be int, got {0}")]
    Index(Type),
    #[error("method {method} is not available on {receiver}")]
    Receiver { method: String, receiver: Type },
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum UndefinedSymbol {
    #[error("variable {0}")]
    Variable(String),
    #[error("function {0}")]
    Function(String),
    #[error("method {0}")]
    Method(String),
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ControlFlowError {
    #[error("break outside of a loop")]
    BreakOutsideLoop,
    #[error("continue outside of a loop")]
    ContinueOutsideLoop,
    #[error("return outside of a function")]
    ReturnOutsideFunction,
    #[error("function {0} can finish without producing a value")]
    MissingReturn(String),
}

/// Single pass static checker. Variables live in a flat per-function scope;
/// function signatures are global once their definition has been checked.
#[derive(Debug, Default, Clone)]
pub struct TypeChecker {
    scope: FxHashMap<String, Type>,
    signatures: FxHashMap<String, Signature>,
    return_type: Option<Type>,
    loop_depth: usize,
}

impl TypeChecker {
    pub fn new() -> TypeChecker {
        TypeChecker::default()
    }

    #[tracing::instrument(level = "debug", skip_all, fields(statements = program.0.len()))]
    pub fn check(&mut self, program: &Program) -> Result<(), TypeError> {
        for statement in &program.0 {
            self.check_statement(statement)?;
        }
        Ok(())
    }

    pub fn signature(&self, name: &str) -> Option<&Signature> {
        self.signatures.get(name)
    }

    fn check_block(&mut self, statements: &[Statement]) -> Result<(), TypeError> {
        for statement in statements {
            self.check_statement(statement)?;
        }
        Ok(())
    }

    fn check_statement(&mut self, statement: &Statement) -> Result<(), TypeError> {
        match statement {
            Statement::VarDeclaration(declared, name, expression) => {
                let found = self.check_expression(expression)?;
                if !declared.accepts(&found) {
                    return Err(TypeMismatch::Declaration {
                        name: name.clone(),
                        expected: declared.clone(),
                        found,
                    }
                    .into());
                }
                self.scope.insert(name.clone(), declared.clone());
            }
            Statement::Assignment(name, expression) => {
                let expected = self.lookup(name)?.clone();
                let found = self.check_expression(expression)?;
                if !expected.accepts(&found) {
                    return Err(TypeMismatch::Assignment {
                        name: name.clone(),
                        expected,
                        found,
                    }
                    .into());
                }
            }
            Statement::IndexAssignment { name, index, value } => {
                let list = self.lookup(name)?.clone();
                let Type::List(element) = list.clone() else {
                    return Err(TypeMismatch::NotIndexable(list).into());
                };
                self.check_index(index)?;
                let found = self.check_expression(value)?;
                if !element.accepts(&found) {
                    return Err(TypeMismatch::IndexAssignment {
                        name: name.clone(),
                        list,
                        found,
                    }
                    .into());
                }
            }
            Statement::FunctionDefinition(function) => self.check_function(function)?,
            Statement::If(condition, then_branch, else_branch) => {
                self.check_condition(condition)?;
                self.check_block(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.check_block(else_branch)?;
                }
            }
            Statement::While(condition, body) => {
                self.check_condition(condition)?;
                self.loop_depth += 1;
                let result = self.check_block(body);
                self.loop_depth -= 1;
                result?;
            }
            Statement::Break => {
                if self.loop_depth == 0 {
                    return Err(ControlFlowError::BreakOutsideLoop.into());
                }
            }
            Statement::Continue => {
                if self.loop_depth == 0 {
                    return Err(ControlFlowError::ContinueOutsideLoop.into());
                }
            }
            Statement::Return(expression) => {
                let Some(expected) = self.return_type.clone() else {
                    return Err(ControlFlowError::ReturnOutsideFunction.into());
                };
                let found = match expression {
                    Some(expression) => self.check_expression(expression)?,
                    None => Type::Void,
                };
                if !expected.accepts(&found) {
                    return Err(TypeMismatch::Return { expected, found }.into());
                }
            }
            Statement::Expression(expression) => {
                self.check_expression(expression)?;
            }
        }

        Ok(())
    }

    fn check_function(&mut self, function: &Function) -> Result<(), TypeError> {
        if self.signatures.contains_key(&function.name) {
            return Err(TypeError::FunctionRedefinition(function.name.clone()));
        }

        let signature = Signature {
            parameters: function.params.iter().map(|p| p.ty.clone()).collect(),
            return_type: function.return_type.clone(),
        };
        debug!(name = %function.name, ?signature, "registered function signature");
        // Registered before the body so recursive calls resolve.
        self.signatures.insert(function.name.clone(), signature);

        let scope = function
            .params
            .iter()
            .map(|p| (p.name.clone(), p.ty.clone()))
            .collect();

        let result = self.in_function_scope(scope, function.return_type.clone(), |checker| {
            checker.check_block(&function.body)?;
            if function.return_type != Type::Void
                && !checker.yields(&function.body, &function.return_type)?
            {
                return Err(ControlFlowError::MissingReturn(function.name.clone()).into());
            }
            Ok(())
        });
        if result.is_err() {
            self.signatures.remove(&function.name);
        }
        result
    }

    /// Runs `f` with a fresh scope holding only `scope`, restoring the
    /// enclosing scope, return type and loop depth afterwards.
    fn in_function_scope<T>(
        &mut self,
        scope: FxHashMap<String, Type>,
        return_type: Type,
        f: impl FnOnce(&mut Self) -> Result<T, TypeError>,
    ) -> Result<T, TypeError> {
        let enclosing_scope = std::mem::replace(&mut self.scope, scope);
        let enclosing_return = self.return_type.replace(return_type);
        let enclosing_depth = std::mem::take(&mut self.loop_depth);

        let result = f(self);

        self.scope = enclosing_scope;
        self.return_type = enclosing_return;
        self.loop_depth = enclosing_depth;
        result
    }

    /// Whether running `statements` to the end always leaves a value of
    /// `expected` as the call result.
    fn yields(&self, statements: &[Statement], expected: &Type) -> Result<bool, TypeError> {
        Ok(match statements.last() {
            Some(Statement::Return(_)) => true,
            Some(Statement::Expression(expression) | Statement::Assignment(_, expression)) => {
                expected.accepts(&self.check_expression(expression)?)
            }
            Some(Statement::If(_, then_branch, Some(else_branch))) => {
                self.yields(then_branch, expected)? && self.yields(else_branch, expected)?
            }
            _ => false,
        })
    }

    fn lookup(&self, name: &str) -> Result<&Type, TypeError> {
        self.scope
            .get(name)
            .ok_or_else(|| UndefinedSymbol::Variable(name.to_string()).into())
    }

    fn check_condition(&self, condition: &Expression) -> Result<(), TypeError> {
        match self.check_expression(condition)? {
            Type::Bool => Ok(()),
            other => Err(TypeMismatch::Condition(other).into()),
        }
    }

    fn check_index(&self, index: &Expression) -> Result<(), TypeError> {
        match self.check_expression(index)? {
            Type::Int => Ok(()),
            other => Err(TypeMismatch::Index(other).into()),
        }
    }

    pub fn check_expression(&self, expression: &Expression) -> Result<Type, TypeError> {
        let ty = match expression {
            Expression::Literal(Literal::Number(_)) => Type::Int,
            Expression::Literal(Literal::String(_)) => Type::Str,
            Expression::Literal(Literal::Boolean(_)) => Type::Bool,
            Expression::Interpolated(parts) => {
                for part in parts {
                    if let StringPart::Expression(expression) = part {
                        self.check_expression(expression)?;
                    }
                }
                Type::Str
            }
            Expression::Identifier(name) => self.lookup(name)?.clone(),
            Expression::Grouping(expression) => self.check_expression(expression)?,
            Expression::Binary(left, op, right) => {
                let left = self.check_expression(left)?;
                let right = self.check_expression(right)?;
                self.check_operator(*op, left, right)?
            }
            Expression::List(items) => {
                let mut element = Type::Unknown;
                for item in items {
                    let item = self.check_expression(item)?;
                    element = element.unify(&item).ok_or_else(|| {
                        TypeMismatch::HeterogeneousList {
                            first: element.clone(),
                            other: item.clone(),
                        }
                    })?;
                }
                Type::list_of(element)
            }
            Expression::Index(list, index) => {
                let list = self.check_expression(list)?;
                self.check_index(index)?;
                match list {
                    // Elements of an empty literal have no type to read.
                    Type::List(element) if *element != Type::Unknown => *element,
                    other => return Err(TypeMismatch::NotIndexable(other).into()),
                }
            }
            Expression::MethodCall {
                receiver,
                method,
                args,
            } => {
                let receiver = self.check_expression(receiver)?;
                if method != "length" {
                    return Err(UndefinedSymbol::Method(method.clone()).into());
                }
                if !matches!(receiver, Type::List(_) | Type::Str) {
                    return Err(TypeMismatch::Receiver {
                        method: method.clone(),
                        receiver,
                    }
                    .into());
                }
                if !args.is_empty() {
                    return Err(TypeMismatch::Arity {
                        name: method.clone(),
                        expected: 0,
                        found: args.len(),
                    }
                    .into());
                }
                Type::Int
            }
            Expression::FunctionCall(name, args) => self.check_call(name, args)?,
        };

        Ok(ty)
    }

    fn check_call(&self, name: &str, args: &[Expression]) -> Result<Type, TypeError> {
        if name == "print" {
            for arg in args {
                self.check_expression(arg)?;
            }
            return Ok(Type::Void);
        }

        let signature = self
            .signatures
            .get(name)
            .ok_or_else(|| UndefinedSymbol::Function(name.to_string()))?;

        if signature.parameters.len() != args.len() {
            return Err(TypeMismatch::Arity {
                name: name.to_string(),
                expected: signature.parameters.len(),
                found: args.len(),
            }
            .into());
        }

        for (position, (expected, arg)) in signature.parameters.iter().zip(args).enumerate() {
            let found = self.check_expression(arg)?;
            if !expected.accepts(&found) {
                return Err(TypeMismatch::Argument {
                    name: name.to_string(),
                    position: position + 1,
                    expected: expected.clone(),
                    found,
                }
                .into());
            }
        }

        Ok(signature.return_type.clone())
    }

    fn check_operator(
        &self,
        op: InfixOperator,
        left: Type,
        right: Type,
    ) -> Result<Type, TypeError> {
        let valid = if op.is_arithmetic() {
            left == Type::Int && right == Type::Int
        } else if op.is_comparison() {
            left.accepts(&right)
        } else {
            left == Type::Bool && right == Type::Bool
        };

        if !valid {
            return Err(TypeMismatch::Operands { op, left, right }.into());
        }
        Ok(if op.is_arithmetic() { Type::Int } else { Type::Bool })
    }
}
