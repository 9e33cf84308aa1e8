use std::fmt::Display;

#[derive(Debug, Clone, PartialEq)]
pub struct Program(pub Vec<Statement>);

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    VarDeclaration(Type, String, Expression),
    Assignment(String, Expression),
    IndexAssignment {
        name: String,
        index: Expression,
        value: Expression,
    },
    FunctionDefinition(Function),
    If(Expression, Vec<Statement>, Option<Vec<Statement>>),
    While(Expression, Vec<Statement>),
    Break,
    Continue,
    Return(Option<Expression>),
    Expression(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Parameter>,
    pub return_type: Type,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub ty: Type,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Interpolated(Vec<StringPart>),
    Identifier(String),
    Grouping(Box<Expression>),
    Binary(Box<Expression>, InfixOperator, Box<Expression>),
    List(Vec<Expression>),
    Index(Box<Expression>, Box<Expression>),
    MethodCall {
        receiver: Box<Expression>,
        method: String,
        args: Vec<Expression>,
    },
    FunctionCall(String, Vec<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StringPart {
    Text(String),
    Expression(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(Number),
    String(String),
    Boolean(bool),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Decimal(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Plus,
    Minus,
    Multiply,
    Divide,
    And,
    Or,
}

impl InfixOperator {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            InfixOperator::Plus
                | InfixOperator::Minus
                | InfixOperator::Multiply
                | InfixOperator::Divide
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            InfixOperator::Equal
                | InfixOperator::NotEqual
                | InfixOperator::LessThan
                | InfixOperator::LessThanOrEqual
                | InfixOperator::GreaterThan
                | InfixOperator::GreaterThanOrEqual
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, InfixOperator::And | InfixOperator::Or)
    }
}

/// Static type of an expression or binding.
///
/// `Unknown` only appears as the element of a list whose contents could not
/// be resolved, such as the empty literal `[]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Int,
    Bool,
    Str,
    Void,
    List(Box<Type>),
    Unknown,
}

impl Type {
    pub fn list_of(element: Type) -> Type {
        Type::List(Box::new(element))
    }

    /// Merges two types, resolving unknown list elements from the other side.
    /// Returns `None` when the types are incompatible.
    pub fn unify(&self, other: &Type) -> Option<Type> {
        match (self, other) {
            (Type::List(a), Type::List(b)) => a.unify(b).map(Type::list_of),
            (Type::Unknown, t) | (t, Type::Unknown) => Some(t.clone()),
            (a, b) if a == b => Some(a.clone()),
            _ => None,
        }
    }

    pub fn accepts(&self, other: &Type) -> bool {
        self.unify(other).is_some()
    }

    /// Initializer used by a declaration that has none. `void` has no default.
    pub fn default_value(&self) -> Option<Expression> {
        match self {
            Type::Int => Some(Expression::Literal(Literal::Number(Number::Integer(0)))),
            Type::Str => Some(Expression::Literal(Literal::String(String::new()))),
            Type::Bool => Some(Expression::Literal(Literal::Boolean(false))),
            Type::List(_) => Some(Expression::List(Vec::new())),
            Type::Void | Type::Unknown => None,
        }
    }
}

fn write_block(f: &mut std::fmt::Formatter<'_>, statements: &[Statement]) -> std::fmt::Result {
    for statement in statements {
        for line in statement.to_string().lines() {
            writeln!(f, "    {line}")?;
        }
    }
    Ok(())
}

fn write_list<T: Display>(f: &mut std::fmt::Formatter<'_>, items: &[T]) -> std::fmt::Result {
    for (i, item) in items.iter().enumerate() {
        write!(f, "{item}")?;
        if i != items.len() - 1 {
            write!(f, ", ")?;
        }
    }
    Ok(())
}

impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for statement in &self.0 {
            writeln!(f, "{}", statement)?;
        }
        Ok(())
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Statement::VarDeclaration(ty, name, expr) => write!(f, "{ty} {name} = {expr}"),
            Statement::Assignment(name, expr) => write!(f, "{name} = {expr}"),
            Statement::IndexAssignment { name, index, value } => {
                write!(f, "{name}[{index}] = {value}")
            }
            Statement::FunctionDefinition(function) => write!(f, "{function}"),
            Statement::If(condition, then_branch, else_branch) => {
                writeln!(f, "if {condition}")?;
                write_block(f, then_branch)?;
                if let Some(else_branch) = else_branch {
                    writeln!(f, "else")?;
                    write_block(f, else_branch)?;
                }
                Ok(())
            }
            Statement::While(condition, body) => {
                writeln!(f, "while {condition}")?;
                write_block(f, body)
            }
            Statement::Break => write!(f, "break"),
            Statement::Continue => write!(f, "continue"),
            Statement::Return(expr) => {
                if let Some(expr) = expr {
                    write!(f, "return {expr}")
                } else {
                    write!(f, "return")
                }
            }
            Statement::Expression(expr) => write!(f, "{expr}"),
        }
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}(", self.return_type, self.name)?;
        write_list(f, &self.params)?;
        writeln!(f, ")")?;
        write_block(f, &self.body)
    }
}

impl Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.ty, self.name)
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Literal(literal) => write!(f, "{}", literal),
            Expression::Interpolated(parts) => {
                write!(f, "\"")?;
                for part in parts {
                    match part {
                        StringPart::Text(text) => write!(f, "{}", escape(text))?,
                        StringPart::Expression(expr) => write!(f, "{{{expr}}}")?,
                    }
                }
                write!(f, "\"")
            }
            Expression::Identifier(name) => write!(f, "{}", name),
            Expression::Grouping(expr) => write!(f, "({})", expr),
            Expression::Binary(left, op, right) => write!(f, "{} {} {}", left, op, right),
            Expression::List(items) => {
                write!(f, "[")?;
                write_list(f, items)?;
                write!(f, "]")
            }
            Expression::Index(list, index) => write!(f, "{list}[{index}]"),
            Expression::MethodCall {
                receiver,
                method,
                args,
            } => {
                write!(f, "{receiver}.{method}(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Expression::FunctionCall(name, args) => {
                write!(f, "{}(", name)?;
                write_list(f, args)?;
                write!(f, ")")
            }
        }
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            '"' | '\\' | '{' | '}' => {
                escaped.push('\\');
                escaped.push(c);
            }
            c => escaped.push(c),
        }
    }
    escaped
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::String(s) => write!(f, "\"{}\"", escape(s)),
            Literal::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::Integer(n) => write!(f, "{}", n),
            Number::Decimal(n) => write!(f, "{:?}", n),
        }
    }
}

impl Display for InfixOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfixOperator::Equal => write!(f, "=="),
            InfixOperator::NotEqual => write!(f, "!="),
            InfixOperator::LessThan => write!(f, "<"),
            InfixOperator::LessThanOrEqual => write!(f, "<="),
            InfixOperator::GreaterThan => write!(f, ">"),
            InfixOperator::GreaterThanOrEqual => write!(f, ">="),
            InfixOperator::Plus => write!(f, "+"),
            InfixOperator::Minus => write!(f, "-"),
            InfixOperator::Multiply => write!(f, "*"),
            InfixOperator::Divide => write!(f, "/"),
            InfixOperator::And => write!(f, "&&"),
            InfixOperator::Or => write!(f, "||"),
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Bool => write!(f, "bool"),
            Type::Str => write!(f, "str"),
            Type::Void => write!(f, "void"),
            Type::List(element) => write!(f, "list<{}>", element),
            Type::Unknown => write!(f, "?"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_unify_resolves_empty_list() {
        let empty = Type::list_of(Type::Unknown);
        let ints = Type::list_of(Type::Int);
        assert_eq!(empty.unify(&ints), Some(ints.clone()));
        assert_eq!(ints.unify(&empty), Some(ints.clone()));
        assert!(!ints.accepts(&Type::list_of(Type::Str)));
        assert!(!Type::Int.accepts(&Type::Str));
    }

    #[test]
    fn test_default_values() {
        assert_eq!(
            Type::Int.default_value(),
            Some(Expression::Literal(Literal::Number(Number::Integer(0))))
        );
        assert_eq!(
            Type::list_of(Type::Str).default_value(),
            Some(Expression::List(vec![]))
        );
        assert_eq!(Type::Void.default_value(), None);
    }

    #[test]
    fn test_display_statement() {
        let statement = Statement::While(
            Expression::Binary(
                Box::new(Expression::Identifier("i".to_string())),
                InfixOperator::LessThan,
                Box::new(Expression::Literal(Literal::Number(Number::Integer(3)))),
            ),
            vec![Statement::Expression(Expression::FunctionCall(
                "print".to_string(),
                vec![Expression::Identifier("i".to_string())],
            ))],
        );
        assert_eq!(statement.to_string(), "while i < 3\n    print(i)\n");
        assert_eq!(Type::list_of(Type::list_of(Type::Int)).to_string(), "list<list<int>>");
    }
}
