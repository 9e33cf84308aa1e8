use std::cell::RefCell;

use crate::{
    ast::{Expression, Function, Literal, Parameter, Program, Statement, StringPart, Type},
    tokenizer::{tokenize, Token, TokenType, TokenizeError},
};

#[derive(Debug)]
pub struct SyntaxError {
    pub error: ParseError,
    context: ParseContext,
    pub token: Option<Token>,
}

impl std::error::Error for SyntaxError {}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)?;
        match &self.token {
            Some(token) => write!(
                f,
                " at {},{} but found \"{}\"",
                token.line(),
                token.column(),
                token.token_type
            )?,
            None => write!(f, " but reached the end of input")?,
        }
        write!(
            f,
            "\nWhile parsing {}",
            self.context.stack.borrow().join(" > ")
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Expected \"{0}\"")]
    Expected(TokenType),
    #[error("Expected one of {}", quoted(.0))]
    ExpectedOneOf(Vec<TokenType>),
    #[error("Unexpected \"{0}\"")]
    Unexpected(TokenType),
    #[error("Expected an expression")]
    UnexpectedEnd,
    #[error("Expected identifier")]
    ExpectedIdentifier,
    #[error("Expected a type")]
    ExpectedType,
    #[error("Variable of type {0} needs an initializer")]
    NoDefaultValue(Type),
    #[error("Only a named list element can be assigned by index")]
    InvalidAssignmentTarget,
    #[error("Unterminated '{{' in string interpolation")]
    UnterminatedInterpolation,
    #[error("Invalid interpolated expression: {0}")]
    InterpolationTokenize(TokenizeError),
    #[error("Invalid interpolated expression: {0}")]
    Interpolation(Box<SyntaxError>),
}

fn quoted(token_types: &[TokenType]) -> String {
    token_types
        .iter()
        .map(|t| format!("\"{t}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone)]
struct ParseContext {
    stack: RefCell<Vec<&'static str>>,
}

impl ParseContext {
    fn new() -> Self {
        Self {
            stack: RefCell::new(Vec::new()),
        }
    }

    fn push(&self, name: &'static str) -> ParseContextGuard {
        self.stack.borrow_mut().push(name);
        ParseContextGuard::new(self)
    }

    fn pop(&self) {
        self.stack.borrow_mut().pop();
    }
}

struct ParseContextGuard<'a> {
    context: &'a ParseContext,
}

impl<'a> ParseContextGuard<'a> {
    fn new(context: &'a ParseContext) -> Self {
        Self { context }
    }
}

impl<'a> Drop for ParseContextGuard<'a> {
    fn drop(&mut self) {
        self.context.pop();
    }
}

type Parsed<'a, T> = Result<(T, &'a [Token]), SyntaxError>;

/// Parses a whole token stream. Stops at the first error.
#[tracing::instrument(level = "debug", skip_all, fields(tokens = tokens.len()))]
pub fn program(tokens: &[Token]) -> Result<Program, SyntaxError> {
    let context = ParseContext::new();
    let _guard = context.push("program");
    let mut statements = Vec::new();
    let mut tokens = tokens;

    while !tokens.is_empty() {
        let (stmt, rest) = statement(&context, tokens)?;
        statements.push(stmt);
        tokens = rest;
    }

    Ok(Program(statements))
}

fn error(context: &ParseContext, error: ParseError, tokens: &[Token]) -> SyntaxError {
    SyntaxError {
        error,
        context: context.clone(),
        token: tokens.first().cloned(),
    }
}

fn statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("statement");
    match tokens.first().map(Token::token_type) {
        Some(TokenType::TypeKeyword(_) | TokenType::ListType(_)) => declaration(context, tokens),
        Some(TokenType::If) => if_statement(context, &tokens[1..]),
        Some(TokenType::While) => while_statement(context, &tokens[1..]),
        Some(TokenType::Break) => Ok((Statement::Break, &tokens[1..])),
        Some(TokenType::Continue) => Ok((Statement::Continue, &tokens[1..])),
        Some(TokenType::Return) => return_statement(context, tokens),
        Some(TokenType::Identifier(_)) => identifier_statement(context, tokens),
        _ => expression_statement(context, tokens),
    }
}

fn declaration<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("declaration");
    let (ty, rest) = match_type(context, tokens)?;
    let (name, rest) = match_identifier(context, rest)?;

    match rest.first().map(Token::token_type) {
        Some(TokenType::LeftParen) => function(context, ty, name, &rest[1..]),
        Some(TokenType::Assign) => {
            let (expr, rest) = expression(context, &rest[1..])?;
            Ok((Statement::VarDeclaration(ty, name, expr), rest))
        }
        _ => {
            let expr = ty
                .default_value()
                .ok_or_else(|| error(context, ParseError::NoDefaultValue(ty.clone()), tokens))?;
            Ok((Statement::VarDeclaration(ty, name, expr), rest))
        }
    }
}

fn function<'a>(
    context: &ParseContext,
    return_type: Type,
    name: String,
    tokens: &'a [Token],
) -> Parsed<'a, Statement> {
    let _guard = context.push("function");
    let mut tokens = tokens;
    let mut params = vec![];
    loop {
        if let Ok(rest) = consume(context, tokens, TokenType::RightParen) {
            tokens = rest;
            break;
        }

        let (ty, rest) = match_type(context, tokens)?;
        let (param_name, rest) = match_identifier(context, rest)?;
        params.push(Parameter {
            ty,
            name: param_name,
        });
        tokens = rest;

        match tokens.first().map(Token::token_type) {
            Some(TokenType::Comma) => tokens = &tokens[1..],
            Some(TokenType::RightParen) => {
                tokens = &tokens[1..];
                break;
            }
            _ => {
                return Err(error(
                    context,
                    ParseError::ExpectedOneOf(vec![TokenType::Comma, TokenType::RightParen]),
                    tokens,
                ))
            }
        }
    }
    let (body, tokens) = block(context, tokens)?;
    Ok((
        Statement::FunctionDefinition(Function {
            name,
            params,
            return_type,
            body,
        }),
        tokens,
    ))
}

fn block<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Vec<Statement>> {
    let _guard = context.push("block");
    let mut tokens = consume(context, tokens, TokenType::Indent)?;
    let mut statements = Vec::new();

    loop {
        match tokens.first().map(Token::token_type) {
            Some(TokenType::Dedent) => return Ok((statements, &tokens[1..])),
            Some(_) => {
                let (stmt, rest) = statement(context, tokens)?;
                statements.push(stmt);
                tokens = rest;
            }
            None => return Err(error(context, ParseError::Expected(TokenType::Dedent), tokens)),
        }
    }
}

fn if_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("if_statement");
    let (condition, tokens) = expression(context, tokens)?;
    let (then_branch, tokens) = block(context, tokens)?;

    if let Some(TokenType::Else) = tokens.first().map(Token::token_type) {
        let tokens = &tokens[1..];
        let (else_branch, tokens) = match tokens.first().map(Token::token_type) {
            Some(TokenType::If) => {
                let (nested, rest) = if_statement(context, &tokens[1..])?;
                (vec![nested], rest)
            }
            _ => block(context, tokens)?,
        };
        Ok((
            Statement::If(condition, then_branch, Some(else_branch)),
            tokens,
        ))
    } else {
        Ok((Statement::If(condition, then_branch, None), tokens))
    }
}

fn while_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("while_statement");
    let (condition, tokens) = expression(context, tokens)?;
    let (body, tokens) = block(context, tokens)?;
    Ok((Statement::While(condition, body), tokens))
}

fn return_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("return_statement");
    let keyword = &tokens[0];
    let rest = &tokens[1..];

    // Without statement terminators, a value must start on the same line.
    match rest.first() {
        Some(next) if next.line() == keyword.line() => {
            let (expr, rest) = expression(context, rest)?;
            Ok((Statement::Return(Some(expr)), rest))
        }
        _ => Ok((Statement::Return(None), rest)),
    }
}

fn identifier_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("identifier_statement");
    match tokens.get(1).map(Token::token_type) {
        Some(TokenType::Assign) => {
            let (name, rest) = match_identifier(context, tokens)?;
            let (value, rest) = expression(context, &rest[1..])?;
            Ok((Statement::Assignment(name, value), rest))
        }
        Some(TokenType::LeftBracket) => {
            let (target, rest) = term(context, tokens)?;
            if rest.first().map(Token::token_type) != Some(&TokenType::Assign) {
                let (expr, rest) = binary_tail(context, target, rest)?;
                return Ok((Statement::Expression(expr), rest));
            }

            let Expression::Index(list, index) = target else {
                return Err(error(context, ParseError::InvalidAssignmentTarget, rest));
            };
            let Expression::Identifier(name) = *list else {
                return Err(error(context, ParseError::InvalidAssignmentTarget, rest));
            };
            let (value, rest) = expression(context, &rest[1..])?;
            Ok((
                Statement::IndexAssignment {
                    name,
                    index: *index,
                    value,
                },
                rest,
            ))
        }
        _ => expression_statement(context, tokens),
    }
}

fn expression_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("expression_statement");
    let (expr, tokens) = expression(context, tokens)?;
    Ok((Statement::Expression(expr), tokens))
}

fn expression<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let _guard = context.push("expression");
    let (left, rest) = term(context, tokens)?;
    binary_tail(context, left, rest)
}

/// Folds `(OPERATOR term)*` onto `expr`. All operators share one precedence
/// level and associate to the left, so `1 + 2 * 3` is `(1 + 2) * 3`.
fn binary_tail<'a>(
    context: &ParseContext,
    mut expr: Expression,
    mut tokens: &'a [Token],
) -> Parsed<'a, Expression> {
    while let Some(TokenType::Operator(op)) = tokens.first().map(Token::token_type) {
        let (right, rest) = term(context, &tokens[1..])?;
        expr = Expression::Binary(Box::new(expr), *op, Box::new(right));
        tokens = rest;
    }
    Ok((expr, tokens))
}

fn term<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let _guard = context.push("term");
    let (mut expr, mut rest) = primary(context, tokens)?;

    // Postfix indexing and method calls bind to the term on the same line.
    while continues_line(tokens, rest) {
        match rest.first().map(Token::token_type) {
            Some(TokenType::LeftBracket) => {
                let (index, after) = expression(context, &rest[1..])?;
                rest = consume(context, after, TokenType::RightBracket)?;
                expr = Expression::Index(Box::new(expr), Box::new(index));
            }
            Some(TokenType::Dot) => {
                let (method, after) = match_identifier(context, &rest[1..])?;
                let after = consume(context, after, TokenType::LeftParen)?;
                let (args, after) = delimited(context, after, TokenType::RightParen)?;
                expr = Expression::MethodCall {
                    receiver: Box::new(expr),
                    method,
                    args,
                };
                rest = after;
            }
            _ => break,
        }
    }

    Ok((expr, rest))
}

fn continues_line(tokens: &[Token], rest: &[Token]) -> bool {
    let consumed = tokens.len() - rest.len();
    match (consumed.checked_sub(1).map(|i| &tokens[i]), rest.first()) {
        (Some(last), Some(next)) => last.span.end_line == next.line(),
        _ => false,
    }
}

fn primary<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let Some(token) = tokens.first() else {
        return Err(error(context, ParseError::UnexpectedEnd, tokens));
    };
    let rest = &tokens[1..];

    match token.token_type() {
        TokenType::Number(n) => Ok((Expression::Literal(Literal::Number(*n)), rest)),
        TokenType::Boolean(b) => Ok((Expression::Literal(Literal::Boolean(*b)), rest)),
        TokenType::String(raw) => Ok((string_literal(context, token, raw)?, rest)),
        TokenType::LeftBracket => {
            let (items, rest) = delimited(context, rest, TokenType::RightBracket)?;
            Ok((Expression::List(items), rest))
        }
        TokenType::LeftParen => {
            let (expr, rest) = expression(context, rest)?;
            let rest = consume(context, rest, TokenType::RightParen)?;
            Ok((Expression::Grouping(Box::new(expr)), rest))
        }
        TokenType::Identifier(name) => match rest.first().map(Token::token_type) {
            Some(TokenType::LeftParen) => {
                let (args, rest) = delimited(context, &rest[1..], TokenType::RightParen)?;
                Ok((Expression::FunctionCall(name.clone(), args), rest))
            }
            _ => Ok((Expression::Identifier(name.clone()), rest)),
        },
        token_type => Err(error(
            context,
            ParseError::Unexpected(token_type.clone()),
            tokens,
        )),
    }
}

/// Comma separated expressions up to and including `close`.
fn delimited<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
    close: TokenType,
) -> Parsed<'a, Vec<Expression>> {
    let _guard = context.push("delimited");
    let mut items = Vec::new();
    let mut tokens = tokens;

    loop {
        if tokens.first().map(Token::token_type) == Some(&close) {
            tokens = &tokens[1..];
            break;
        }
        let (item, rest) = expression(context, tokens)?;
        items.push(item);
        tokens = rest;
        match tokens.first().map(Token::token_type) {
            Some(TokenType::Comma) => tokens = &tokens[1..],
            Some(t) if t == &close => {
                tokens = &tokens[1..];
                break;
            }
            _ => {
                return Err(error(
                    context,
                    ParseError::ExpectedOneOf(vec![TokenType::Comma, close]),
                    tokens,
                ))
            }
        }
    }

    Ok((items, tokens))
}

/// Interprets escapes and splits `{expr}` markers out of a raw string token.
/// Each marker is tokenized and parsed on the spot.
fn string_literal(
    context: &ParseContext,
    token: &Token,
    raw: &str,
) -> Result<Expression, SyntaxError> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut interpolated = false;
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => text.push('\n'),
                Some('t') => text.push('\t'),
                Some(other) => text.push(other),
                None => text.push('\\'),
            },
            '{' => {
                interpolated = true;
                let mut source = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('\\') => source.extend(chars.next()),
                        Some(c) => source.push(c),
                        None => {
                            return Err(SyntaxError {
                                error: ParseError::UnterminatedInterpolation,
                                context: context.clone(),
                                token: Some(token.clone()),
                            })
                        }
                    }
                }
                if !text.is_empty() {
                    parts.push(StringPart::Text(std::mem::take(&mut text)));
                }
                parts.push(StringPart::Expression(embedded_expression(
                    context, token, &source,
                )?));
            }
            c => text.push(c),
        }
    }

    if !interpolated {
        return Ok(Expression::Literal(Literal::String(text)));
    }
    if !text.is_empty() {
        parts.push(StringPart::Text(text));
    }
    Ok(Expression::Interpolated(parts))
}

fn embedded_expression(
    context: &ParseContext,
    token: &Token,
    source: &str,
) -> Result<Expression, SyntaxError> {
    let _guard = context.push("interpolation");
    let wrap = |error| SyntaxError {
        error,
        context: context.clone(),
        token: Some(token.clone()),
    };

    let tokens =
        tokenize(source.trim()).map_err(|e| wrap(ParseError::InterpolationTokenize(e)))?;
    let (expr, rest) =
        expression(context, &tokens).map_err(|e| wrap(ParseError::Interpolation(Box::new(e))))?;
    if let Some(extra) = rest.first() {
        let inner = error(
            context,
            ParseError::Unexpected(extra.token_type.clone()),
            rest,
        );
        return Err(wrap(ParseError::Interpolation(Box::new(inner))));
    }
    Ok(expr)
}

fn consume<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
    token_type: TokenType,
) -> Result<&'a [Token], SyntaxError> {
    match tokens.first().map(Token::token_type) {
        Some(t) if t == &token_type => Ok(&tokens[1..]),
        _ => Err(error(context, ParseError::Expected(token_type), tokens)),
    }
}

fn match_identifier<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, String> {
    match tokens.first().map(Token::token_type) {
        Some(TokenType::Identifier(name)) => Ok((name.clone(), &tokens[1..])),
        _ => Err(error(context, ParseError::ExpectedIdentifier, tokens)),
    }
}

fn match_type<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Type> {
    match tokens.first().map(Token::token_type) {
        Some(TokenType::TypeKeyword(ty) | TokenType::ListType(ty)) => {
            Ok((ty.clone(), &tokens[1..]))
        }
        _ => Err(error(context, ParseError::ExpectedType, tokens)),
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ast::{InfixOperator, Number};

    fn parse(source: &str) -> Result<Program, SyntaxError> {
        program(&tokenize(source).unwrap())
    }

    fn statements(source: &str) -> Vec<Statement> {
        parse(source).unwrap().0
    }

    fn int(n: i64) -> Expression {
        Expression::Literal(Literal::Number(Number::Integer(n)))
    }

    fn ident(name: &str) -> Expression {
        Expression::Identifier(name.to_string())
    }

    fn binary(left: Expression, op: InfixOperator, right: Expression) -> Expression {
        Expression::Binary(Box::new(left), op, Box::new(right))
    }

    #[test]
    fn test_flat_left_associative_operators() {
        let expected = vec![Statement::Expression(binary(
            binary(int(1), InfixOperator::Plus, int(2)),
            InfixOperator::Multiply,
            int(3),
        ))];
        assert_eq!(statements("1 + 2 * 3"), expected);
    }

    #[test]
    fn test_grouping() {
        let expected = vec![Statement::Expression(binary(
            int(1),
            InfixOperator::Plus,
            Expression::Grouping(Box::new(binary(int(2), InfixOperator::Multiply, int(3)))),
        ))];
        assert_eq!(statements("1 + (2 * 3)"), expected);
    }

    #[test]
    fn test_declarations() {
        let expected = vec![
            Statement::VarDeclaration(Type::Int, "x".to_string(), int(1)),
            Statement::VarDeclaration(
                Type::Str,
                "s".to_string(),
                Expression::Literal(Literal::String(String::new())),
            ),
            Statement::VarDeclaration(
                Type::list_of(Type::Int),
                "xs".to_string(),
                Expression::List(vec![]),
            ),
            Statement::VarDeclaration(
                Type::Bool,
                "b".to_string(),
                Expression::Literal(Literal::Boolean(false)),
            ),
        ];
        assert_eq!(
            statements("int x = 1\nstr s\nlist<int> xs\nbool b"),
            expected
        );
    }

    #[test]
    fn test_void_declaration_needs_initializer() {
        let err = parse("void nothing").unwrap_err();
        assert!(matches!(err.error, ParseError::NoDefaultValue(Type::Void)));
    }

    #[test]
    fn test_function_definition() {
        let source = "int add(int a, int b)\n    return a + b\nadd(1, 2)";
        let expected = vec![
            Statement::FunctionDefinition(Function {
                name: "add".to_string(),
                params: vec![
                    Parameter {
                        ty: Type::Int,
                        name: "a".to_string(),
                    },
                    Parameter {
                        ty: Type::Int,
                        name: "b".to_string(),
                    },
                ],
                return_type: Type::Int,
                body: vec![Statement::Return(Some(binary(
                    ident("a"),
                    InfixOperator::Plus,
                    ident("b"),
                )))],
            }),
            Statement::Expression(Expression::FunctionCall(
                "add".to_string(),
                vec![int(1), int(2)],
            )),
        ];
        assert_eq!(statements(source), expected);
    }

    #[test]
    fn test_bare_return() {
        let source = "void f()\n    return\n    g()";
        let Statement::FunctionDefinition(function) = &statements(source)[0] else {
            panic!("expected a function definition");
        };
        assert_eq!(
            function.body,
            vec![
                Statement::Return(None),
                Statement::Expression(Expression::FunctionCall("g".to_string(), vec![])),
            ]
        );
    }

    #[test]
    fn test_if_else_if() {
        let source = "if a\n    x = 1\nelse if b\n    x = 2\nelse\n    x = 3";
        let expected = vec![Statement::If(
            ident("a"),
            vec![Statement::Assignment("x".to_string(), int(1))],
            Some(vec![Statement::If(
                ident("b"),
                vec![Statement::Assignment("x".to_string(), int(2))],
                Some(vec![Statement::Assignment("x".to_string(), int(3))]),
            )]),
        )];
        assert_eq!(statements(source), expected);
    }

    #[test]
    fn test_while_with_loop_control() {
        let source = "while true\n    if i == 3\n        continue\n    break";
        let expected = vec![Statement::While(
            Expression::Literal(Literal::Boolean(true)),
            vec![
                Statement::If(
                    binary(ident("i"), InfixOperator::Equal, int(3)),
                    vec![Statement::Continue],
                    None,
                ),
                Statement::Break,
            ],
        )];
        assert_eq!(statements(source), expected);
    }

    #[test]
    fn test_index_assignment_and_method_call() {
        let source = "x[2] = \"z\"\nx.length()\nx[0] + 1";
        let expected = vec![
            Statement::IndexAssignment {
                name: "x".to_string(),
                index: int(2),
                value: Expression::Literal(Literal::String("z".to_string())),
            },
            Statement::Expression(Expression::MethodCall {
                receiver: Box::new(ident("x")),
                method: "length".to_string(),
                args: vec![],
            }),
            Statement::Expression(binary(
                Expression::Index(Box::new(ident("x")), Box::new(int(0))),
                InfixOperator::Plus,
                int(1),
            )),
        ];
        assert_eq!(statements(source), expected);
    }

    #[test]
    fn test_postfix_on_any_term() {
        let length = |receiver: Expression| {
            Statement::Expression(Expression::MethodCall {
                receiver: Box::new(receiver),
                method: "length".to_string(),
                args: vec![],
            })
        };
        let source = "rows[0].length()\n[1].length()";
        let expected = vec![
            length(Expression::Index(Box::new(ident("rows")), Box::new(int(0)))),
            length(Expression::List(vec![int(1)])),
        ];
        assert_eq!(statements(source), expected);
    }

    #[test]
    fn test_postfix_does_not_cross_lines() {
        let expected = vec![
            Statement::Expression(ident("x")),
            Statement::Expression(Expression::List(vec![int(1)])),
        ];
        assert_eq!(statements("x\n[1]"), expected);
    }

    #[test]
    fn test_nested_index_assignment_is_rejected() {
        let err = parse("grid[0][1] = 2").unwrap_err();
        assert!(matches!(err.error, ParseError::InvalidAssignmentTarget));
    }

    #[test]
    fn test_interpolation() {
        let expected = vec![Statement::Expression(Expression::Interpolated(vec![
            StringPart::Text("Value: ".to_string()),
            StringPart::Expression(binary(int(1), InfixOperator::Plus, int(2))),
            StringPart::Text("!".to_string()),
        ]))];
        assert_eq!(statements(r#""Value: {1+2}!""#), expected);
    }

    #[test]
    fn test_escaped_brace_is_literal() {
        let expected = vec![Statement::Expression(Expression::Literal(Literal::String(
            "{not} \"quoted\"".to_string(),
        )))];
        assert_eq!(statements(r#""\{not\} \"quoted\"""#), expected);
    }

    #[test]
    fn test_unterminated_interpolation() {
        let err = parse(r#"print("oops {x")"#).unwrap_err();
        assert!(matches!(err.error, ParseError::UnterminatedInterpolation));
    }

    #[test]
    fn test_invalid_interpolated_expression() {
        let err = parse(r#"print("{1 +}")"#).unwrap_err();
        assert!(matches!(err.error, ParseError::Interpolation(_)));
        assert_eq!(err.token.map(|t| t.line()), Some(1));
    }

    #[test]
    fn test_error_names_expected_and_found() {
        let err = parse("int f(int a\n    return a").unwrap_err();
        assert!(matches!(err.error, ParseError::ExpectedOneOf(_)));
        let message = err.to_string();
        assert!(message.contains("Expected one of \",\", \")\""), "{message}");
        assert!(message.contains("at 2,5 but found \"INDENT\""), "{message}");
        assert!(message.contains("program > statement > declaration > function"));
    }

    #[test]
    fn test_unexpected_indent() {
        let err = parse("x = 1\n    y = 2").unwrap_err();
        assert!(matches!(err.error, ParseError::Unexpected(TokenType::Indent)));
    }
}
