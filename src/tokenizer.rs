use std::fmt::Display;

use tracing::trace;

use crate::{
    ast::{InfixOperator, Number, Type},
    span::Span,
};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Literals
    Number(Number),
    Identifier(String),
    String(String),
    Boolean(bool),
    Operator(InfixOperator),

    // Keywords
    If,
    Else,
    While,
    Break,
    Continue,
    Return,

    // Types
    TypeKeyword(Type),
    ListType(Type),

    // Punctuation
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
    Assign,

    // Indentation
    Indent,
    Dedent,
}

impl Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Number(n) => write!(f, "{n}"),
            TokenType::Identifier(name) => write!(f, "{name}"),
            TokenType::String(s) => write!(f, "\"{s}\""),
            TokenType::Boolean(b) => write!(f, "{b}"),
            TokenType::Operator(op) => write!(f, "{op}"),
            TokenType::If => write!(f, "if"),
            TokenType::Else => write!(f, "else"),
            TokenType::While => write!(f, "while"),
            TokenType::Break => write!(f, "break"),
            TokenType::Continue => write!(f, "continue"),
            TokenType::Return => write!(f, "return"),
            TokenType::TypeKeyword(ty) | TokenType::ListType(ty) => write!(f, "{ty}"),
            TokenType::LeftParen => write!(f, "("),
            TokenType::RightParen => write!(f, ")"),
            TokenType::LeftBracket => write!(f, "["),
            TokenType::RightBracket => write!(f, "]"),
            TokenType::Comma => write!(f, ","),
            TokenType::Dot => write!(f, "."),
            TokenType::Assign => write!(f, "="),
            TokenType::Indent => write!(f, "INDENT"),
            TokenType::Dedent => write!(f, "DEDENT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn token_type(&self) -> &TokenType {
        &self.token_type
    }

    pub fn line(&self) -> usize {
        self.span.start_line
    }

    pub fn column(&self) -> usize {
        self.span.start_column
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenizeError {
    #[error("Unexpected character '{character}' at {line},{column}")]
    UnexpectedCharacter {
        character: char,
        line: usize,
        column: usize,
    },
    #[error("Unterminated string literal at {line},{column}")]
    UnterminatedString { line: usize, column: usize },
    #[error("Unterminated block comment opened at {line},{column}")]
    UnterminatedComment { line: usize, column: usize },
    #[error("Dedent to width {width} on line {line} does not match any enclosing block")]
    InconsistentDedent { width: usize, line: usize },
    #[error("Invalid number literal '{literal}' at {line},{column}")]
    InvalidNumber {
        literal: String,
        line: usize,
        column: usize,
    },
}

/// Splits source text into tokens, emitting `Indent`/`Dedent` around
/// indentation-delimited blocks.
#[tracing::instrument(level = "debug", skip_all, fields(bytes = source.len()))]
pub fn tokenize(source: &str) -> Result<Vec<Token>, TokenizeError> {
    let mut tokenizer = Tokenizer::new();
    let mut line_count = 0;
    for (index, line) in source.lines().enumerate() {
        line_count = index + 1;
        tokenizer.line(line_count, line)?;
    }
    tokenizer.finish(line_count + 1)
}

struct Tokenizer {
    indent_stack: Vec<usize>,
    comment_depth: usize,
    comment_start: (usize, usize),
    tokens: Vec<Token>,
}

impl Tokenizer {
    fn new() -> Self {
        Self {
            indent_stack: vec![0],
            comment_depth: 0,
            comment_start: (0, 0),
            tokens: Vec::new(),
        }
    }

    fn line(&mut self, line_number: usize, line: &str) -> Result<(), TokenizeError> {
        let rest = line.trim_start_matches([' ', '\t']);
        // Applied lazily so that blank and comment-only lines leave blocks alone.
        // A line that opens inside a block comment is indented to its first token.
        let leading = (self.comment_depth == 0).then_some(line.len() - rest.len());
        let mut indent_pending = true;
        let mut rest = rest;

        loop {
            if self.comment_depth > 0 {
                rest = self.block_comment(rest);
                if self.comment_depth > 0 {
                    break;
                }
            }

            rest = rest.trim_start();
            let Some(first) = rest.chars().next() else {
                break;
            };
            if rest.starts_with("//") {
                break;
            }

            let column = column_of(line, rest);
            if let Some(after) = rest.strip_prefix("/*") {
                self.comment_depth = 1;
                self.comment_start = (line_number, column);
                rest = after;
                continue;
            }

            let (token_type, after) = first_match(RULES, rest)
                .ok_or_else(|| unmatched(first, rest, line_number, column))?;

            if std::mem::take(&mut indent_pending) {
                let width = leading.unwrap_or(column - 1);
                self.indent(width, line_number, column)?;
            }

            let lexeme = &rest[..rest.len() - after.len()];
            self.tokens.push(Token {
                token_type,
                lexeme: lexeme.to_string(),
                span: Span::on_line(line_number, column, lexeme.chars().count()),
            });
            rest = after;
        }

        Ok(())
    }

    fn block_comment<'a>(&mut self, mut rest: &'a str) -> &'a str {
        while self.comment_depth > 0 {
            if let Some(after) = rest.strip_prefix("/*") {
                self.comment_depth += 1;
                rest = after;
            } else if let Some(after) = rest.strip_prefix("*/") {
                self.comment_depth -= 1;
                rest = after;
            } else {
                let mut chars = rest.chars();
                if chars.next().is_none() {
                    break;
                }
                rest = chars.as_str();
            }
        }
        rest
    }

    fn indent(&mut self, width: usize, line: usize, column: usize) -> Result<(), TokenizeError> {
        let current = self.current_indent();
        if width > current {
            trace!(line, width, "indent");
            self.indent_stack.push(width);
            self.push_synthetic(TokenType::Indent, line, column);
        } else if width < current {
            while self.current_indent() > width {
                self.indent_stack.pop();
                self.push_synthetic(TokenType::Dedent, line, column);
            }
            trace!(line, width, "dedent");
            if self.current_indent() != width {
                return Err(TokenizeError::InconsistentDedent { width, line });
            }
        }
        Ok(())
    }

    fn current_indent(&self) -> usize {
        self.indent_stack.last().copied().unwrap_or(0)
    }

    fn push_synthetic(&mut self, token_type: TokenType, line: usize, column: usize) {
        self.tokens.push(Token {
            token_type,
            lexeme: String::new(),
            span: Span::on_line(line, column, 0),
        });
    }

    fn finish(mut self, end_line: usize) -> Result<Vec<Token>, TokenizeError> {
        if self.comment_depth > 0 {
            let (line, column) = self.comment_start;
            return Err(TokenizeError::UnterminatedComment { line, column });
        }
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.push_synthetic(TokenType::Dedent, end_line, 1);
        }
        Ok(self.tokens)
    }
}

fn column_of(line: &str, rest: &str) -> usize {
    line[..line.len() - rest.len()].chars().count() + 1
}

fn unmatched(first: char, rest: &str, line: usize, column: usize) -> TokenizeError {
    match first {
        '"' => TokenizeError::UnterminatedString { line, column },
        c if c.is_ascii_digit() => {
            let len = rest.bytes().take_while(u8::is_ascii_digit).count();
            TokenizeError::InvalidNumber {
                literal: rest[..len].to_string(),
                line,
                column,
            }
        }
        character => TokenizeError::UnexpectedCharacter {
            character,
            line,
            column,
        },
    }
}

type Rule = fn(&str) -> Option<(TokenType, &str)>;

// Earlier rules win, so composite and keyword forms come before identifiers
// and two-character operators before their one-character prefixes.
const RULES: &[Rule] = &[
    list_type,
    int_,
    bool_,
    str_,
    void_,
    if_,
    else_,
    while_,
    break_,
    continue_,
    return_,
    true_,
    false_,
    number,
    string,
    identifier,
    equal_equal,
    bang_equal,
    less_equal,
    greater_equal,
    and,
    or,
    less,
    greater,
    plus,
    minus,
    star,
    slash,
    left_paren,
    right_paren,
    left_bracket,
    right_bracket,
    comma,
    dot,
    assign,
];

fn first_match<'a, T>(
    rules: &[fn(&str) -> Option<(T, &str)>],
    source: &'a str,
) -> Option<(T, &'a str)> {
    rules.iter().find_map(|rule| rule(source))
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

macro_rules! match_literal {
    ($name:ident, $word:literal, $token:expr) => {
        fn $name(source: &str) -> Option<(TokenType, &str)> {
            source.strip_prefix($word).map(|rest| ($token, rest))
        }
    };
}

macro_rules! match_keyword {
    ($name:ident, $word:literal, $token:expr) => {
        fn $name(source: &str) -> Option<(TokenType, &str)> {
            let rest = source.strip_prefix($word)?;
            if rest.starts_with(is_identifier_char) {
                return None;
            }
            Some(($token, rest))
        }
    };
}

match_keyword! { int_, "int", TokenType::TypeKeyword(Type::Int) }
match_keyword! { bool_, "bool", TokenType::TypeKeyword(Type::Bool) }
match_keyword! { str_, "str", TokenType::TypeKeyword(Type::Str) }
match_keyword! { void_, "void", TokenType::TypeKeyword(Type::Void) }
match_keyword! { if_, "if", TokenType::If }
match_keyword! { else_, "else", TokenType::Else }
match_keyword! { while_, "while", TokenType::While }
match_keyword! { break_, "break", TokenType::Break }
match_keyword! { continue_, "continue", TokenType::Continue }
match_keyword! { return_, "return", TokenType::Return }
match_keyword! { true_, "true", TokenType::Boolean(true) }
match_keyword! { false_, "false", TokenType::Boolean(false) }
match_literal! { equal_equal, "==", TokenType::Operator(InfixOperator::Equal) }
match_literal! { bang_equal, "!=", TokenType::Operator(InfixOperator::NotEqual) }
match_literal! { less_equal, "<=", TokenType::Operator(InfixOperator::LessThanOrEqual) }
match_literal! { greater_equal, ">=", TokenType::Operator(InfixOperator::GreaterThanOrEqual) }
match_literal! { and, "&&", TokenType::Operator(InfixOperator::And) }
match_literal! { or, "||", TokenType::Operator(InfixOperator::Or) }
match_literal! { less, "<", TokenType::Operator(InfixOperator::LessThan) }
match_literal! { greater, ">", TokenType::Operator(InfixOperator::GreaterThan) }
match_literal! { plus, "+", TokenType::Operator(InfixOperator::Plus) }
match_literal! { minus, "-", TokenType::Operator(InfixOperator::Minus) }
match_literal! { star, "*", TokenType::Operator(InfixOperator::Multiply) }
match_literal! { slash, "/", TokenType::Operator(InfixOperator::Divide) }
match_literal! { left_paren, "(", TokenType::LeftParen }
match_literal! { right_paren, ")", TokenType::RightParen }
match_literal! { left_bracket, "[", TokenType::LeftBracket }
match_literal! { right_bracket, "]", TokenType::RightBracket }
match_literal! { comma, ",", TokenType::Comma }
match_literal! { dot, ".", TokenType::Dot }
match_literal! { assign, "=", TokenType::Assign }

fn type_name(source: &str) -> Option<(Type, &str)> {
    if let Some(rest) = source.strip_prefix("list<") {
        let (element, rest) = type_name(rest)?;
        let rest = rest.strip_prefix('>')?;
        return Some((Type::list_of(element), rest));
    }

    let keywords: [Rule; 4] = [int_, bool_, str_, void_];
    keywords
        .iter()
        .find_map(|rule| rule(source))
        .and_then(|(token_type, rest)| match token_type {
            TokenType::TypeKeyword(ty) => Some((ty, rest)),
            _ => None,
        })
}

fn list_type(source: &str) -> Option<(TokenType, &str)> {
    if !source.starts_with("list<") {
        return None;
    }
    let (ty, rest) = type_name(source)?;
    Some((TokenType::ListType(ty), rest))
}

fn identifier(source: &str) -> Option<(TokenType, &str)> {
    let mut chars = source.chars();

    let first = chars.next()?;
    if !first.is_ascii_alphabetic() && first != '_' {
        return None;
    }

    let len = first.len_utf8()
        + chars
            .take_while(|c| is_identifier_char(*c))
            .map(char::len_utf8)
            .sum::<usize>();

    Some((
        TokenType::Identifier(source[..len].to_string()),
        &source[len..],
    ))
}

/// Captures the raw contents between quotes. Escapes are kept verbatim and
/// interpreted by the parser.
fn string(source: &str) -> Option<(TokenType, &str)> {
    let body = source.strip_prefix('"')?;
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '"' => return Some((TokenType::String(body[..i].to_string()), &body[i + 1..])),
            _ => {}
        }
    }
    None
}

fn number(source: &str) -> Option<(TokenType, &str)> {
    let digits = source.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }

    let mut len = digits;
    if let Some(fraction) = source[digits..].strip_prefix('.') {
        let fraction_digits = fraction.bytes().take_while(u8::is_ascii_digit).count();
        if fraction_digits > 0 {
            len += 1 + fraction_digits;
        }
    }

    let literal = &source[..len];
    let number = if len > digits {
        Number::Decimal(literal.parse().ok()?)
    } else {
        Number::Integer(literal.parse().ok()?)
    };
    Some((TokenType::Number(number), &source[len..]))
}
