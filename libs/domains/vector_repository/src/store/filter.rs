//! Boolean filter expressions in the Milvus dialect.
//!
//! Supported: comparisons (`==`, `!=`, `<`, `<=`, `>`, `>=`) between a field
//! and a string/number/bool literal, `field in [...]`, `field not in [...]`,
//! `field like "pre%"`, `and`/`&&`, `or`/`||`, `not`/`!` and parentheses.
//! Used by [`super::MemoryStore`]; the Milvus server evaluates its own.

use std::cmp::Ordering;

use serde_json::Value;

use crate::error::{VectorError, VectorResult};
use crate::models::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Num(f64),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare {
        field: String,
        op: CompareOp,
        value: Literal,
    },
    In {
        field: String,
        values: Vec<Literal>,
        negated: bool,
    },
    Like {
        field: String,
        pattern: String,
    },
}

impl Expr {
    /// Field names referenced anywhere in the expression
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Or(lhs, rhs) | Expr::And(lhs, rhs) => {
                lhs.collect_fields(out);
                rhs.collect_fields(out);
            }
            Expr::Not(inner) => inner.collect_fields(out),
            Expr::Compare { field, .. } | Expr::In { field, .. } | Expr::Like { field, .. } => {
                if !out.contains(&field.as_str()) {
                    out.push(field);
                }
            }
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Expr::Or(lhs, rhs) => lhs.matches(record) || rhs.matches(record),
            Expr::And(lhs, rhs) => lhs.matches(record) && rhs.matches(record),
            Expr::Not(inner) => !inner.matches(record),
            Expr::Compare { field, op, value } => {
                let Some(actual) = record.get(field) else {
                    return false;
                };
                let ordering = compare(actual, value);
                match op {
                    CompareOp::Eq => ordering == Some(Ordering::Equal),
                    CompareOp::Ne => ordering != Some(Ordering::Equal),
                    CompareOp::Lt => ordering == Some(Ordering::Less),
                    CompareOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                    CompareOp::Gt => ordering == Some(Ordering::Greater),
                    CompareOp::Ge => {
                        matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
                    }
                }
            }
            Expr::In {
                field,
                values,
                negated,
            } => {
                let Some(actual) = record.get(field) else {
                    return false;
                };
                let found = values
                    .iter()
                    .any(|v| compare(actual, v) == Some(Ordering::Equal));
                found != *negated
            }
            Expr::Like { field, pattern } => match record.get(field) {
                Some(Value::String(s)) => like(s, pattern),
                _ => false,
            },
        }
    }
}

fn compare(actual: &Value, literal: &Literal) -> Option<Ordering> {
    match (actual, literal) {
        (Value::String(a), Literal::Str(b)) => Some(a.as_str().cmp(b.as_str())),
        (Value::Number(a), Literal::Num(b)) => a.as_f64()?.partial_cmp(b),
        (Value::Bool(a), Literal::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// `%` matches any run of characters; everything else is literal
fn like(value: &str, pattern: &str) -> bool {
    let parts: Vec<&str> = pattern.split('%').collect();
    if parts.len() == 1 {
        return value == pattern;
    }

    let (first, rest) = (parts[0], &parts[1..]);
    let Some(mut remaining) = value.strip_prefix(first) else {
        return false;
    };

    let (last, middle) = match rest.split_last() {
        Some(split) => split,
        None => return true,
    };

    for part in middle {
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }

    remaining.ends_with(last)
}

pub fn parse(input: &str) -> VectorResult<Expr> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(VectorError::InvalidFilter("empty expression".to_string()));
    }

    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or_expr()?;

    if let Some(token) = parser.peek() {
        return Err(VectorError::InvalidFilter(format!(
            "unexpected {:?} in '{}'",
            token, input
        )));
    }

    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    Bool(bool),
    Op(CompareOp),
    And,
    Or,
    Not,
    In,
    Like,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

fn tokenize(input: &str) -> VectorResult<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match c {
            c if c.is_whitespace() => i += 1,
            '(' => push(&mut tokens, &mut i, Token::LParen, 1),
            ')' => push(&mut tokens, &mut i, Token::RParen, 1),
            '[' => push(&mut tokens, &mut i, Token::LBracket, 1),
            ']' => push(&mut tokens, &mut i, Token::RBracket, 1),
            ',' => push(&mut tokens, &mut i, Token::Comma, 1),
            '&' if next == Some('&') => push(&mut tokens, &mut i, Token::And, 2),
            '|' if next == Some('|') => push(&mut tokens, &mut i, Token::Or, 2),
            '=' if next == Some('=') => push(&mut tokens, &mut i, Token::Op(CompareOp::Eq), 2),
            '!' if next == Some('=') => push(&mut tokens, &mut i, Token::Op(CompareOp::Ne), 2),
            '!' => push(&mut tokens, &mut i, Token::Not, 1),
            '<' if next == Some('=') => push(&mut tokens, &mut i, Token::Op(CompareOp::Le), 2),
            '<' => push(&mut tokens, &mut i, Token::Op(CompareOp::Lt), 1),
            '>' if next == Some('=') => push(&mut tokens, &mut i, Token::Op(CompareOp::Ge), 2),
            '>' => push(&mut tokens, &mut i, Token::Op(CompareOp::Gt), 1),
            '\'' | '"' => {
                let (value, end) = read_string(&chars, i)?;
                tokens.push(Token::Str(value));
                i = end;
            }
            c if c.is_ascii_digit()
                || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let raw: String = chars[start..i].iter().collect();
                let value = raw.parse::<f64>().map_err(|_| {
                    VectorError::InvalidFilter(format!("invalid number '{}'", raw))
                })?;
                tokens.push(Token::Num(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "like" => Token::Like,
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    _ => Token::Ident(word),
                });
            }
            other => {
                return Err(VectorError::InvalidFilter(format!(
                    "unexpected character '{}' at {}",
                    other, i
                )));
            }
        }
    }

    Ok(tokens)
}

fn push(tokens: &mut Vec<Token>, i: &mut usize, token: Token, width: usize) {
    tokens.push(token);
    *i += width;
}

fn read_string(chars: &[char], start: usize) -> VectorResult<(String, usize)> {
    let quote = chars[start];
    let mut value = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                value.push(chars[i + 1]);
                i += 2;
            }
            c if c == quote => return Ok((value, i + 1)),
            c => {
                value.push(c);
                i += 1;
            }
        }
    }

    Err(VectorError::InvalidFilter(
        "unterminated string literal".to_string(),
    ))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> VectorResult<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            other => Err(VectorError::InvalidFilter(format!(
                "expected {:?}, found {:?}",
                expected, other
            ))),
        }
    }

    fn or_expr(&mut self) -> VectorResult<Expr> {
        let mut lhs = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> VectorResult<Expr> {
        let mut lhs = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> VectorResult<Expr> {
        match self.peek() {
            Some(Token::Not) => {
                self.pos += 1;
                Ok(Expr::Not(Box::new(self.unary()?)))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.or_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            _ => self.predicate(),
        }
    }

    fn predicate(&mut self) -> VectorResult<Expr> {
        let field = match self.next() {
            Some(Token::Ident(name)) => name,
            other => {
                return Err(VectorError::InvalidFilter(format!(
                    "expected field name, found {:?}",
                    other
                )));
            }
        };

        match self.next() {
            Some(Token::Op(op)) => Ok(Expr::Compare {
                field,
                op,
                value: self.literal()?,
            }),
            Some(Token::In) => Ok(Expr::In {
                field,
                values: self.list()?,
                negated: false,
            }),
            Some(Token::Not) => {
                self.expect(Token::In)?;
                Ok(Expr::In {
                    field,
                    values: self.list()?,
                    negated: true,
                })
            }
            Some(Token::Like) => match self.next() {
                Some(Token::Str(pattern)) => Ok(Expr::Like { field, pattern }),
                other => Err(VectorError::InvalidFilter(format!(
                    "like expects a string pattern, found {:?}",
                    other
                ))),
            },
            other => Err(VectorError::InvalidFilter(format!(
                "expected operator after '{}', found {:?}",
                field, other
            ))),
        }
    }

    fn literal(&mut self) -> VectorResult<Literal> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Literal::Str(s)),
            Some(Token::Num(n)) => Ok(Literal::Num(n)),
            Some(Token::Bool(b)) => Ok(Literal::Bool(b)),
            other => Err(VectorError::InvalidFilter(format!(
                "expected literal, found {:?}",
                other
            ))),
        }
    }

    fn list(&mut self) -> VectorResult<Vec<Literal>> {
        self.expect(Token::LBracket)?;
        let mut values = Vec::new();

        if self.peek() == Some(&Token::RBracket) {
            self.pos += 1;
            return Ok(values);
        }

        loop {
            values.push(self.literal()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RBracket) => return Ok(values),
                other => {
                    return Err(VectorError::InvalidFilter(format!(
                        "expected ',' or ']', found {:?}",
                        other
                    )));
                }
            }
        }
    }
}
