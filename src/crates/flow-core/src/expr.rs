//! Sandboxed condition expressions for branch nodes.
//!
//! Branch conditions are written by flow authors, so they are evaluated by
//! a purpose-built mini-parser rather than any general-purpose evaluator.
//! The language is deliberately small: comparisons, arithmetic, boolean
//! connectives, literals, and one bound variable `input` (the combined
//! upstream payload) with the property `input.length`.
//!
//! ```rust
//! use flow_core::expr::evaluate;
//!
//! assert!(evaluate("input.length > 3", "hello").unwrap());
//! assert!(!evaluate("input.length > 3", "hi").unwrap());
//! assert!(evaluate("input == 'yes' || input == 'y'", "y").unwrap());
//! ```
//!
//! The conditional handler maps any evaluation error to `false`; errors
//! are never propagated out of a branch node.

use thiserror::Error;

/// Errors from parsing or evaluating a condition expression.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExprError {
    #[error("unexpected character '{0}' in condition")]
    UnexpectedChar(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unexpected end of condition")]
    UnexpectedEnd,
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("unknown identifier '{0}' (only 'input' is bound)")]
    UnknownIdent(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("condition must evaluate to a boolean, got {0}")]
    NotBoolean(&'static str),
}

type ExprResult<T> = std::result::Result<T, ExprError>;

/// Evaluate a condition against the combined upstream payload bound as
/// `input`. Returns the boolean result, or an error for anything the
/// grammar does not admit.
pub fn evaluate(src: &str, input: &str) -> ExprResult<bool> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.parse_or(input)?;
    parser.expect_end()?;
    match value {
        Value::Bool(b) => Ok(b),
        Value::Num(_) => Err(ExprError::NotBoolean("a number")),
        Value::Str(_) => Err(ExprError::NotBoolean("a string")),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Num(f64),
    Str(String),
    Bool(bool),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Num(_) => "number",
            Value::Str(_) => "string",
            Value::Bool(_) => "boolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Str(String),
    Ident(String),
    Or,
    And,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    Dot,
}

fn tokenize(src: &str) -> ExprResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = src.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '0'..='9' => {
                let mut text = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        text.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let num = text
                    .parse::<f64>()
                    .map_err(|_| ExprError::UnexpectedToken(text.clone()))?;
                tokens.push(Token::Num(num));
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some(d) if d == quote => break,
                        Some(d) => text.push(d),
                        None => return Err(ExprError::UnterminatedString),
                    }
                }
                tokens.push(Token::Str(text));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(match ident.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(ident),
                });
            }
            '|' => {
                chars.next();
                if chars.next_if_eq(&'|').is_some() {
                    tokens.push(Token::Or);
                } else {
                    return Err(ExprError::UnexpectedChar('|'));
                }
            }
            '&' => {
                chars.next();
                if chars.next_if_eq(&'&').is_some() {
                    tokens.push(Token::And);
                } else {
                    return Err(ExprError::UnexpectedChar('&'));
                }
            }
            '=' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Eq);
                } else {
                    return Err(ExprError::UnexpectedChar('='));
                }
            }
            '!' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Ne);
                } else {
                    tokens.push(Token::Not);
                }
            }
            '<' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Le);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '%' => {
                chars.next();
                tokens.push(Token::Percent);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            other => return Err(ExprError::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

/// Recursive-descent parser that evaluates as it parses. The grammar is
/// small enough that a separate AST buys nothing.
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
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_end(&self) -> ExprResult<()> {
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(ExprError::UnexpectedToken(format!("{:?}", t))),
        }
    }

    fn parse_or(&mut self, input: &str) -> ExprResult<Value> {
        let mut left = self.parse_and(input)?;
        while self.eat(&Token::Or) {
            let right = self.parse_and(input)?;
            left = Value::Bool(as_bool(&left)? || as_bool(&right)?);
        }
        Ok(left)
    }

    fn parse_and(&mut self, input: &str) -> ExprResult<Value> {
        let mut left = self.parse_cmp(input)?;
        while self.eat(&Token::And) {
            let right = self.parse_cmp(input)?;
            left = Value::Bool(as_bool(&left)? && as_bool(&right)?);
        }
        Ok(left)
    }

    fn parse_cmp(&mut self, input: &str) -> ExprResult<Value> {
        let left = self.parse_add(input)?;
        let op = match self.peek() {
            Some(Token::Eq) => Token::Eq,
            Some(Token::Ne) => Token::Ne,
            Some(Token::Lt) => Token::Lt,
            Some(Token::Le) => Token::Le,
            Some(Token::Gt) => Token::Gt,
            Some(Token::Ge) => Token::Ge,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.parse_add(input)?;
        compare(&left, &right, &op)
    }

    fn parse_add(&mut self, input: &str) -> ExprResult<Value> {
        let mut left = self.parse_mul(input)?;
        loop {
            if self.eat(&Token::Plus) {
                let right = self.parse_mul(input)?;
                left = match (&left, &right) {
                    (Value::Str(a), Value::Str(b)) => Value::Str(format!("{}{}", a, b)),
                    _ => Value::Num(as_num(&left)? + as_num(&right)?),
                };
            } else if self.eat(&Token::Minus) {
                let right = self.parse_mul(input)?;
                left = Value::Num(as_num(&left)? - as_num(&right)?);
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_mul(&mut self, input: &str) -> ExprResult<Value> {
        let mut left = self.parse_unary(input)?;
        loop {
            if self.eat(&Token::Star) {
                let right = self.parse_unary(input)?;
                left = Value::Num(as_num(&left)? * as_num(&right)?);
            } else if self.eat(&Token::Slash) {
                let right = self.parse_unary(input)?;
                let divisor = as_num(&right)?;
                if divisor == 0.0 {
                    return Err(ExprError::DivisionByZero);
                }
                left = Value::Num(as_num(&left)? / divisor);
            } else if self.eat(&Token::Percent) {
                let right = self.parse_unary(input)?;
                let divisor = as_num(&right)?;
                if divisor == 0.0 {
                    return Err(ExprError::DivisionByZero);
                }
                left = Value::Num(as_num(&left)? % divisor);
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_unary(&mut self, input: &str) -> ExprResult<Value> {
        if self.eat(&Token::Not) {
            let value = self.parse_unary(input)?;
            return Ok(Value::Bool(!as_bool(&value)?));
        }
        if self.eat(&Token::Minus) {
            let value = self.parse_unary(input)?;
            return Ok(Value::Num(-as_num(&value)?));
        }
        self.parse_primary(input)
    }

    fn parse_primary(&mut self, input: &str) -> ExprResult<Value> {
        match self.next() {
            Some(Token::Num(n)) => Ok(Value::Num(n)),
            Some(Token::Str(s)) => Ok(Value::Str(s)),
            Some(Token::Ident(ident)) => match ident.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                "input" => {
                    if self.eat(&Token::Dot) {
                        match self.next() {
                            Some(Token::Ident(prop)) if prop == "length" => {
                                Ok(Value::Num(input.chars().count() as f64))
                            }
                            Some(Token::Ident(prop)) => Err(ExprError::UnknownIdent(format!(
                                "input.{}",
                                prop
                            ))),
                            _ => Err(ExprError::UnexpectedEnd),
                        }
                    } else {
                        Ok(Value::Str(input.to_string()))
                    }
                }
                other => Err(ExprError::UnknownIdent(other.to_string())),
            },
            Some(Token::LParen) => {
                let value = self.parse_or(input)?;
                if self.eat(&Token::RParen) {
                    Ok(value)
                } else {
                    Err(ExprError::UnexpectedEnd)
                }
            }
            Some(t) => Err(ExprError::UnexpectedToken(format!("{:?}", t))),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}

fn as_bool(value: &Value) -> ExprResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Err(ExprError::TypeMismatch(format!(
            "expected boolean, got {}",
            other.type_name()
        ))),
    }
}

fn as_num(value: &Value) -> ExprResult<f64> {
    match value {
        Value::Num(n) => Ok(*n),
        other => Err(ExprError::TypeMismatch(format!(
            "expected number, got {}",
            other.type_name()
        ))),
    }
}

fn compare(left: &Value, right: &Value, op: &Token) -> ExprResult<Value> {
    let result = match (left, right) {
        (Value::Num(a), Value::Num(b)) => match op {
            Token::Eq => a == b,
            Token::Ne => a != b,
            Token::Lt => a < b,
            Token::Le => a <= b,
            Token::Gt => a > b,
            Token::Ge => a >= b,
            _ => unreachable!(),
        },
        (Value::Str(a), Value::Str(b)) => match op {
            Token::Eq => a == b,
            Token::Ne => a != b,
            Token::Lt => a < b,
            Token::Le => a <= b,
            Token::Gt => a > b,
            Token::Ge => a >= b,
            _ => unreachable!(),
        },
        (Value::Bool(a), Value::Bool(b)) => match op {
            Token::Eq => a == b,
            Token::Ne => a != b,
            _ => {
                return Err(ExprError::TypeMismatch(
                    "booleans only support == and !=".to_string(),
                ))
            }
        },
        (a, b) => {
            return Err(ExprError::TypeMismatch(format!(
                "cannot compare {} with {}",
                a.type_name(),
                b.type_name()
            )))
        }
    };
    Ok(Value::Bool(result))
}
