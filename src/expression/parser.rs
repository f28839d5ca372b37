//! Tokenizer and recursive-descent parser for condition expressions.

use regex::Regex;
use serde_json::Value;

use super::{CompareOp, Expr, Root};
use crate::core::error::{GatewayError, GatewayResult};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Hash,
    Ident(String),
    Str(String),
    Num(f64),
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Not,
}

/// Parse a condition, with or without its surrounding braces
pub fn parse(source: &str) -> GatewayResult<Expr> {
    let trimmed = source.trim();
    let body = trimmed
        .strip_prefix('{')
        .and_then(|inner| inner.strip_suffix('}'))
        .unwrap_or(trimmed);

    let tokens = tokenize(source, body)?;
    let mut parser = Parser {
        source,
        tokens,
        position: 0,
    };

    let expr = parser.parse_or()?;
    if parser.position < parser.tokens.len() {
        return Err(parser.error(format!("unexpected token {:?}", parser.tokens[parser.position])));
    }
    Ok(expr)
}

fn tokenize(source: &str, body: &str) -> GatewayResult<Vec<Token>> {
    let chars: Vec<char> = body.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '#' => {
                tokens.push(Token::Hash);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Eq);
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::LtEq);
                i += 2;
            }
            '<' => {
                tokens.push(Token::Lt);
                i += 1;
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::GtEq);
                i += 2;
            }
            '>' => {
                tokens.push(Token::Gt);
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '\'' | '"' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(GatewayError::expression(source, "unterminated string literal")),
                        Some('\\') if chars.get(i + 1) == Some(&quote) => {
                            value.push(quote);
                            i += 2;
                        }
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            value.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(value));
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).map_or(false, |n| n.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| GatewayError::expression(source, format!("invalid number '{}'", literal)))?;
                tokens.push(Token::Num(number));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '-') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(word),
                });
            }
            other => {
                return Err(GatewayError::expression(source, format!("unexpected character '{}'", other)));
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    position: usize,
}

impl<'a> Parser<'a> {
    fn error<S: Into<String>>(&self, message: S) -> GatewayError {
        GatewayError::expression(self.source, message)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> GatewayResult<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(self.error(format!("expected {:?}, found {:?}", expected, token))),
            None => Err(self.error(format!("expected {:?}, found end of expression", expected))),
        }
    }

    fn parse_or(&mut self) -> GatewayResult<Expr> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.position += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> GatewayResult<Expr> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.position += 1;
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> GatewayResult<Expr> {
        if self.peek() == Some(&Token::Not) {
            self.position += 1;
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> GatewayResult<Expr> {
        let left = self.parse_primary()?;

        if matches!(self.peek(), Some(Token::Ident(word)) if word == "matches") {
            self.position += 1;
            return match self.next() {
                Some(Token::Str(pattern)) => {
                    let pattern =
                        Regex::new(&pattern).map_err(|err| self.error(format!("invalid pattern: {}", err)))?;
                    Ok(Expr::Matches {
                        subject: Box::new(left),
                        pattern,
                    })
                }
                _ => Err(self.error("'matches' expects a string pattern")),
            };
        }

        let op = match self.peek() {
            Some(Token::Eq) => CompareOp::Eq,
            Some(Token::NotEq) => CompareOp::NotEq,
            Some(Token::Lt) => CompareOp::Lt,
            Some(Token::LtEq) => CompareOp::LtEq,
            Some(Token::Gt) => CompareOp::Gt,
            Some(Token::GtEq) => CompareOp::GtEq,
            _ => return Ok(left),
        };

        self.position += 1;
        let right = self.parse_primary()?;
        Ok(Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_primary(&mut self) -> GatewayResult<Expr> {
        match self.next() {
            Some(Token::LParen) => {
                let expr = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(Token::Str(value)) => Ok(Expr::Literal(Value::String(value))),
            Some(Token::Num(number)) => Ok(Expr::Literal(
                serde_json::Number::from_f64(number).map(Value::Number).unwrap_or(Value::Null),
            )),
            Some(Token::Ident(word)) => match word.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                other => Err(self.error(format!("unknown identifier '{}', variables start with '#'", other))),
            },
            Some(Token::Hash) => self.parse_path(),
            Some(token) => Err(self.error(format!("unexpected token {:?}", token))),
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn parse_path(&mut self) -> GatewayResult<Expr> {
        let root = match self.next() {
            Some(Token::Ident(name)) => {
                Root::from_name(&name).ok_or_else(|| self.error(format!("unknown variable '#{}'", name)))?
            }
            _ => return Err(self.error("expected a variable name after '#'")),
        };

        let mut segments = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.position += 1;
                    match self.next() {
                        Some(Token::Ident(name)) => segments.push(name),
                        _ => return Err(self.error("expected a property name after '.'")),
                    }
                }
                Some(Token::LBracket) => {
                    self.position += 1;
                    match self.next() {
                        Some(Token::Str(name)) => segments.push(name),
                        Some(Token::Num(index)) => segments.push(index.to_string()),
                        _ => return Err(self.error("expected a quoted key inside '[ ]'")),
                    }
                    self.expect(Token::RBracket)?;
                }
                _ => break,
            }
        }

        Ok(Expr::Path { root, segments })
    }
}
