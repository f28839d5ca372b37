//! # Condition Expressions
//!
//! A small boolean expression language used by conditional policies and message log filters.
//!
//! ```text
//! {#message.id == '1'}
//! {#request.headers['x-tenant'] == 'acme' && !#message.error}
//! #message.content matches '^\{.*\}$' || #context.attributes['debug'] == true
//! ```
//!
//! ## Grammar
//! - roots: `#request`, `#message`, `#context`
//! - segments: `.name` or `['name']`
//! - literals: single or double quoted strings, numbers, `true`, `false`, `null`
//! - comparisons: `==`, `!=`, `<`, `<=`, `>`, `>=`, `matches` (regex literal on the right)
//! - logic: `&&`/`and`, `||`/`or`, `!`/`not`, parentheses
//!
//! The surrounding `{ }` is optional. Parsed expressions are cached by source text.

pub mod evaluator;
pub mod parser;

pub use evaluator::{EvaluationScope, ExpressionConditionEvaluator};
pub use parser::parse;

use regex::Regex;
use serde_json::Value;

/// Parsed condition
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Path { root: Root, segments: Vec<String> },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Matches { subject: Box<Expr>, pattern: Regex },
}

/// Variable a path starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Root {
    Request,
    Message,
    Context,
}

impl Root {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "request" => Some(Self::Request),
            "message" => Some(Self::Message),
            "context" => Some(Self::Context),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}
