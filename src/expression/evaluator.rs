//! Evaluation of parsed conditions against an exchange and, optionally, one message.

use dashmap::DashMap;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

use super::{parse, CompareOp, Expr, Root};
use crate::context::execution::ExecutionContext;
use crate::context::message::Message;
use crate::core::error::{GatewayError, GatewayResult};
use crate::policy::condition::{ConditionEvaluator, MessageConditionFilter};

/// Variables visible to an expression
#[derive(Debug, Clone, Copy)]
pub struct EvaluationScope<'a> {
    ctx: &'a ExecutionContext,
    message: Option<&'a Message>,
}

impl<'a> EvaluationScope<'a> {
    pub fn new(ctx: &'a ExecutionContext) -> Self {
        Self { ctx, message: None }
    }

    pub fn with_message(ctx: &'a ExecutionContext, message: &'a Message) -> Self {
        Self {
            ctx,
            message: Some(message),
        }
    }

    fn resolve(&self, root: Root, segments: &[String]) -> Result<Value, String> {
        let (first, rest) = match segments.split_first() {
            Some((first, rest)) => (first.as_str(), rest),
            None => return Err("a variable must be followed by a property".to_string()),
        };

        match root {
            Root::Request => {
                let request = self.ctx.request();
                match first {
                    "id" => Ok(Value::from(request.id.clone())),
                    "path" => Ok(Value::from(request.path())),
                    "method" => Ok(Value::from(request.method.as_str())),
                    "clientIdentifier" => Ok(Value::from(request.client_identifier.clone())),
                    "remoteAddress" => Ok(request.remote_address.clone().map(Value::from).unwrap_or(Value::Null)),
                    "content" | "body" => Ok(Value::from(String::from_utf8_lossy(&request.body).into_owned())),
                    "headers" => Ok(header_value(&request.headers, rest)),
                    other => Err(format!("unknown request property '{}'", other)),
                }
            }
            Root::Message => {
                let Some(message) = self.message else {
                    return Ok(Value::Null);
                };
                match first {
                    "id" => Ok(Value::from(message.id())),
                    "content" => Ok(Value::from(message.content_str())),
                    "error" => Ok(Value::Bool(message.is_error())),
                    "headers" => Ok(header_value(message.headers(), rest)),
                    "attributes" => Ok(descend_map(message.attributes().iter(), rest)),
                    "metadata" => Ok(descend_map(message.metadata().iter(), rest)),
                    other => Err(format!("unknown message property '{}'", other)),
                }
            }
            Root::Context => match first {
                "attributes" => Ok(descend_map(self.ctx.attributes().iter(), rest)),
                other => Err(format!("unknown context property '{}'", other)),
            },
        }
    }
}

fn header_value(headers: &http::HeaderMap, rest: &[String]) -> Value {
    match rest.first() {
        Some(name) => headers
            .get(name.as_str())
            .and_then(|value| value.to_str().ok())
            .map(Value::from)
            .unwrap_or(Value::Null),
        None => {
            let mut map = Map::new();
            for (name, value) in headers {
                if let Ok(value) = value.to_str() {
                    map.entry(name.as_str().to_string()).or_insert_with(|| Value::from(value));
                }
            }
            Value::Object(map)
        }
    }
}

fn descend_map<'v, I>(entries: I, rest: &[String]) -> Value
where
    I: Iterator<Item = (&'v String, &'v Value)>,
{
    let object: Map<String, Value> = entries.map(|(key, value)| (key.clone(), value.clone())).collect();
    descend(Value::Object(object), rest)
}

fn descend(mut value: Value, segments: &[String]) -> Value {
    for segment in segments {
        value = match value {
            Value::Object(mut map) => map.remove(segment).unwrap_or(Value::Null),
            Value::Array(mut items) => match segment.parse::<usize>() {
                Ok(index) if index < items.len() => items.swap_remove(index),
                _ => Value::Null,
            },
            _ => Value::Null,
        };
    }
    value
}

fn truthy(value: &Value) -> Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Null => Ok(false),
        other => Err(format!("expected a boolean, found {}", other)),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

fn loosely_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) | (Value::Number(_), Value::Number(_)) => {
            match (as_number(left), as_number(right)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        (Value::String(text), Value::Bool(b)) | (Value::Bool(b), Value::String(text)) => text == &b.to_string(),
        _ => left == right,
    }
}

fn order(left: &Value, right: &Value) -> Result<Option<Ordering>, String> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(None),
        (Value::String(a), Value::String(b)) => match (a.parse::<f64>(), b.parse::<f64>()) {
            (Ok(a), Ok(b)) => Ok(a.partial_cmp(&b)),
            _ => Ok(Some(a.cmp(b))),
        },
        _ => match (as_number(left), as_number(right)) {
            (Some(a), Some(b)) => Ok(a.partial_cmp(&b)),
            _ => Err(format!("cannot compare {} with {}", left, right)),
        },
    }
}

fn evaluate(expr: &Expr, scope: &EvaluationScope<'_>) -> Result<Value, String> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Path { root, segments } => scope.resolve(*root, segments),
        Expr::Not(inner) => Ok(Value::Bool(!truthy(&evaluate(inner, scope)?)?)),
        Expr::And(left, right) => {
            if !truthy(&evaluate(left, scope)?)? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(truthy(&evaluate(right, scope)?)?))
        }
        Expr::Or(left, right) => {
            if truthy(&evaluate(left, scope)?)? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(truthy(&evaluate(right, scope)?)?))
        }
        Expr::Compare { op, left, right } => {
            let left = evaluate(left, scope)?;
            let right = evaluate(right, scope)?;
            let result = match op {
                CompareOp::Eq => loosely_equal(&left, &right),
                CompareOp::NotEq => !loosely_equal(&left, &right),
                CompareOp::Lt => order(&left, &right)? == Some(Ordering::Less),
                CompareOp::LtEq => matches!(order(&left, &right)?, Some(Ordering::Less | Ordering::Equal)),
                CompareOp::Gt => order(&left, &right)? == Some(Ordering::Greater),
                CompareOp::GtEq => matches!(order(&left, &right)?, Some(Ordering::Greater | Ordering::Equal)),
            };
            Ok(Value::Bool(result))
        }
        Expr::Matches { subject, pattern } => match evaluate(subject, scope)? {
            Value::String(text) => Ok(Value::Bool(pattern.is_match(&text))),
            Value::Null => Ok(Value::Bool(false)),
            other => Ok(Value::Bool(pattern.is_match(&other.to_string()))),
        },
    }
}

/// Condition evaluator backed by the expression language
///
/// Parsed expressions are cached by their source text, so a condition is parsed once
/// no matter how many exchanges or messages evaluate it.
#[derive(Debug, Default)]
pub struct ExpressionConditionEvaluator {
    cache: DashMap<String, Arc<Expr>>,
}

impl ExpressionConditionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `condition`, reusing a cached parse when available
    pub fn compile(&self, condition: &str) -> GatewayResult<Arc<Expr>> {
        if let Some(expr) = self.cache.get(condition) {
            return Ok(expr.value().clone());
        }

        let expr = Arc::new(parse(condition)?);
        self.cache.insert(condition.to_string(), expr.clone());
        debug!(condition = %condition, "Compiled condition");
        Ok(expr)
    }

    /// Evaluate `condition` to a boolean within `scope`
    pub fn evaluate(&self, condition: &str, scope: &EvaluationScope<'_>) -> GatewayResult<bool> {
        let expr = self.compile(condition)?;
        evaluate(&expr, scope)
            .and_then(|value| truthy(&value))
            .map_err(|message| GatewayError::expression(condition, message))
    }

    pub fn cached_expressions(&self) -> usize {
        self.cache.len()
    }
}

impl ConditionEvaluator for ExpressionConditionEvaluator {
    fn filter(&self, ctx: &ExecutionContext, _policy_id: &str, condition: &str) -> GatewayResult<bool> {
        self.evaluate(condition, &EvaluationScope::new(ctx))
    }
}

impl MessageConditionFilter for ExpressionConditionEvaluator {
    fn filter(
        &self,
        ctx: &ExecutionContext,
        _policy_id: &str,
        condition: &str,
        message: &Message,
    ) -> GatewayResult<bool> {
        self.evaluate(condition, &EvaluationScope::with_message(ctx, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::request::{Request, Response};

    fn context() -> ExecutionContext {
        let mut request = Request::default().with_id("req-1");
        request.headers.insert("x-tenant", "acme".parse().unwrap());
        let mut ctx = ExecutionContext::new(request, Response::default());
        ctx.set_attribute("retries", 3);
        ctx
    }

    #[test]
    fn test_message_id_condition() {
        let evaluator = ExpressionConditionEvaluator::new();
        let ctx = context();

        let first = Message::with_id("1", "a");
        let second = Message::with_id("2", "b");
        let scope = EvaluationScope::with_message(&ctx, &first);
        assert!(evaluator.evaluate("{#message.id == '1'}", &scope).unwrap());
        let scope = EvaluationScope::with_message(&ctx, &second);
        assert!(!evaluator.evaluate("{#message.id == '1'}", &scope).unwrap());
        assert_eq!(evaluator.cached_expressions(), 1);
    }

    #[test]
    fn test_request_and_context_paths() {
        let evaluator = ExpressionConditionEvaluator::new();
        let ctx = context();
        let scope = EvaluationScope::new(&ctx);

        assert!(evaluator.evaluate("#request.headers['x-tenant'] == 'acme'", &scope).unwrap());
        assert!(evaluator.evaluate("#request.headers['missing'] == null", &scope).unwrap());
        assert!(evaluator.evaluate("#context.attributes['retries'] >= 3 && #request.method == 'GET'", &scope).unwrap());
        assert!(!evaluator.evaluate("#context.attributes['retries'] < 2", &scope).unwrap());
    }

    #[test]
    fn test_message_properties() {
        let evaluator = ExpressionConditionEvaluator::new();
        let ctx = context();
        let message = Message::error("{\"kind\":\"timeout\"}").with_metadata("partition", 4);
        let scope = EvaluationScope::with_message(&ctx, &message);

        assert!(evaluator.evaluate("#message.error", &scope).unwrap());
        assert!(evaluator.evaluate("#message.content matches 'timeout'", &scope).unwrap());
        assert!(evaluator.evaluate("#message.metadata['partition'] == '4'", &scope).unwrap());
        assert!(evaluator.evaluate("not (#message.metadata['partition'] != 4)", &scope).unwrap());
    }

    #[test]
    fn test_non_boolean_result_is_an_error() {
        let evaluator = ExpressionConditionEvaluator::new();
        let ctx = context();
        let error = evaluator
            .evaluate("#request.path", &EvaluationScope::new(&ctx))
            .unwrap_err();
        assert!(matches!(error, GatewayError::Expression { .. }));
    }

    #[test]
    fn test_message_root_without_message_is_null() {
        let evaluator = ExpressionConditionEvaluator::new();
        let ctx = context();
        assert!(!ConditionEvaluator::filter(&evaluator, &ctx, "p1", "#message.error").unwrap());
    }
}
