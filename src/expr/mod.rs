//! Expression evaluation for directives.
//!
//! Directives hand their expression text and the current [`Scope`] to an
//! [`ExpressionEvaluator`]. The bundled [`SafeEvaluator`] implements a small
//! sandboxed expression language over `serde_json::Value`:
//!
//! - `$` is the runtime context; bare identifiers resolve against its fields
//!   and then outwards through enclosing loop frames
//! - member access (`a.b`, `a[i]`, `a?.b`), `length`, and a fixed set of
//!   string/array/number methods
//! - arithmetic, comparison, equality, `!`, `&&`, `||`, `??`, `?:`
//! - array and object literals, and the `Math` namespace
//!
//! It has no access to the host: anything it cannot resolve is an error.
//! Hosts that need a different language implement [`ExpressionEvaluator`].

mod eval;
mod lexer;
mod parser;
pub(crate) mod value;

use serde_json::Value;

use crate::context::Scope;

pub use parser::{parse, Expr};
pub use value::{renderable, truthy};

/// Failure to evaluate a directive expression.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("syntax error in `{expression}`: {message}")]
    Syntax { expression: String, message: String },
    #[error("`{0}` is not defined")]
    Reference(String),
    #[error("type error: {0}")]
    Type(String),
}

/// Evaluates directive expressions against a runtime context.
pub trait ExpressionEvaluator {
    fn evaluate(&self, expression: &str, scope: &Scope<'_>) -> Result<Value, EvalError>;

    /// Truthiness of `expression`, used by conditionals. Evaluators whose
    /// intermediate numbers can be NaN override this so that such results
    /// stay falsy instead of being judged by their JSON form.
    fn test(&self, expression: &str, scope: &Scope<'_>) -> Result<bool, EvalError> {
        self.evaluate(expression, scope).map(|value| truthy(&value))
    }
}

/// The default sandboxed evaluator. Expressions are parsed on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafeEvaluator;

impl ExpressionEvaluator for SafeEvaluator {
    fn evaluate(&self, expression: &str, scope: &Scope<'_>) -> Result<Value, EvalError> {
        let expr = parse(expression)?;
        eval::evaluate(&expr, scope)
    }

    fn test(&self, expression: &str, scope: &Scope<'_>) -> Result<bool, EvalError> {
        let expr = parse(expression)?;
        eval::test(&expr, scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval_in(node: &Value, expression: &str) -> Result<Value, EvalError> {
        SafeEvaluator.evaluate(expression, &Scope::node(node))
    }

    #[test]
    fn context_lookup_through_dollar_and_bare_names() {
        let node = json!({"title": "Q4", "list": ["a", "b"]});
        assert_eq!(eval_in(&node, "$.title").unwrap(), json!("Q4"));
        assert_eq!(eval_in(&node, "title").unwrap(), json!("Q4"));
        assert_eq!(eval_in(&node, "$.list[1]").unwrap(), json!("b"));
        assert_eq!(eval_in(&node, "$.list.length").unwrap(), json!(2));
        assert_eq!(eval_in(&node, "$.missing").unwrap(), json!(null));
    }

    #[test]
    fn loop_frames_expose_root() {
        let node = json!({"currency": "EUR"});
        let outer = Scope::node(&node);
        let element = json!({"amount": 12.5});
        let frame = Scope::frame(&outer, "row", &element, Some("i"), 1);

        let eval = |e: &str| SafeEvaluator.evaluate(e, &frame).unwrap();
        assert_eq!(eval("row.amount * 2"), json!(25));
        assert_eq!(eval("$.root.currency"), json!("EUR"));
        assert_eq!(eval("currency"), json!("EUR"));
        assert_eq!(eval("i + 1"), json!(2));
        assert_eq!(eval("$.root.root"), json!(null));
    }

    #[test]
    fn operators() {
        let node = json!({"x": 5, "name": "ada", "empty": ""});
        assert_eq!(eval_in(&node, "$.x > 1").unwrap(), json!(true));
        assert_eq!(eval_in(&node, "$.x % 2 === 1 ? 'odd' : 'even'").unwrap(), json!("odd"));
        assert_eq!(eval_in(&node, "'n=' + $.x").unwrap(), json!("n=5"));
        assert_eq!(eval_in(&node, "$.empty || 'fallback'").unwrap(), json!("fallback"));
        assert_eq!(eval_in(&node, "$.nothing ?? 0").unwrap(), json!(0));
        assert_eq!(eval_in(&node, "!$.x").unwrap(), json!(false));
        assert_eq!(eval_in(&node, "-$.x / 2").unwrap(), json!(-2.5));
    }

    #[test]
    fn methods_and_math() {
        let node = json!({"name": " ada ", "tags": ["x", "y"], "price": 3.14159});
        assert_eq!(eval_in(&node, "$.name.trim().toUpperCase()").unwrap(), json!("ADA"));
        assert_eq!(eval_in(&node, "$.tags.join(' / ')").unwrap(), json!("x / y"));
        assert_eq!(eval_in(&node, "$.tags.includes('y')").unwrap(), json!(true));
        assert_eq!(eval_in(&node, "$.price.toFixed(2)").unwrap(), json!("3.14"));
        assert_eq!(eval_in(&node, "Math.max(1, 7, 3)").unwrap(), json!(7));
        assert_eq!(eval_in(&node, "Math.round($.price)").unwrap(), json!(3));
    }

    #[test]
    fn division_by_zero_keeps_infinity() {
        let node = json!({"a": 1, "b": 0, "s": "x"});
        assert_eq!(eval_in(&node, "$.a / $.b").unwrap(), json!("Infinity"));
        assert_eq!(eval_in(&node, "-$.a / $.b").unwrap(), json!("-Infinity"));
        assert_eq!(eval_in(&node, "$.a / $.b > 100 ? 'BIG' : 'SMALL'").unwrap(), json!("BIG"));
        assert_eq!(eval_in(&node, "-$.a / $.b < -100").unwrap(), json!(true));
        assert_eq!(eval_in(&node, "$.a / $.b === $.a / $.b").unwrap(), json!(true));
        assert_eq!(eval_in(&node, "'n=' + $.a / $.b").unwrap(), json!("n=Infinity"));
        assert_eq!(eval_in(&node, "Math.max()").unwrap(), json!("-Infinity"));
        assert_eq!(eval_in(&node, "Math.min()").unwrap(), json!("Infinity"));
        assert_eq!(eval_in(&node, "($.a / $.b).toFixed(2)").unwrap(), json!("Infinity"));
    }

    #[test]
    fn nan_compares_false_and_is_falsy() {
        let node = json!({"a": 1, "b": 0, "s": "x"});
        assert_eq!(eval_in(&node, "$.s * 1").unwrap(), json!("NaN"));
        assert_eq!(eval_in(&node, "$.s * 1 < 1 ? 'LT' : 'GE'").unwrap(), json!("GE"));
        assert_eq!(eval_in(&node, "$.s * 1 >= 1").unwrap(), json!(false));
        assert_eq!(eval_in(&node, "$.s * 1 == $.s * 1").unwrap(), json!(false));
        assert_eq!(eval_in(&node, "$.s * 1 != $.s * 1").unwrap(), json!(true));
        assert_eq!(eval_in(&node, "!($.b / $.b)").unwrap(), json!(true));
        assert_eq!(eval_in(&node, "Math.max(1, $.s * 1)").unwrap(), json!("NaN"));

        let scope = Scope::node(&node);
        assert!(!SafeEvaluator.test("$.b / $.b", &scope).unwrap());
        assert!(SafeEvaluator.test("$.a / $.b", &scope).unwrap());
    }

    #[test]
    fn literals_build_content_nodes() {
        let node = json!({"rows": [1]});
        assert_eq!(
            eval_in(&node, "[{type: 'row', cells: $.rows}]").unwrap(),
            json!([{"type": "row", "cells": [1]}])
        );
    }

    #[test]
    fn errors() {
        let node = json!({"a": null});
        assert!(matches!(eval_in(&node, "nope"), Err(EvalError::Reference(_))));
        assert!(matches!(eval_in(&node, "$.a.b"), Err(EvalError::Type(_))));
        assert!(matches!(eval_in(&node, "$.a.nope()"), Err(EvalError::Type(_))));
        assert!(matches!(eval_in(&node, "1 +"), Err(EvalError::Syntax { .. })));
        assert_eq!(eval_in(&node, "$.a?.b").unwrap(), json!(null));
    }
}
