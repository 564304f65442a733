//! Tree-walking evaluation of [`Expr`] against a [`Scope`].

use std::borrow::Cow;
use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::parser::{BinOp, Expr, LogicalOp, UnaryOp};
use super::value::{
    compare, format_number, loose_eq, number, strict_eq, to_number, to_text, truthy,
};
use super::EvalError;
use crate::context::{Binding, Scope};

/// Builtin namespace available to every expression.
const MATH: &str = "Math";

static NULL: Value = Value::Null;

/// An intermediate result: borrowed from the context where possible.
enum Operand<'s> {
    Value(Cow<'s, Value>),
    Scope(&'s Scope<'s>),
    Math,
    /// NaN or an infinity. JSON has no such numbers, so they stay out of
    /// `Value` until the expression's result leaves the evaluator.
    NonFinite(f64),
}

impl<'s> Operand<'s> {
    fn null() -> Self {
        Operand::Value(Cow::Owned(Value::Null))
    }

    fn owned(value: Value) -> Self {
        Operand::Value(Cow::Owned(value))
    }

    fn is_nullish(&self) -> bool {
        matches!(self, Operand::Value(v) if v.is_null())
    }

    fn is_number(&self) -> bool {
        match self {
            Operand::Value(v) => v.is_number(),
            Operand::NonFinite(_) => true,
            Operand::Scope(_) | Operand::Math => false,
        }
    }

    /// Strings and objects make `+` concatenate.
    fn is_textual(&self) -> bool {
        match self {
            Operand::Value(v) => v.is_string() || is_compound(v),
            Operand::Scope(_) | Operand::Math => true,
            Operand::NonFinite(_) => false,
        }
    }

    /// Non-finite numbers leave as their text (`NaN`, `Infinity`, `-Infinity`).
    fn into_value(self) -> Value {
        match self {
            Operand::Value(v) => v.into_owned(),
            Operand::Scope(scope) => scope.to_value(),
            Operand::Math => Value::String("[object Math]".to_string()),
            Operand::NonFinite(n) => Value::String(format_number(n)),
        }
    }

    fn to_value(&self) -> Cow<'_, Value> {
        match self {
            Operand::Value(v) => Cow::Borrowed(v.as_ref()),
            Operand::Scope(scope) => Cow::Owned(scope.to_value()),
            other => Cow::Owned(other.text().into()),
        }
    }

    fn to_number(&self) -> f64 {
        match self {
            Operand::Value(v) => to_number(v),
            Operand::NonFinite(n) => *n,
            Operand::Scope(_) | Operand::Math => f64::NAN,
        }
    }

    fn text(&self) -> String {
        match self {
            Operand::Value(v) => to_text(v),
            Operand::Scope(scope) => to_text(&scope.to_value()),
            Operand::Math => "[object Math]".to_string(),
            Operand::NonFinite(n) => format_number(*n),
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Operand::Value(v) => truthy(v),
            Operand::Scope(_) | Operand::Math => true,
            Operand::NonFinite(n) => !n.is_nan(),
        }
    }
}

/// Wrap an arithmetic result, keeping NaN and infinities as numbers.
fn numeric<'s>(n: f64) -> Operand<'s> {
    if n.is_finite() {
        Operand::owned(number(n))
    } else {
        Operand::NonFinite(n)
    }
}

impl<'s> From<Binding<'s>> for Operand<'s> {
    fn from(binding: Binding<'s>) -> Self {
        match binding {
            Binding::Value(v) => Operand::Value(v),
            Binding::Scope(scope) => Operand::Scope(scope),
        }
    }
}

pub fn evaluate<'s>(expr: &Expr, scope: &'s Scope<'s>) -> Result<Value, EvalError> {
    eval(expr, scope).map(Operand::into_value)
}

/// Truthiness of `expr`, decided before the result is turned into a `Value`.
pub fn test<'s>(expr: &Expr, scope: &'s Scope<'s>) -> Result<bool, EvalError> {
    eval(expr, scope).map(|operand| operand.truthy())
}

fn eval<'s>(expr: &Expr, scope: &'s Scope<'s>) -> Result<Operand<'s>, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(Operand::owned(value.clone())),
        Expr::Ident(name) => lookup(name, scope),
        Expr::Member {
            object,
            property,
            optional,
        } => {
            let object = eval(object, scope)?;
            if *optional && object.is_nullish() {
                return Ok(Operand::null());
            }
            member(object, property)
        }
        Expr::Index {
            object,
            index,
            optional,
        } => {
            let object = eval(object, scope)?;
            if *optional && object.is_nullish() {
                return Ok(Operand::null());
            }
            let key = eval(index, scope)?.into_value();
            let position = key
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                .map(|f| f as usize);
            match position {
                Some(position) if matches!(&object, Operand::Value(v) if v.is_array()) => {
                    Ok(element(object, position))
                }
                _ => member(object, &to_text(&key)),
            }
        }
        Expr::Call {
            object,
            method,
            args,
            optional,
        } => {
            let object = eval(object, scope)?;
            if *optional && object.is_nullish() {
                return Ok(Operand::null());
            }
            let args = args
                .iter()
                .map(|arg| eval(arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            match object {
                Operand::Math => math(method, &args),
                Operand::NonFinite(n) if matches!(method.as_str(), "toFixed" | "toString") => {
                    Ok(Operand::owned(Value::String(format_number(n))))
                }
                object => {
                    let args: Vec<Value> = args.into_iter().map(Operand::into_value).collect();
                    call(object, method, &args).map(Operand::owned)
                }
            }
        }
        Expr::Unary(op, operand) => {
            let value = eval(operand, scope)?;
            Ok(match op {
                UnaryOp::Not => Operand::owned(Value::Bool(!value.truthy())),
                UnaryOp::Neg => numeric(-value.to_number()),
                UnaryOp::Plus => numeric(value.to_number()),
            })
        }
        Expr::Binary(left, op, right) => {
            let left = eval(left, scope)?;
            let right = eval(right, scope)?;
            Ok(binary(&left, *op, &right))
        }
        Expr::Logical(left, op, right) => {
            let left = eval(left, scope)?;
            let take_left = match op {
                LogicalOp::And => !left.truthy(),
                LogicalOp::Or => left.truthy(),
                LogicalOp::Nullish => !left.is_nullish(),
            };
            if take_left {
                Ok(left)
            } else {
                eval(right, scope)
            }
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if eval(test, scope)?.truthy() {
                eval(consequent, scope)
            } else {
                eval(alternate, scope)
            }
        }
        Expr::Array(items) => items
            .iter()
            .map(|item| evaluate(item, scope))
            .collect::<Result<Vec<_>, _>>()
            .map(|items| Operand::owned(Value::Array(items))),
        Expr::Object(entries) => {
            let mut object = Map::new();
            for (key, value) in entries {
                object.insert(key.clone(), evaluate(value, scope)?);
            }
            Ok(Operand::owned(Value::Object(object)))
        }
    }
}

fn lookup<'s>(name: &str, scope: &'s Scope<'s>) -> Result<Operand<'s>, EvalError> {
    if name == "$" {
        return Ok(Operand::Scope(scope));
    }
    if let Some(binding) = scope.resolve(name) {
        return Ok(binding.into());
    }
    if name == MATH {
        return Ok(Operand::Math);
    }
    Err(EvalError::Reference(name.to_string()))
}

fn member<'s>(object: Operand<'s>, property: &str) -> Result<Operand<'s>, EvalError> {
    match object {
        Operand::NonFinite(_) => Ok(Operand::null()),
        Operand::Scope(scope) => Ok(scope.get(property).map_or_else(Operand::null, Operand::from)),
        Operand::Math => Ok(match property {
            "PI" => Operand::owned(number(std::f64::consts::PI)),
            "E" => Operand::owned(number(std::f64::consts::E)),
            _ => Operand::null(),
        }),
        Operand::Value(value) => {
            if value.is_null() {
                return Err(EvalError::Type(format!(
                    "cannot read property `{property}` of null"
                )));
            }
            if property == "length" {
                match value.as_ref() {
                    Value::String(s) => return Ok(Operand::owned(Value::from(s.chars().count()))),
                    Value::Array(items) => return Ok(Operand::owned(Value::from(items.len()))),
                    _ => {}
                }
            }
            Ok(match value {
                Cow::Borrowed(v) => v
                    .get(property)
                    .map_or_else(Operand::null, |child| Operand::Value(Cow::Borrowed(child))),
                Cow::Owned(mut v) => v
                    .get_mut(property)
                    .map_or_else(Operand::null, |child| Operand::owned(child.take())),
            })
        }
    }
}

fn element(array: Operand<'_>, position: usize) -> Operand<'_> {
    match array {
        Operand::Value(Cow::Borrowed(v)) => v
            .get(position)
            .map_or_else(Operand::null, |item| Operand::Value(Cow::Borrowed(item))),
        Operand::Value(Cow::Owned(mut v)) => v
            .get_mut(position)
            .map_or_else(Operand::null, |item| Operand::owned(item.take())),
        _ => Operand::null(),
    }
}

fn binary<'s>(left: &Operand<'_>, op: BinOp, right: &Operand<'_>) -> Operand<'s> {
    let result = match op {
        BinOp::Add => {
            return if left.is_textual() || right.is_textual() {
                Operand::owned(Value::String(format!("{}{}", left.text(), right.text())))
            } else {
                numeric(left.to_number() + right.to_number())
            };
        }
        BinOp::Sub => return numeric(left.to_number() - right.to_number()),
        BinOp::Mul => return numeric(left.to_number() * right.to_number()),
        BinOp::Div => return numeric(left.to_number() / right.to_number()),
        BinOp::Rem => return numeric(left.to_number() % right.to_number()),
        BinOp::Eq => loose_equal(left, right),
        BinOp::NotEq => !loose_equal(left, right),
        BinOp::StrictEq => strict_equal(left, right),
        BinOp::StrictNotEq => !strict_equal(left, right),
        BinOp::Lt => ordering(left, right) == Some(Ordering::Less),
        BinOp::LtEq => matches!(
            ordering(left, right),
            Some(Ordering::Less | Ordering::Equal)
        ),
        BinOp::Gt => ordering(left, right) == Some(Ordering::Greater),
        BinOp::GtEq => matches!(
            ordering(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        ),
    };
    Operand::owned(Value::Bool(result))
}

fn loose_equal(left: &Operand<'_>, right: &Operand<'_>) -> bool {
    match (left, right) {
        (Operand::NonFinite(_), other) | (other, Operand::NonFinite(_)) => {
            !other.is_nullish() && left.to_number() == right.to_number()
        }
        _ => loose_eq(&left.to_value(), &right.to_value()),
    }
}

fn strict_equal(left: &Operand<'_>, right: &Operand<'_>) -> bool {
    match (left, right) {
        (Operand::NonFinite(_), _) | (_, Operand::NonFinite(_)) => {
            left.is_number() && right.is_number() && left.to_number() == right.to_number()
        }
        _ => strict_eq(&left.to_value(), &right.to_value()),
    }
}

/// NaN is unordered against everything, so every comparison with it fails.
fn ordering(left: &Operand<'_>, right: &Operand<'_>) -> Option<Ordering> {
    match (left, right) {
        (Operand::NonFinite(_), _) | (_, Operand::NonFinite(_)) => {
            left.to_number().partial_cmp(&right.to_number())
        }
        _ => compare(&left.to_value(), &right.to_value()),
    }
}

fn is_compound(value: &Value) -> bool {
    value.is_array() || value.is_object()
}

fn call(object: Operand<'_>, method: &str, args: &[Value]) -> Result<Value, EvalError> {
    let target = object.into_value();
    let arg = |i: usize| args.get(i).unwrap_or(&NULL);

    match (&target, method) {
        (Value::Null, _) => Err(EvalError::Type(format!(
            "cannot call `{method}` on null"
        ))),
        (_, "toString") => Ok(Value::String(to_text(&target))),
        (Value::String(s), "toUpperCase") => Ok(Value::String(s.to_uppercase())),
        (Value::String(s), "toLowerCase") => Ok(Value::String(s.to_lowercase())),
        (Value::String(s), "trim") => Ok(Value::String(s.trim().to_string())),
        (Value::String(s), "startsWith") => Ok(Value::Bool(s.starts_with(&to_text(arg(0))))),
        (Value::String(s), "endsWith") => Ok(Value::Bool(s.ends_with(&to_text(arg(0))))),
        (Value::String(s), "includes") => Ok(Value::Bool(s.contains(&to_text(arg(0))))),
        (Value::String(s), "indexOf") => Ok(match s.find(&to_text(arg(0))) {
            Some(byte) => Value::from(s[..byte].chars().count()),
            None => Value::from(-1),
        }),
        (Value::String(s), "split") => {
            let separator = to_text(arg(0));
            let parts: Vec<Value> = if separator.is_empty() {
                s.chars().map(|c| Value::String(c.to_string())).collect()
            } else {
                s.split(separator.as_str())
                    .map(|part| Value::String(part.to_string()))
                    .collect()
            };
            Ok(Value::Array(parts))
        }
        (Value::String(s), "slice") => {
            let chars: Vec<char> = s.chars().collect();
            let (start, end) = slice_bounds(chars.len(), args);
            Ok(Value::String(chars[start..end].iter().collect()))
        }
        (Value::Array(items), "slice") => {
            let (start, end) = slice_bounds(items.len(), args);
            Ok(Value::Array(items[start..end].to_vec()))
        }
        (Value::Array(items), "join") => {
            let separator = match arg(0) {
                Value::Null => ",".to_string(),
                other => to_text(other),
            };
            let parts: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Value::Null => String::new(),
                    other => to_text(other),
                })
                .collect();
            Ok(Value::String(parts.join(&separator)))
        }
        (Value::Array(items), "includes") => {
            Ok(Value::Bool(items.iter().any(|item| strict_eq(item, arg(0)))))
        }
        (Value::Array(items), "indexOf") => Ok(items
            .iter()
            .position(|item| strict_eq(item, arg(0)))
            .map_or(Value::from(-1), Value::from)),
        (Value::Number(n), "toFixed") => {
            let digits = to_number(arg(0));
            let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 100.0) as usize };
            Ok(Value::String(format!(
                "{:.*}",
                digits,
                n.as_f64().unwrap_or(f64::NAN)
            )))
        }
        _ => Err(EvalError::Type(format!("`{method}` is not a function"))),
    }
}

/// Resolve `slice(start, end)` arguments, with negative offsets counted from the end.
fn slice_bounds(len: usize, args: &[Value]) -> (usize, usize) {
    let resolve = |value: Option<&Value>, default: usize| -> usize {
        match value {
            None | Some(Value::Null) => default,
            Some(v) => {
                let n = to_number(v);
                if n.is_nan() {
                    0
                } else if n < 0.0 {
                    len.saturating_sub((-n) as usize)
                } else {
                    (n as usize).min(len)
                }
            }
        }
    };
    let start = resolve(args.first(), 0);
    let end = resolve(args.get(1), len);
    (start, end.max(start))
}

fn math<'s>(method: &str, args: &[Operand<'_>]) -> Result<Operand<'s>, EvalError> {
    let numbers: Vec<f64> = args.iter().map(Operand::to_number).collect();
    let first = numbers.first().copied().unwrap_or(f64::NAN);
    let result = match method {
        "round" => (first + 0.5).floor(),
        "floor" => first.floor(),
        "ceil" => first.ceil(),
        "abs" => first.abs(),
        "min" | "max" if numbers.iter().any(|n| n.is_nan()) => f64::NAN,
        "min" => numbers.iter().copied().fold(f64::INFINITY, f64::min),
        "max" => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        _ => {
            return Err(EvalError::Type(format!(
                "`Math.{method}` is not a function"
            )))
        }
    };
    Ok(numeric(result))
}
