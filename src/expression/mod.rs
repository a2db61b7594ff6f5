// Expression module: the per-record field-expression language
// Author: Gabriel Demetrios Lafis

mod array;
mod condition;
mod date;
mod string;

pub use array::*;
pub use condition::*;
pub use date::*;
pub use string::*;

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::data::{get_path, Record, Value};

/// An expression computing a derived value from one record.
///
/// Evaluation is total: it never fails, and `None` stands for "undefined"
/// (absent), as opposed to an explicit `Value::Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Expression {
    /// Dot-path lookup
    Field { path: String },
    /// Embedded constant
    Literal { value: Value },
    /// Stringify children and join them
    Concat {
        values: Vec<Expression>,
        #[serde(default)]
        separator: String,
    },
    /// `{{name}}` substitution from top-level fields
    Template { template: String },
    Math {
        operator: MathOperator,
        left: Box<Expression>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        right: Option<Box<Expression>>,
    },
    /// First child that is neither null nor undefined
    Coalesce { values: Vec<Expression> },
    Conditional {
        condition: ExpressionCondition,
        then: Box<Expression>,
        #[serde(rename = "else", default, skip_serializing_if = "Option::is_none")]
        otherwise: Option<Box<Expression>>,
    },
    Date(DateExpression),
    Array(ArrayExpression),
    String(StringExpression),
}

/// Math operator. Binary operators use `left` and `right`, unary ones only `left`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MathOperator {
    #[serde(rename = "+", alias = "add")]
    Add,
    #[serde(rename = "-", alias = "subtract")]
    Subtract,
    #[serde(rename = "*", alias = "multiply")]
    Multiply,
    #[serde(rename = "/", alias = "divide")]
    Divide,
    #[serde(rename = "%", alias = "modulo")]
    Modulo,
    #[serde(rename = "round")]
    Round,
    #[serde(rename = "floor")]
    Floor,
    #[serde(rename = "ceil")]
    Ceil,
    #[serde(rename = "abs")]
    Abs,
}

impl MathOperator {
    pub fn is_unary(&self) -> bool {
        matches!(
            self,
            MathOperator::Round | MathOperator::Floor | MathOperator::Ceil | MathOperator::Abs
        )
    }
}

impl Expression {
    pub fn field(path: &str) -> Self {
        Expression::Field {
            path: path.to_string(),
        }
    }

    pub fn literal<V: Into<Value>>(value: V) -> Self {
        Expression::Literal {
            value: value.into(),
        }
    }

    pub fn math(operator: MathOperator, left: Expression, right: Option<Expression>) -> Self {
        Expression::Math {
            operator,
            left: Box::new(left),
            right: right.map(Box::new),
        }
    }

    /// Evaluate the expression against a record
    pub fn evaluate(&self, record: &Record) -> Option<Value> {
        evaluate(self, record)
    }
}

/// Evaluate an expression against a record
pub fn evaluate(expr: &Expression, record: &Record) -> Option<Value> {
    match expr {
        Expression::Field { path } => get_path(record, path).cloned(),
        Expression::Literal { value } => Some(value.clone()),
        Expression::Concat { values, separator } => {
            let parts: Vec<String> = values
                .iter()
                .map(|e| evaluate(e, record).map(|v| v.to_text()).unwrap_or_default())
                .collect();
            Some(Value::String(parts.join(separator)))
        }
        Expression::Template { template } => Some(Value::String(render_template(template, record))),
        Expression::Math {
            operator,
            left,
            right,
        } => Some(evaluate_math(*operator, left, right.as_deref(), record)),
        Expression::Coalesce { values } => Some(
            values
                .iter()
                .filter_map(|e| evaluate(e, record))
                .find(|v| !v.is_null())
                .unwrap_or(Value::Null),
        ),
        Expression::Conditional {
            condition,
            then,
            otherwise,
        } => {
            if condition.matches(record) {
                evaluate(then, record)
            } else {
                otherwise.as_ref().and_then(|e| evaluate(e, record))
            }
        }
        Expression::Date(date) => date.evaluate(record),
        Expression::Array(array) => array.evaluate(record),
        Expression::String(string) => string.evaluate(record),
    }
}

fn template_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{\s*([^{}\s]+)\s*\}\}").expect("valid template pattern"))
}

/// Replace `{{name}}` placeholders with top-level record fields.
/// Missing or null variables render as the empty string.
fn render_template(template: &str, record: &Record) -> String {
    template_pattern()
        .replace_all(template, |caps: &Captures| {
            record.get(&caps[1]).map(Value::to_text).unwrap_or_default()
        })
        .into_owned()
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn from_value(value: &Value) -> Option<Number> {
        match value {
            Value::Integer(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(Number::Int)
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(Number::Float))
            }
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

fn float_value(f: f64) -> Value {
    if f.is_finite() {
        Value::Float(f)
    } else {
        Value::Null
    }
}

/// Whole floats produced by rounding come back as integers when they fit
fn integral_value(f: f64) -> Value {
    if f.is_finite() && f.abs() < i64::MAX as f64 {
        Value::Integer(f as i64)
    } else {
        float_value(f)
    }
}

/// Math never fails: non-numeric operands and division or modulo by zero
/// yield `Value::Null`.
fn evaluate_math(
    operator: MathOperator,
    left: &Expression,
    right: Option<&Expression>,
    record: &Record,
) -> Value {
    let operand = |e: &Expression| evaluate(e, record).and_then(|v| Number::from_value(&v));

    let Some(a) = operand(left) else {
        return Value::Null;
    };

    if operator.is_unary() {
        return match (operator, a) {
            (MathOperator::Abs, Number::Int(i)) => i.checked_abs().map_or(Value::Null, Value::Integer),
            (MathOperator::Abs, Number::Float(f)) => float_value(f.abs()),
            (_, Number::Int(i)) => Value::Integer(i),
            (MathOperator::Round, Number::Float(f)) => integral_value(f.round()),
            (MathOperator::Floor, Number::Float(f)) => integral_value(f.floor()),
            (_, Number::Float(f)) => integral_value(f.ceil()),
        };
    }

    let Some(b) = right.and_then(operand) else {
        return Value::Null;
    };

    match (a, b) {
        (Number::Int(x), Number::Int(y)) => {
            let exact = match operator {
                MathOperator::Add => x.checked_add(y),
                MathOperator::Subtract => x.checked_sub(y),
                MathOperator::Multiply => x.checked_mul(y),
                MathOperator::Divide if y == 0 => return Value::Null,
                MathOperator::Divide => x.checked_rem(y).filter(|r| *r == 0).and_then(|_| x.checked_div(y)),
                MathOperator::Modulo if y == 0 => return Value::Null,
                MathOperator::Modulo => x.checked_rem(y),
                _ => None,
            };

            match exact {
                Some(i) => Value::Integer(i),
                None => float_math(operator, x as f64, y as f64),
            }
        }
        _ => float_math(operator, a.as_f64(), b.as_f64()),
    }
}

fn float_math(operator: MathOperator, x: f64, y: f64) -> Value {
    match operator {
        MathOperator::Add => float_value(x + y),
        MathOperator::Subtract => float_value(x - y),
        MathOperator::Multiply => float_value(x * y),
        MathOperator::Divide | MathOperator::Modulo if y == 0.0 => Value::Null,
        MathOperator::Divide => float_value(x / y),
        MathOperator::Modulo => float_value(x % y),
        _ => Value::Null,
    }
}
