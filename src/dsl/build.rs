//! Constructors so filter definitions read declaratively:
//!
//! ```
//! use cnpj_filter::dsl::{and, contains, eq, not, or};
//!
//! let filter = and([
//!     eq("UF", "MG"),
//!     not(or([contains("CORREIO_ELETRONICO", "@gmail"), contains("CORREIO_ELETRONICO", "@hotmail")])),
//! ]);
//! # let _ = filter;
//! ```
//!
//! No column validation happens here; the same predicate can be evaluated against any
//! column mapping that has the referenced fields.

use super::ast::{FieldCondition, Operand, Operator, Pattern, Predicate};
use super::custom::CustomFn;

pub fn and(children: impl IntoIterator<Item = Predicate>) -> Predicate {
    Predicate::And(children.into_iter().collect())
}

pub fn or(children: impl IntoIterator<Item = Predicate>) -> Predicate {
    Predicate::Or(children.into_iter().collect())
}

pub fn not(child: Predicate) -> Predicate {
    Predicate::Not(Box::new(child))
}

/// Build a leaf condition. The caller is responsible for pairing `op` with the operand
/// kind it expects; a mismatch is reported by validation.
pub fn condition(field: impl Into<String>, op: Operator, operand: Operand) -> Predicate {
    Predicate::Condition(FieldCondition {
        field: field.into(),
        op,
        operand,
    })
}

fn text(field: impl Into<String>, op: Operator, value: impl Into<String>) -> Predicate {
    condition(field, op, Operand::Text(value.into()))
}

pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Predicate {
    text(field, Operator::Eq, value)
}

pub fn ne(field: impl Into<String>, value: impl Into<String>) -> Predicate {
    text(field, Operator::Ne, value)
}

pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Predicate {
    text(field, Operator::Contains, value)
}

pub fn startswith(field: impl Into<String>, value: impl Into<String>) -> Predicate {
    text(field, Operator::StartsWith, value)
}

pub fn endswith(field: impl Into<String>, value: impl Into<String>) -> Predicate {
    text(field, Operator::EndsWith, value)
}

/// Case-insensitive regex search (unanchored unless the pattern anchors itself).
pub fn regex(field: impl Into<String>, pattern: impl Into<String>) -> Predicate {
    condition(field, Operator::Regex, Operand::Pattern(Pattern::new(pattern)))
}

pub fn gt(field: impl Into<String>, value: f64) -> Predicate {
    condition(field, Operator::Gt, Operand::Number(value))
}

pub fn lt(field: impl Into<String>, value: f64) -> Predicate {
    condition(field, Operator::Lt, Operand::Number(value))
}

pub fn ge(field: impl Into<String>, value: f64) -> Predicate {
    condition(field, Operator::Ge, Operand::Number(value))
}

pub fn le(field: impl Into<String>, value: f64) -> Predicate {
    condition(field, Operator::Le, Operand::Number(value))
}

pub fn date_eq(field: impl Into<String>, date: impl Into<String>) -> Predicate {
    text(field, Operator::DateEq, date)
}

pub fn date_ne(field: impl Into<String>, date: impl Into<String>) -> Predicate {
    text(field, Operator::DateNe, date)
}

pub fn date_gt(field: impl Into<String>, date: impl Into<String>) -> Predicate {
    text(field, Operator::DateGt, date)
}

pub fn date_lt(field: impl Into<String>, date: impl Into<String>) -> Predicate {
    text(field, Operator::DateLt, date)
}

pub fn date_ge(field: impl Into<String>, date: impl Into<String>) -> Predicate {
    text(field, Operator::DateGe, date)
}

pub fn date_le(field: impl Into<String>, date: impl Into<String>) -> Predicate {
    text(field, Operator::DateLe, date)
}

pub fn bool_eq(field: impl Into<String>, value: bool) -> Predicate {
    condition(field, Operator::BoolEq, Operand::Bool(value))
}

pub fn bool_ne(field: impl Into<String>, value: bool) -> Predicate {
    condition(field, Operator::BoolNe, Operand::Bool(value))
}

/// Test the raw cell with a caller-supplied function, registered under `name`.
pub fn custom<F>(field: impl Into<String>, name: impl Into<String>, func: F) -> Predicate
where
    F: Fn(&str) -> bool + Send + Sync + 'static,
{
    custom_fn(field, CustomFn::new(name, func))
}

pub fn custom_fn(field: impl Into<String>, func: CustomFn) -> Predicate {
    condition(field, Operator::Custom, Operand::Custom(func))
}
