//! AST types for row predicates.

use regex::{Regex, RegexBuilder};
use std::fmt;
use std::str::FromStr;

use super::custom::CustomFn;
use super::error::PredicateError;

/// Root predicate expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Boolean AND: `expr1 & expr2`. Empty is always true.
    And(Vec<Predicate>),

    /// Boolean OR: `expr1 | expr2`. Empty is always false.
    Or(Vec<Predicate>),

    /// Boolean NOT: `!expr`
    Not(Box<Predicate>),

    /// Leaf test against one named column: `UF eq "MG"`
    Condition(FieldCondition),
}

/// A single column test.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    pub field: String,
    pub op: Operator,
    pub operand: Operand,
}

/// Field operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Contains,
    StartsWith,
    EndsWith,
    Regex,
    Gt,
    Lt,
    Ge,
    Le,
    DateEq,
    DateNe,
    DateGt,
    DateLt,
    DateGe,
    DateLe,
    BoolEq,
    BoolNe,
    Custom,
}

/// How a condition combines the candidates of a multi-value cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    /// At least one candidate must pass.
    Any,
    /// Every candidate must pass.
    All,
}

/// Operand kind an operator expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    Text,
    Number,
    Date,
    Bool,
    Pattern,
    Custom,
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OperandKind::Text => "a text",
            OperandKind::Number => "a numeric",
            OperandKind::Date => "a date",
            OperandKind::Bool => "a boolean",
            OperandKind::Pattern => "a regex",
            OperandKind::Custom => "a custom function",
        };
        f.write_str(label)
    }
}

impl Operator {
    pub const ALL: [Operator; 19] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Contains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::Regex,
        Operator::Gt,
        Operator::Lt,
        Operator::Ge,
        Operator::Le,
        Operator::DateEq,
        Operator::DateNe,
        Operator::DateGt,
        Operator::DateLt,
        Operator::DateGe,
        Operator::DateLe,
        Operator::BoolEq,
        Operator::BoolNe,
        Operator::Custom,
    ];

    /// Canonical name, as written in filter text and configuration.
    pub fn name(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Contains => "contains",
            Operator::StartsWith => "startswith",
            Operator::EndsWith => "endswith",
            Operator::Regex => "regex",
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Ge => "ge",
            Operator::Le => "le",
            Operator::DateEq => "date_eq",
            Operator::DateNe => "date_ne",
            Operator::DateGt => "date_gt",
            Operator::DateLt => "date_lt",
            Operator::DateGe => "date_ge",
            Operator::DateLe => "date_le",
            Operator::BoolEq => "bool_eq",
            Operator::BoolNe => "bool_ne",
            Operator::Custom => "custom",
        }
    }

    pub fn operand_kind(self) -> OperandKind {
        match self {
            Operator::Eq
            | Operator::Ne
            | Operator::Contains
            | Operator::StartsWith
            | Operator::EndsWith => OperandKind::Text,
            Operator::Regex => OperandKind::Pattern,
            Operator::Gt | Operator::Lt | Operator::Ge | Operator::Le => OperandKind::Number,
            Operator::DateEq
            | Operator::DateNe
            | Operator::DateGt
            | Operator::DateLt
            | Operator::DateGe
            | Operator::DateLe => OperandKind::Date,
            Operator::BoolEq | Operator::BoolNe => OperandKind::Bool,
            Operator::Custom => OperandKind::Custom,
        }
    }

    /// Negated equality operators mean "none of the values", everything else "any of them".
    pub fn quantifier(self) -> Quantifier {
        match self {
            Operator::Ne | Operator::DateNe | Operator::BoolNe => Quantifier::All,
            _ => Quantifier::Any,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operator {
    type Err = PredicateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "starts_with" => return Ok(Operator::StartsWith),
            "ends_with" => return Ok(Operator::EndsWith),
            _ => {}
        }
        Operator::ALL
            .into_iter()
            .find(|op| op.name() == lowered)
            .ok_or_else(|| PredicateError::UnknownOperator(value.to_string()))
    }
}

/// The right-hand side of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Text for string operators, or a `YYYYMMDD` / `YYYY-MM-DD` date for date operators.
    Text(String),
    Number(f64),
    Bool(bool),
    Pattern(Pattern),
    Custom(CustomFn),
}

impl Operand {
    pub fn kind_matches(&self, expected: OperandKind) -> bool {
        matches!(
            (self, expected),
            (Operand::Text(_), OperandKind::Text | OperandKind::Date)
                | (Operand::Number(_), OperandKind::Number)
                | (Operand::Bool(_), OperandKind::Bool)
                | (Operand::Pattern(_), OperandKind::Pattern)
                | (Operand::Custom(_), OperandKind::Custom)
        )
    }
}

/// A case-insensitive regex, compiled once when the predicate is built.
///
/// An invalid pattern is kept rather than rejected so predicate construction stays infallible;
/// validation and evaluation report it as a configuration error.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    compiled: Result<Regex, String>,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let compiled = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .map_err(|e| e.to_string());
        Self { source, compiled }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn regex(&self) -> Result<&Regex, PredicateError> {
        self.compiled
            .as_ref()
            .map_err(|message| PredicateError::InvalidPattern {
                pattern: self.source.clone(),
                message: message.clone(),
            })
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("source", &self.source)
            .field("valid", &self.compiled.is_ok())
            .finish()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in text.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            other => write!(f, "{other}")?,
        }
    }
    f.write_str("\"")
}

/// Bare identifier text the lexer reads back as a name, not a keyword.
fn is_plain_name(name: &str) -> bool {
    let mut chars = name.chars();
    let leads = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_');
    leads
        && chars.all(|c| c.is_alphanumeric() || c == '_')
        && !name.eq_ignore_ascii_case("true")
        && !name.eq_ignore_ascii_case("false")
}

fn write_name(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    if is_plain_name(name) {
        f.write_str(name)
    } else {
        write_quoted(f, name)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Text(text) => write_quoted(f, text),
            Operand::Number(n) => write!(f, "{n}"),
            Operand::Bool(b) => write!(f, "{b}"),
            Operand::Pattern(p) => write_quoted(f, p.source()),
            Operand::Custom(c) => write_name(f, c.name()),
        }
    }
}

impl fmt::Display for FieldCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_name(f, &self.field)?;
        write!(f, " {} {}", self.op, self.operand)
    }
}

/// Writes the filter text form; `parse_filter` reads it back.
impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::And(children) if children.is_empty() => f.write_str("true"),
            Predicate::Or(children) if children.is_empty() => f.write_str("false"),
            Predicate::And(children) => write_joined(f, children, " & "),
            Predicate::Or(children) => write_joined(f, children, " | "),
            Predicate::Not(inner) => match inner.as_ref() {
                Predicate::Condition(_) => write!(f, "!({inner})"),
                _ => write!(f, "!{inner}"),
            },
            Predicate::Condition(condition) => write!(f, "{condition}"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Predicate], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{child}")?;
    }
    f.write_str(")")
}

impl Predicate {
    /// Visit every leaf condition, depth first.
    pub fn conditions(&self) -> Vec<&FieldCondition> {
        let mut out = Vec::new();
        self.collect_conditions(&mut out);
        out
    }

    fn collect_conditions<'a>(&'a self, out: &mut Vec<&'a FieldCondition>) {
        match self {
            Predicate::And(children) | Predicate::Or(children) => {
                for child in children {
                    child.collect_conditions(out);
                }
            }
            Predicate::Not(inner) => inner.collect_conditions(out),
            Predicate::Condition(condition) => out.push(condition),
        }
    }
}
