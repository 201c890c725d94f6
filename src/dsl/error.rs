use thiserror::Error;

use super::ast::{OperandKind, Operator};

/// Filter configuration errors.
///
/// Every variant is a bug in the filter or column definition, not in the data, so a run
/// surfaces it before processing rows.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredicateError {
    #[error("unknown field '{field}': not in the column mapping")]
    UnknownField { field: String },

    #[error("duplicate column '{0}' in the column mapping")]
    DuplicateColumn(String),

    #[error("operator '{op}' on field '{field}' expects {expected} operand")]
    OperandMismatch {
        field: String,
        op: Operator,
        expected: OperandKind,
    },

    #[error("operator '{op}' on field '{field}' needs a finite number, got {value}")]
    NonFiniteNumber {
        field: String,
        op: Operator,
        value: f64,
    },

    #[error("invalid regex '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("invalid date '{value}' for field '{field}' (expected YYYYMMDD or YYYY-MM-DD)")]
    InvalidDate { field: String, value: String },

    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("unknown custom predicate '{0}'")]
    UnknownCustom(String),

    #[error("filter syntax error: {0}")]
    Syntax(String),
}

impl PredicateError {
    /// Field reference that the column mapping cannot resolve.
    pub fn is_lookup(&self) -> bool {
        matches!(self, PredicateError::UnknownField { .. })
    }
}
