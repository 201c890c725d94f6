//! Evaluator for row predicates.

use std::cmp::Ordering;
use std::ops::AddAssign;

use super::ast::{FieldCondition, Operand, OperandKind, Operator, Predicate, Quantifier};
use super::coerce::{eq_ignore_case, parse_bool, parse_date, parse_number};
use super::columns::ColumnMapping;
use super::error::PredicateError;

/// Typed comparisons that met a cell they could not parse and so did not match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoftFailures {
    pub number: u64,
    pub date: u64,
    pub boolean: u64,
}

impl SoftFailures {
    pub fn total(&self) -> u64 {
        self.number + self.date + self.boolean
    }
}

impl AddAssign for SoftFailures {
    fn add_assign(&mut self, other: Self) {
        self.number += other.number;
        self.date += other.date;
        self.boolean += other.boolean;
    }
}

/// Evaluate a predicate against one row.
///
/// Cells past the end of a short row read as empty strings. A field missing from
/// `columns` is an error when its condition is reached. `And` and `Or` stop at the
/// first deciding child, so an unknown field can go unnoticed on some rows; run
/// [`validate`] first to reject it for every row.
pub fn evaluate<S: AsRef<str>>(
    predicate: &Predicate,
    row: &[S],
    columns: &ColumnMapping,
) -> Result<bool, PredicateError> {
    evaluate_traced(predicate, row, columns, &mut SoftFailures::default())
}

/// Like [`evaluate`], counting unparseable cells into `soft`.
pub fn evaluate_traced<S: AsRef<str>>(
    predicate: &Predicate,
    row: &[S],
    columns: &ColumnMapping,
    soft: &mut SoftFailures,
) -> Result<bool, PredicateError> {
    match predicate {
        Predicate::And(children) => {
            for child in children {
                if !evaluate_traced(child, row, columns, soft)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }

        Predicate::Or(children) => {
            for child in children {
                if evaluate_traced(child, row, columns, soft)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }

        Predicate::Not(inner) => Ok(!evaluate_traced(inner, row, columns, soft)?),

        Predicate::Condition(condition) => evaluate_condition(condition, row, columns, soft),
    }
}

fn evaluate_condition<S: AsRef<str>>(
    condition: &FieldCondition,
    row: &[S],
    columns: &ColumnMapping,
    soft: &mut SoftFailures,
) -> Result<bool, PredicateError> {
    let idx = columns
        .index_of(&condition.field)
        .ok_or_else(|| PredicateError::UnknownField {
            field: condition.field.clone(),
        })?;
    let cell = row.get(idx).map(AsRef::as_ref).unwrap_or("");

    if !columns.is_multi_value(idx) {
        return test_value(condition, cell, soft);
    }

    let candidates = cell.split(',').map(str::trim);
    match condition.op.quantifier() {
        Quantifier::Any => {
            for value in candidates {
                if test_value(condition, value, soft)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Quantifier::All => {
            for value in candidates {
                if !test_value(condition, value, soft)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

fn mismatch(condition: &FieldCondition) -> PredicateError {
    PredicateError::OperandMismatch {
        field: condition.field.clone(),
        op: condition.op,
        expected: condition.op.operand_kind(),
    }
}

/// Apply the operator to a single candidate value.
fn test_value(
    condition: &FieldCondition,
    value: &str,
    soft: &mut SoftFailures,
) -> Result<bool, PredicateError> {
    let op = condition.op;
    match (op, &condition.operand) {
        (Operator::Eq, Operand::Text(expected)) => Ok(eq_ignore_case(value, expected)),
        (Operator::Ne, Operand::Text(expected)) => Ok(!eq_ignore_case(value, expected)),
        (Operator::Contains, Operand::Text(needle)) => {
            Ok(value.to_lowercase().contains(&needle.to_lowercase()))
        }
        (Operator::StartsWith, Operand::Text(prefix)) => {
            Ok(value.to_lowercase().starts_with(&prefix.to_lowercase()))
        }
        (Operator::EndsWith, Operand::Text(suffix)) => {
            Ok(value.to_lowercase().ends_with(&suffix.to_lowercase()))
        }
        (Operator::Regex, Operand::Pattern(pattern)) => Ok(pattern.regex()?.is_match(value)),

        (Operator::Gt | Operator::Lt | Operator::Ge | Operator::Le, Operand::Number(expected)) => {
            match parse_number(value) {
                Some(actual) => Ok(compare(op, actual.partial_cmp(expected))),
                None => {
                    soft.number += 1;
                    Ok(false)
                }
            }
        }

        (
            Operator::DateEq
            | Operator::DateNe
            | Operator::DateGt
            | Operator::DateLt
            | Operator::DateGe
            | Operator::DateLe,
            Operand::Text(expected),
        ) => {
            let Some(expected) = parse_date(expected) else {
                return Ok(false);
            };
            match parse_date(value) {
                Some(actual) => Ok(compare(op, Some(actual.cmp(&expected)))),
                None => {
                    soft.date += 1;
                    Ok(false)
                }
            }
        }

        (Operator::BoolEq | Operator::BoolNe, Operand::Bool(expected)) => match parse_bool(value) {
            Some(actual) => Ok(compare(op, Some(actual.cmp(expected)))),
            None => {
                soft.boolean += 1;
                Ok(false)
            }
        },

        (Operator::Custom, Operand::Custom(func)) => Ok(func.call(value)),

        _ => Err(mismatch(condition)),
    }
}

/// Map an ordering to the operator's verdict. `None` (incomparable) never matches.
fn compare(op: Operator, ordering: Option<Ordering>) -> bool {
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        Operator::Gt | Operator::DateGt => ordering.is_gt(),
        Operator::Lt | Operator::DateLt => ordering.is_lt(),
        Operator::Ge | Operator::DateGe => ordering.is_ge(),
        Operator::Le | Operator::DateLe => ordering.is_le(),
        Operator::DateEq | Operator::BoolEq => ordering.is_eq(),
        Operator::DateNe | Operator::BoolNe => ordering.is_ne(),
        _ => false,
    }
}

/// Check every condition against the column mapping without looking at any row.
///
/// Reports unknown fields, operands of the wrong kind, non-finite numbers, invalid
/// regexes and unparseable date operands.
pub fn validate(predicate: &Predicate, columns: &ColumnMapping) -> Result<(), PredicateError> {
    for condition in predicate.conditions() {
        if columns.index_of(&condition.field).is_none() {
            return Err(PredicateError::UnknownField {
                field: condition.field.clone(),
            });
        }

        let expected = condition.op.operand_kind();
        if !condition.operand.kind_matches(expected) {
            return Err(mismatch(condition));
        }

        match &condition.operand {
            Operand::Pattern(pattern) => {
                pattern.regex()?;
            }
            Operand::Number(value) if !value.is_finite() => {
                return Err(PredicateError::NonFiniteNumber {
                    field: condition.field.clone(),
                    op: condition.op,
                    value: *value,
                });
            }
            Operand::Text(value) if expected == OperandKind::Date => {
                if parse_date(value).is_none() {
                    return Err(PredicateError::InvalidDate {
                        field: condition.field.clone(),
                        value: value.clone(),
                    });
                }
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::*;

    fn columns() -> ColumnMapping {
        ColumnMapping::new(vec![
            Column::single("UF"),
            Column::single("EMAIL"),
            Column::single("SITUACAO"),
            Column::multi("CNAE_SEC"),
            Column::single("CAPITAL"),
            Column::single("ABERTURA"),
            Column::single("OPTANTE"),
        ])
        .unwrap()
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn sample() -> Vec<String> {
        row(&["MG", "contato@empresa.com.br", "ativa", "A, B, C", "1500,50", "20170118", "S"])
    }

    fn eval(predicate: &Predicate) -> bool {
        evaluate(predicate, &sample(), &columns()).unwrap()
    }

    #[test]
    fn test_vacuous_combinators() {
        assert!(eval(&and([])));
        assert!(!eval(&or([])));
    }

    #[test]
    fn test_not_inverts() {
        let p = eq("UF", "MG");
        assert!(eval(&p));
        assert!(!eval(&not(p)));
    }

    #[test]
    fn test_case_insensitive_text() {
        assert!(eval(&eq("SITUACAO", "ATIVA")));
        assert!(eval(&contains("EMAIL", "@EMPRESA")));
        assert!(eval(&startswith("EMAIL", "Contato")));
        assert!(eval(&endswith("EMAIL", ".COM.BR")));
        assert!(eval(&regex("EMAIL", r"^CONTATO@")));
        assert!(!eval(&ne("SITUACAO", "Ativa")));
    }

    #[test]
    fn test_multi_value_asymmetry() {
        assert!(eval(&eq("CNAE_SEC", "B")));
        assert!(eval(&eq("CNAE_SEC", "b")));
        assert!(!eval(&ne("CNAE_SEC", "B")));
        assert!(eval(&ne("CNAE_SEC", "D")));
        assert!(eval(&contains("CNAE_SEC", "c")));
        assert!(eval(&regex("CNAE_SEC", "^a$")));
        assert!(!eval(&eq("CNAE_SEC", "A, B")));
    }

    #[test]
    fn test_single_value_column_is_not_split() {
        let cols = ColumnMapping::from_names(["CNAE_SEC"]).unwrap();
        let r = row(&["A, B, C"]);
        assert!(!evaluate(&eq("CNAE_SEC", "B"), &r, &cols).unwrap());
        assert!(evaluate(&eq("CNAE_SEC", "a, b, c"), &r, &cols).unwrap());
    }

    #[test]
    fn test_numeric_comparison() {
        assert!(eval(&gt("CAPITAL", 1000.0)));
        assert!(eval(&ge("CAPITAL", 1500.5)));
        assert!(eval(&le("CAPITAL", 1500.5)));
        assert!(!eval(&lt("CAPITAL", 1500.0)));
    }

    #[test]
    fn test_unparseable_cells_do_not_match() {
        let mut soft = SoftFailures::default();
        let cols = columns();
        let r = sample();
        for p in [
            gt("UF", 0.0),
            lt("UF", 0.0),
            date_gt("UF", "20000101"),
            date_ne("UF", "20000101"),
            bool_eq("UF", true),
            bool_ne("UF", true),
        ] {
            assert!(!evaluate_traced(&p, &r, &cols, &mut soft).unwrap());
        }
        assert_eq!(
            soft,
            SoftFailures {
                number: 2,
                date: 2,
                boolean: 2
            }
        );
    }

    #[test]
    fn test_dates() {
        assert!(eval(&date_eq("ABERTURA", "2017-01-18")));
        assert!(eval(&date_gt("ABERTURA", "20161231")));
        assert!(eval(&date_le("ABERTURA", "20170118")));
        assert!(!eval(&date_lt("ABERTURA", "20170118")));
        assert!(eval(&date_ne("ABERTURA", "20170119")));
        assert!(!eval(&date_eq("ABERTURA", "not-a-date")));
    }

    #[test]
    fn test_booleans() {
        assert!(eval(&bool_eq("OPTANTE", true)));
        assert!(!eval(&bool_ne("OPTANTE", true)));
        assert!(eval(&bool_ne("OPTANTE", false)));
    }

    #[test]
    fn test_custom() {
        let long_email = custom("EMAIL", "long", |v| v.len() > 10);
        assert!(eval(&long_email));

        let seen = custom("CNAE_SEC", "is_c", |v| v == "C");
        assert!(eval(&seen));
    }

    #[test]
    fn test_unknown_field_errors_regardless_of_row() {
        let cols = columns();
        let p = or([eq("UF", "MG"), eq("MISSING", "x")]);
        // short-circuit hides the bad field from this row
        assert!(evaluate(&p, &sample(), &cols).unwrap());
        let err = evaluate(&eq("MISSING", "x"), &row(&[]), &cols).unwrap_err();
        assert!(err.is_lookup());
        assert!(validate(&p, &cols).unwrap_err().is_lookup());
    }

    #[test]
    fn test_short_row_reads_empty() {
        let cols = columns();
        let r = row(&["MG"]);
        assert!(evaluate(&eq("SITUACAO", ""), &r, &cols).unwrap());
        assert!(!evaluate(&ne("CNAE_SEC", ""), &r, &cols).unwrap());
    }

    #[test]
    fn test_operand_mismatch() {
        let p = condition("UF", Operator::Gt, Operand::Text("10".into()));
        let cols = columns();
        assert!(matches!(
            evaluate(&p, &sample(), &cols),
            Err(PredicateError::OperandMismatch { .. })
        ));
        assert!(matches!(
            validate(&p, &cols),
            Err(PredicateError::OperandMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_reports_bad_regex_and_date() {
        let cols = columns();
        assert!(matches!(
            validate(&regex("UF", "(unclosed"), &cols),
            Err(PredicateError::InvalidPattern { .. })
        ));
        assert!(matches!(
            validate(&date_gt("ABERTURA", "yesterday"), &cols),
            Err(PredicateError::InvalidDate { .. })
        ));
        assert!(validate(&and([eq("UF", "MG"), date_gt("ABERTURA", "20200101")]), &cols).is_ok());
    }

    #[test]
    fn test_validate_rejects_non_finite_numbers() {
        let cols = ColumnMapping::from_names(["CAPITAL"]).unwrap();
        assert!(matches!(
            validate(&gt("CAPITAL", f64::INFINITY), &cols),
            Err(PredicateError::NonFiniteNumber { .. })
        ));
        assert!(matches!(
            validate(&not(le("CAPITAL", f64::NAN)), &cols),
            Err(PredicateError::NonFiniteNumber { .. })
        ));
        assert!(validate(&gt("CAPITAL", 1e300), &cols).is_ok());
    }

    #[test]
    fn test_or_hides_unknown_field_until_validated() {
        let cols = ColumnMapping::from_names(["UF"]).unwrap();
        let p = or([eq("UF", "MG"), eq("NOPE", "x")]);
        assert!(evaluate(&p, &["MG"], &cols).unwrap());
        assert!(evaluate(&p, &["SP"], &cols).is_err());
        assert!(matches!(
            validate(&p, &cols),
            Err(PredicateError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_end_to_end_scenario() {
        let cols = ColumnMapping::from_names(["UF", "EMAIL"]).unwrap();
        let p = and([eq("UF", "MG"), not(contains("EMAIL", "@gmail"))]);
        assert!(evaluate(&p, &["MG", "a@biz.com"], &cols).unwrap());
        assert!(!evaluate(&p, &["MG", "a@gmail.com"], &cols).unwrap());
        assert!(!evaluate(&p, &["SP", "a@biz.com"], &cols).unwrap());
    }
}
