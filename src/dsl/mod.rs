//! Row predicate engine.
//!
//! A predicate is an immutable tree of AND/OR/NOT combinators over field conditions,
//! evaluated against one decoded row at a time. Build one with the constructor
//! functions, or parse filter text:
//!
//!   UF eq "MG"                        - case-insensitive equality (`=` also works)
//!   UF ne "SP"                        - inequality (`!=`)
//!   EMAIL contains "@gmail"           - substring; also startswith, endswith
//!   CNPJ_BASICO regex "^[0-9]{8}$"    - case-insensitive regex search
//!   CAPITAL gt 1000                   - numeric; also lt, ge, le, `>`, `<`, `>=`, `<=`
//!   DATA date_ge "20200101"           - dates; also date_eq, date_ne, date_gt, ...
//!   OPTANTE bool_eq true              - booleans; also bool_ne
//!   NOME custom empty                 - named custom function
//!   expr1 & expr2, expr1 | expr2      - AND, OR (`&` binds tighter)
//!   !expr, (expr), true, false        - NOT, grouping, constants

mod ast;
mod build;
mod coerce;
mod columns;
mod custom;
mod error;
mod eval;
mod lexer;
mod parser;

pub use ast::*;
pub use build::*;
pub use coerce::{parse_bool, parse_date, parse_number};
pub use columns::{Column, ColumnMapping};
pub use custom::{CustomFn, CustomRegistry};
pub use error::PredicateError;
pub use eval::{SoftFailures, evaluate, evaluate_traced, validate};
pub use parser::{parse_filter, parse_filter_with};
