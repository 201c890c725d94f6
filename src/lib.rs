//! Filtering of Brazilian company registry (CNPJ) extracts.
//!
//! The predicate engine lives in [`dsl`]; the remaining modules decode the
//! registry's `;`-separated files, run the filter in parallel and write the result.

pub mod app;
pub mod config;
pub mod contacts;
pub mod decode;
pub mod dsl;
pub mod encoding;
pub mod expr;
pub mod pipeline;
pub mod sinks;
pub mod utils;
