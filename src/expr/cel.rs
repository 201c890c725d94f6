//! CEL expression compilation and evaluation.

use anyhow::Result;
use cel::{Context, Program, Value};
use std::sync::Arc;

use crate::dsl::CustomFn;

/// A compiled CEL program ready for evaluation.
#[derive(Clone)]
pub struct CelProgram {
    program: Arc<Program>,
    source: String,
}

impl std::fmt::Debug for CelProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CelProgram")
            .field("source", &self.source)
            .finish()
    }
}

impl CelProgram {
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Compile a CEL expression string into a program.
pub fn compile_cel(source: &str) -> Result<CelProgram> {
    let program =
        Program::compile(source).map_err(|e| anyhow::anyhow!("CEL compile error: {}", e))?;

    Ok(CelProgram {
        program: Arc::new(program),
        source: source.to_string(),
    })
}

/// Evaluate a compiled CEL program with the cell bound to `value`.
pub fn evaluate_cel(program: &CelProgram, value: &str) -> Result<Value> {
    let mut cel_ctx = Context::default();

    cel_ctx
        .add_variable("value", value.to_string())
        .map_err(|e| anyhow::anyhow!("CEL context error: {}", e))?;

    program
        .program
        .execute(&cel_ctx)
        .map_err(|e| anyhow::anyhow!("CEL execution error: {}", e))
}

/// Wrap a CEL program as a named custom predicate.
///
/// A result other than `true`, or a failed execution, counts as no match.
pub fn cel_custom(name: &str, program: CelProgram) -> CustomFn {
    let label = format!("{} ({})", name, program.source());
    CustomFn::new(name, move |value| match evaluate_cel(&program, value) {
        Ok(Value::Bool(matched)) => matched,
        Ok(other) => {
            tracing::debug!("CEL custom '{}' returned non-boolean {:?}", label, other);
            false
        }
        Err(e) => {
            tracing::debug!("CEL custom '{}' failed on {:?}: {}", label, value, e);
            false
        }
    })
}
