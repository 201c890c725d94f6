//! Custom predicates written in CEL (Common Expression Language).

mod cel;

pub use self::cel::{CelProgram, cel_custom, compile_cel, evaluate_cel};
