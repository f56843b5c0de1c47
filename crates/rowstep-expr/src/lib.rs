#![forbid(unsafe_code)]
//! rowstep-expr: the expression evaluator consumed by steps.
//!
//! Expressions are parsed once at configuration time into a `Program`.
//! A program is either a plain row expression (`year(dob) / 10`) or an
//! aggregate expression (`sum(v1) / count(v1)`) driven through the
//! accumulator protocol: `accumulators()` -> `accumulate(row)`* -> `finalize()`.
//!
//! Scalar functions are an injected capability (`FunctionSet`); the
//! aggregate functions are fixed (`sum`, `count`, `avg`, `min`, `max`).

pub mod aggregate;
pub mod ast;
pub mod error;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod program;

pub use aggregate::{Accumulator, AggFunc};
pub use ast::{BinaryOp, Expr, UnaryOp};
pub use error::ExprError;
pub use functions::{Builtins, FunctionSet};
pub use program::{ExprEngine, Evaluator, Program};
