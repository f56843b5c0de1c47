//! Parsed, reusable expressions and the `Evaluator` seam.

use std::fmt;
use std::sync::Arc;

use rowstep_core::types::{Row, Scalar};

use crate::aggregate::{Accumulator, AggFunc};
use crate::ast::Expr;
use crate::error::{ExprError, Result};
use crate::eval::eval_expr;
use crate::functions::{Builtins, FunctionSet};
use crate::parser::parse;

#[derive(Clone)]
struct AggSlot {
    func: AggFunc,
    arg: Option<Expr>,
}

/// A parsed expression bound to the function set it was validated against.
#[derive(Clone)]
pub struct Program {
    source: String,
    expr: Expr,
    slots: Vec<AggSlot>,
    functions: Arc<dyn FunctionSet>,
}

impl Program {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Every identifier the expression reads, including inside calls.
    pub fn idents(&self) -> Vec<String> {
        self.expr.idents()
    }

    /// Identifiers read outside of any aggregate call.
    pub fn free_idents(&self) -> Vec<String> {
        self.expr.free_idents()
    }

    pub fn is_aggregate(&self) -> bool {
        !self.slots.is_empty()
    }

    pub fn eval(&self, row: &Row) -> Result<Scalar> {
        if self.is_aggregate() {
            return Err(ExprError::eval(format!(
                "aggregate expression {:?} evaluated against a single row",
                self.source
            )));
        }
        eval_expr(&self.expr, row, self.functions.as_ref(), None).map_err(ExprError::at_runtime)
    }

    /// Boolean view: `Null` is false, any other non-boolean is an error.
    pub fn eval_bool(&self, row: &Row) -> Result<bool> {
        match self.eval(row)? {
            Scalar::Bool(b) => Ok(b),
            Scalar::Null => Ok(false),
            other => Err(ExprError::eval(format!(
                "expression {:?} is not boolean (got {other})",
                self.source
            ))),
        }
    }

    /// Fresh accumulator state, one per aggregate call.
    pub fn accumulators(&self) -> Vec<Accumulator> {
        self.slots.iter().map(|s| Accumulator::new(s.func)).collect()
    }

    pub fn accumulate(&self, accs: &mut [Accumulator], row: &Row) -> Result<()> {
        self.accumulate_row(accs, row).map_err(ExprError::at_runtime)
    }

    fn accumulate_row(&self, accs: &mut [Accumulator], row: &Row) -> Result<()> {
        for (slot, acc) in self.slots.iter().zip(accs.iter_mut()) {
            match &slot.arg {
                None => acc.update(None)?,
                Some(arg) => {
                    let v = eval_expr(arg, row, self.functions.as_ref(), None)?;
                    acc.update(Some(&v))?;
                }
            }
        }
        Ok(())
    }

    pub fn finalize(&self, accs: &[Accumulator]) -> Result<Scalar> {
        let values: Vec<Scalar> = accs.iter().map(Accumulator::finalize).collect();
        eval_expr(&self.expr, &Row::new(), self.functions.as_ref(), Some(&values))
            .map_err(ExprError::at_runtime)
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("source", &self.source)
            .field("aggregates", &self.slots.len())
            .finish()
    }
}

/// Parses expression text into programs.
pub trait Evaluator: Send + Sync {
    fn parse(&self, src: &str) -> Result<Program>;

    fn eval(&self, src: &str, row: &Row) -> Result<Scalar> {
        self.parse(src)?.eval(row)
    }

    fn eval_bool(&self, src: &str, row: &Row) -> Result<bool> {
        self.parse(src)?.eval_bool(row)
    }

    /// Run an aggregate expression over `rows` in one go.
    fn aggregate(&self, src: &str, rows: &[Row]) -> Result<Scalar> {
        let program = self.parse(src)?;
        let mut accs = program.accumulators();
        for row in rows {
            program.accumulate(&mut accs, row)?;
        }
        program.finalize(&accs)
    }
}

/// Default evaluator over a pluggable function set.
#[derive(Clone)]
pub struct ExprEngine {
    functions: Arc<dyn FunctionSet>,
}

impl ExprEngine {
    pub fn new(functions: Arc<dyn FunctionSet>) -> Self {
        Self { functions }
    }
}

impl Default for ExprEngine {
    fn default() -> Self {
        Self::new(Arc::new(Builtins))
    }
}

impl fmt::Debug for ExprEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExprEngine").finish_non_exhaustive()
    }
}

impl Evaluator for ExprEngine {
    fn parse(&self, src: &str) -> Result<Program> {
        let (expr, _) = parse(src, self.functions.as_ref())?;
        let mut slots: Vec<(usize, AggSlot)> = Vec::new();
        expr.walk(&mut |e| {
            if let Expr::Aggregate { func, args, slot } = e {
                slots.push((
                    *slot,
                    AggSlot {
                        func: *func,
                        arg: args.first().cloned(),
                    },
                ));
            }
        });
        slots.sort_by_key(|(slot, _)| *slot);
        Ok(Program {
            source: src.to_string(),
            expr,
            slots: slots.into_iter().map(|(_, s)| s).collect(),
            functions: Arc::clone(&self.functions),
        })
    }
}
