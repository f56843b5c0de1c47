//! Aggregate functions and their running accumulators.

use std::cmp::Ordering;

use rowstep_core::types::{scalar_cmp, Scalar};

use crate::error::{ExprError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggFunc {
    Sum,
    Count,
    Avg,
    Min,
    Max,
}

impl AggFunc {
    pub fn lookup(name: &str) -> Option<AggFunc> {
        match name.to_ascii_lowercase().as_str() {
            "sum" => Some(AggFunc::Sum),
            "count" => Some(AggFunc::Count),
            "avg" => Some(AggFunc::Avg),
            "min" => Some(AggFunc::Min),
            "max" => Some(AggFunc::Max),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggFunc::Sum => "sum",
            AggFunc::Count => "count",
            AggFunc::Avg => "avg",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
        }
    }

    pub(crate) fn check_arity(&self, got: usize) -> Result<()> {
        let ok = match self {
            AggFunc::Count => got <= 1,
            _ => got == 1,
        };
        if ok {
            Ok(())
        } else {
            Err(ExprError::Arity {
                name: self.name().to_string(),
                expected: if *self == AggFunc::Count { "0..=1" } else { "1" }.to_string(),
                got,
            })
        }
    }
}

/// Running state of one aggregate call.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Sum(f64),
    Count(u64),
    Avg { total: f64, count: u64 },
    Min(Option<Scalar>),
    Max(Option<Scalar>),
}

impl Accumulator {
    pub fn new(func: AggFunc) -> Self {
        match func {
            AggFunc::Sum => Accumulator::Sum(0.0),
            AggFunc::Count => Accumulator::Count(0),
            AggFunc::Avg => Accumulator::Avg { total: 0.0, count: 0 },
            AggFunc::Min => Accumulator::Min(None),
            AggFunc::Max => Accumulator::Max(None),
        }
    }

    /// Fold one input. `None` means the call had no argument (`count()`).
    pub fn update(&mut self, value: Option<&Scalar>) -> Result<()> {
        let value = match value {
            None => {
                if let Accumulator::Count(n) = self {
                    *n += 1;
                }
                return Ok(());
            }
            Some(v) if v.is_null() => return Ok(()),
            Some(v) => v,
        };

        match self {
            Accumulator::Count(n) => *n += 1,
            Accumulator::Sum(total) => *total += numeric("sum", value)?,
            Accumulator::Avg { total, count } => {
                *total += numeric("avg", value)?;
                *count += 1;
            }
            Accumulator::Min(cur) => keep(cur, value, Ordering::Less),
            Accumulator::Max(cur) => keep(cur, value, Ordering::Greater),
        }
        Ok(())
    }

    /// Result of the aggregate; numbers are always `F64`.
    pub fn finalize(&self) -> Scalar {
        match self {
            Accumulator::Sum(total) => Scalar::F64(*total),
            Accumulator::Count(n) => Scalar::F64(*n as f64),
            Accumulator::Avg { count: 0, .. } => Scalar::Null,
            Accumulator::Avg { total, count } => Scalar::F64(*total / *count as f64),
            Accumulator::Min(v) | Accumulator::Max(v) => match v {
                None => Scalar::Null,
                Some(Scalar::I64(i)) => Scalar::F64(*i as f64),
                Some(other) => other.clone(),
            },
        }
    }
}

fn numeric(func: &str, v: &Scalar) -> Result<f64> {
    match v {
        Scalar::I64(_) | Scalar::F64(_) | Scalar::Str(_) => v.as_f64(),
        _ => None,
    }
    .ok_or_else(|| ExprError::eval(format!("{func}: non-numeric value {v}")))
}

fn keep(cur: &mut Option<Scalar>, v: &Scalar, want: Ordering) {
    let replace = match cur {
        None => true,
        Some(c) => scalar_cmp(v, c) == want,
    };
    if replace {
        *cur = Some(v.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(func: AggFunc, vals: &[Scalar]) -> Scalar {
        let mut acc = Accumulator::new(func);
        for v in vals {
            acc.update(Some(v)).unwrap();
        }
        acc.finalize()
    }

    #[test]
    fn numeric_aggregates_are_floats() {
        let vals = [Scalar::I64(10), Scalar::Null, Scalar::I64(2)];
        assert_eq!(run(AggFunc::Sum, &vals), Scalar::F64(12.0));
        assert_eq!(run(AggFunc::Count, &vals), Scalar::F64(2.0));
        assert_eq!(run(AggFunc::Avg, &vals), Scalar::F64(6.0));
        assert_eq!(run(AggFunc::Min, &vals), Scalar::F64(2.0));
        assert_eq!(run(AggFunc::Max, &vals), Scalar::F64(10.0));
    }

    #[test]
    fn empty_inputs() {
        assert_eq!(run(AggFunc::Sum, &[]), Scalar::F64(0.0));
        assert_eq!(run(AggFunc::Count, &[]), Scalar::F64(0.0));
        assert_eq!(run(AggFunc::Avg, &[]), Scalar::Null);
        assert_eq!(run(AggFunc::Max, &[Scalar::Null]), Scalar::Null);
    }

    #[test]
    fn count_rows_without_argument() {
        let mut acc = Accumulator::new(AggFunc::Count);
        acc.update(None).unwrap();
        acc.update(None).unwrap();
        assert_eq!(acc.finalize(), Scalar::F64(2.0));
    }

    #[test]
    fn string_extremes_keep_strings() {
        let vals = [Scalar::from("b"), Scalar::from("a"), Scalar::from("c")];
        assert_eq!(run(AggFunc::Min, &vals), Scalar::from("a"));
        assert_eq!(run(AggFunc::Max, &vals), Scalar::from("c"));
    }

    #[test]
    fn sum_rejects_non_numeric() {
        let mut acc = Accumulator::new(AggFunc::Sum);
        assert!(acc.update(Some(&Scalar::from("abc"))).is_err());
        assert!(acc.update(Some(&Scalar::Bool(true))).is_err());
    }

    #[test]
    fn arity() {
        assert!(AggFunc::Count.check_arity(0).is_ok());
        assert!(AggFunc::Sum.check_arity(0).is_err());
        assert!(AggFunc::Max.check_arity(2).is_err());
    }
}
