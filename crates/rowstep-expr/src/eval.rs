//! Tree-walking evaluation.

use std::cmp::Ordering;

use rowstep_core::types::{scalar_cmp, Row, Scalar};

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::{ExprError, Result};
use crate::functions::{timestamp_of, FunctionSet};

/// Evaluate `expr` against `row`. `aggs` carries finalized aggregate values
/// by slot; it is `None` for plain row expressions.
pub(crate) fn eval_expr(
    expr: &Expr,
    row: &Row,
    functions: &dyn FunctionSet,
    aggs: Option<&[Scalar]>,
) -> Result<Scalar> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Ident(name) => Ok(row.value(name)),
        Expr::Unary { op, expr } => unary_op(*op, &eval_expr(expr, row, functions, aggs)?),
        Expr::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => {
            if !eval_expr(left, row, functions, aggs)?.truthy() {
                return Ok(Scalar::Bool(false));
            }
            Ok(Scalar::Bool(eval_expr(right, row, functions, aggs)?.truthy()))
        }
        Expr::Binary {
            op: BinaryOp::Or,
            left,
            right,
        } => {
            if eval_expr(left, row, functions, aggs)?.truthy() {
                return Ok(Scalar::Bool(true));
            }
            Ok(Scalar::Bool(eval_expr(right, row, functions, aggs)?.truthy()))
        }
        Expr::Binary { op, left, right } => {
            let l = eval_expr(left, row, functions, aggs)?;
            let r = eval_expr(right, row, functions, aggs)?;
            binary_op(*op, &l, &r)
        }
        Expr::Call { name, args } => {
            let vals = args
                .iter()
                .map(|a| eval_expr(a, row, functions, aggs))
                .collect::<Result<Vec<_>>>()?;
            functions.call(name, &vals)
        }
        Expr::Aggregate { func, slot, .. } => aggs
            .and_then(|a| a.get(*slot))
            .cloned()
            .ok_or_else(|| {
                ExprError::eval(format!("{} used outside of an aggregation", func.name()))
            }),
    }
}

pub fn unary_op(op: UnaryOp, v: &Scalar) -> Result<Scalar> {
    match (op, v) {
        (_, Scalar::Null) => Ok(Scalar::Null),
        (UnaryOp::Not, v) => Ok(Scalar::Bool(!v.truthy())),
        (UnaryOp::Neg, Scalar::I64(i)) => i
            .checked_neg()
            .map(Scalar::I64)
            .ok_or_else(|| ExprError::eval("integer overflow")),
        (UnaryOp::Neg, Scalar::F64(f)) => Ok(Scalar::F64(-f)),
        (UnaryOp::Neg, other) => Err(ExprError::eval(format!("cannot negate {other}"))),
    }
}

/// Apply a non-short-circuit binary operator.
pub fn binary_op(op: BinaryOp, l: &Scalar, r: &Scalar) -> Result<Scalar> {
    match op {
        BinaryOp::Eq => Ok(Scalar::Bool(l.loose_eq(r))),
        BinaryOp::NotEq => Ok(Scalar::Bool(!l.loose_eq(r))),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            if l.is_null() || r.is_null() {
                return Ok(Scalar::Null);
            }
            let ord = compare(l, r)?;
            Ok(Scalar::Bool(match op {
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::LtEq => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }))
        }
        BinaryOp::And => Ok(Scalar::Bool(l.truthy() && r.truthy())),
        BinaryOp::Or => Ok(Scalar::Bool(l.truthy() || r.truthy())),
        _ if l.is_null() || r.is_null() => Ok(Scalar::Null),
        BinaryOp::Add if matches!(l, Scalar::Str(_)) || matches!(r, Scalar::Str(_)) => {
            Ok(Scalar::Str(format!("{l}{r}")))
        }
        BinaryOp::Div => {
            let (x, y) = (number(l)?, number(r)?);
            if y == 0.0 {
                return Err(ExprError::eval("division by zero"));
            }
            Ok(Scalar::F64(x / y))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Rem => arith(op, l, r),
    }
}

fn arith(op: BinaryOp, l: &Scalar, r: &Scalar) -> Result<Scalar> {
    if let (Scalar::I64(x), Scalar::I64(y)) = (l, r) {
        let v = match op {
            BinaryOp::Add => x.checked_add(*y),
            BinaryOp::Sub => x.checked_sub(*y),
            BinaryOp::Mul => x.checked_mul(*y),
            _ => {
                if *y == 0 {
                    return Err(ExprError::eval("division by zero"));
                }
                x.checked_rem(*y)
            }
        };
        if let Some(v) = v {
            return Ok(Scalar::I64(v));
        }
    }
    let (x, y) = (number(l)?, number(r)?);
    Ok(Scalar::F64(match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        _ => {
            if y == 0.0 {
                return Err(ExprError::eval("division by zero"));
            }
            x % y
        }
    }))
}

fn number(v: &Scalar) -> Result<f64> {
    match v {
        Scalar::I64(_) | Scalar::F64(_) | Scalar::Str(_) => v.as_f64(),
        _ => None,
    }
    .ok_or_else(|| ExprError::eval(format!("not a number: {v}")))
}

fn compare(l: &Scalar, r: &Scalar) -> Result<Ordering> {
    use Scalar::*;
    let comparable = match (l, r) {
        (I64(_) | F64(_), I64(_) | F64(_)) | (Str(_), Str(_)) | (Bool(_), Bool(_)) => true,
        (Timestamp(_), Timestamp(_)) => true,
        (Timestamp(_), Str(_)) | (Str(_), Timestamp(_)) => {
            return match (timestamp_of(l), timestamp_of(r)) {
                (Some(a), Some(b)) => Ok(a.cmp(&b)),
                _ => Err(incomparable(l, r)),
            };
        }
        (I64(_) | F64(_), Str(_)) | (Str(_), I64(_) | F64(_)) => {
            return match (l.as_f64(), r.as_f64()) {
                (Some(a), Some(b)) => Ok(a.partial_cmp(&b).unwrap_or(Ordering::Equal)),
                _ => Err(incomparable(l, r)),
            };
        }
        _ => false,
    };
    if comparable {
        Ok(scalar_cmp(l, r))
    } else {
        Err(incomparable(l, r))
    }
}

fn incomparable(l: &Scalar, r: &Scalar) -> ExprError {
    ExprError::eval(format!(
        "cannot compare {:?} with {:?}",
        l.data_type(),
        r.data_type()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn division_is_float() {
        assert_eq!(
            binary_op(BinaryOp::Div, &Scalar::I64(2021), &Scalar::I64(10)).unwrap(),
            Scalar::F64(202.1)
        );
        assert!(binary_op(BinaryOp::Div, &Scalar::I64(1), &Scalar::I64(0)).is_err());
    }

    #[test]
    fn integer_arithmetic_stays_integral() {
        assert_eq!(
            binary_op(BinaryOp::Mul, &Scalar::I64(6), &Scalar::I64(7)).unwrap(),
            Scalar::I64(42)
        );
        assert_eq!(
            binary_op(BinaryOp::Add, &Scalar::I64(1), &Scalar::F64(0.5)).unwrap(),
            Scalar::F64(1.5)
        );
        // overflow falls back to floats
        assert!(matches!(
            binary_op(BinaryOp::Add, &Scalar::I64(i64::MAX), &Scalar::I64(1)).unwrap(),
            Scalar::F64(_)
        ));
    }

    #[test]
    fn plus_concatenates_strings() {
        assert_eq!(
            binary_op(BinaryOp::Add, &Scalar::from("g"), &Scalar::I64(1)).unwrap(),
            Scalar::from("g1")
        );
    }

    #[test]
    fn nulls_propagate() {
        assert_eq!(
            binary_op(BinaryOp::Sub, &Scalar::Null, &Scalar::I64(1)).unwrap(),
            Scalar::Null
        );
        assert_eq!(
            binary_op(BinaryOp::Gt, &Scalar::Null, &Scalar::I64(1)).unwrap(),
            Scalar::Null
        );
        assert_eq!(
            binary_op(BinaryOp::Eq, &Scalar::Null, &Scalar::Null).unwrap(),
            Scalar::Bool(true)
        );
    }

    #[test]
    fn comparisons() {
        let t = |op, l: Scalar, r: Scalar| binary_op(op, &l, &r).unwrap();
        assert_eq!(t(BinaryOp::Lt, 1.into(), 1.5.into()), Scalar::Bool(true));
        assert_eq!(t(BinaryOp::GtEq, "b".into(), "a".into()), Scalar::Bool(true));
        assert_eq!(t(BinaryOp::Eq, 1.into(), 1.0.into()), Scalar::Bool(true));
        assert_eq!(t(BinaryOp::Gt, "10".into(), 9.into()), Scalar::Bool(true));
        assert!(binary_op(BinaryOp::Lt, &Scalar::Bool(true), &Scalar::I64(1)).is_err());
    }
}
