//! Scalar function registry.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};
use rowstep_core::types::Scalar;

use crate::ast::BinaryOp;
use crate::error::{ExprError, Result};
use crate::eval::binary_op;

/// Scalar functions callable from expressions.
///
/// Names are matched lower-case. `arity` returns `(min, max)` where `None`
/// means variadic; the parser uses it to reject unknown functions and bad
/// argument counts before anything runs.
pub trait FunctionSet: Send + Sync {
    fn arity(&self, name: &str) -> Option<(usize, Option<usize>)>;

    fn call(&self, name: &str, args: &[Scalar]) -> Result<Scalar>;
}

/// The built-in math, string, coercion and date functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Builtins;

impl FunctionSet for Builtins {
    fn arity(&self, name: &str) -> Option<(usize, Option<usize>)> {
        let a = match name {
            "add" | "sub" | "mul" | "div" => (2, Some(2)),
            "concat" | "coalesce" => (1, None),
            "string" | "int" | "float" | "lower" | "upper" | "trim" | "length" => (1, Some(1)),
            "year" | "month" | "day" | "hour" | "minute" | "date" => (1, Some(1)),
            "now" => (0, Some(0)),
            "if" => (3, Some(3)),
            _ => return None,
        };
        Some(a)
    }

    fn call(&self, name: &str, args: &[Scalar]) -> Result<Scalar> {
        match name {
            "add" => binary_op(BinaryOp::Add, &args[0], &args[1]),
            "sub" => binary_op(BinaryOp::Sub, &args[0], &args[1]),
            "mul" => binary_op(BinaryOp::Mul, &args[0], &args[1]),
            "div" => binary_op(BinaryOp::Div, &args[0], &args[1]),
            "concat" => Ok(Scalar::Str(
                args.iter()
                    .filter(|a| !a.is_null())
                    .map(|a| a.to_string())
                    .collect(),
            )),
            "coalesce" => Ok(args
                .iter()
                .find(|a| !a.is_null())
                .cloned()
                .unwrap_or(Scalar::Null)),
            "string" => null_or(&args[0], |v| Ok(Scalar::Str(v.to_string()))),
            "int" => null_or(&args[0], to_int),
            "float" => null_or(&args[0], |v| {
                v.as_f64()
                    .map(Scalar::F64)
                    .ok_or_else(|| ExprError::eval(format!("float: cannot convert {v}")))
            }),
            "lower" => null_or(&args[0], |v| Ok(Scalar::Str(v.to_string().to_lowercase()))),
            "upper" => null_or(&args[0], |v| Ok(Scalar::Str(v.to_string().to_uppercase()))),
            "trim" => null_or(&args[0], |v| Ok(Scalar::Str(v.to_string().trim().to_string()))),
            "length" => null_or(&args[0], |v| {
                Ok(Scalar::I64(v.to_string().chars().count() as i64))
            }),
            "year" => date_part(name, &args[0], |t| t.year() as i64),
            "month" => date_part(name, &args[0], |t| t.month() as i64),
            "day" => date_part(name, &args[0], |t| t.day() as i64),
            "hour" => date_part(name, &args[0], |t| t.hour() as i64),
            "minute" => date_part(name, &args[0], |t| t.minute() as i64),
            "date" => null_or(&args[0], |v| {
                timestamp_of(v)
                    .map(Scalar::Timestamp)
                    .ok_or_else(|| ExprError::eval(format!("date: cannot parse {v}")))
            }),
            "now" => Ok(Scalar::Timestamp(Utc::now())),
            "if" => Ok(if args[0].truthy() {
                args[1].clone()
            } else {
                args[2].clone()
            }),
            other => Err(ExprError::UnknownFunction(other.to_string())),
        }
    }
}

fn null_or(v: &Scalar, f: impl FnOnce(&Scalar) -> Result<Scalar>) -> Result<Scalar> {
    if v.is_null() {
        Ok(Scalar::Null)
    } else {
        f(v)
    }
}

fn to_int(v: &Scalar) -> Result<Scalar> {
    match v {
        Scalar::I64(i) => Ok(Scalar::I64(*i)),
        Scalar::F64(f) if f.is_finite() => Ok(Scalar::I64(f.trunc() as i64)),
        Scalar::Bool(b) => Ok(Scalar::I64(i64::from(*b))),
        Scalar::Str(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
                .map(Scalar::I64)
                .ok_or_else(|| ExprError::eval(format!("int: cannot convert {s:?}")))
        }
        other => Err(ExprError::eval(format!("int: cannot convert {other}"))),
    }
}

/// Timestamp view of a value: RFC 3339 strings and plain `YYYY-MM-DD` dates.
pub(crate) fn timestamp_of(v: &Scalar) -> Option<DateTime<Utc>> {
    if let Some(t) = v.as_timestamp() {
        return Some(t);
    }
    let s = v.as_str()?.trim();
    let d = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0)?))
}

fn date_part(name: &str, v: &Scalar, f: impl FnOnce(DateTime<Utc>) -> i64) -> Result<Scalar> {
    null_or(v, |v| {
        timestamp_of(v)
            .map(|t| Scalar::I64(f(t)))
            .ok_or_else(|| ExprError::eval(format!("{name}: not a date: {v}")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Scalar]) -> Scalar {
        Builtins.call(name, args).unwrap()
    }

    #[test]
    fn string_functions() {
        assert_eq!(
            call("concat", &["a".into(), Scalar::Null, 1.into()]),
            Scalar::from("a1")
        );
        assert_eq!(call("upper", &[" ab ".into()]), Scalar::from(" AB "));
        assert_eq!(call("trim", &[" ab ".into()]), Scalar::from("ab"));
        assert_eq!(call("length", &["héllo".into()]), Scalar::I64(5));
        assert_eq!(call("string", &[12.into()]), Scalar::from("12"));
        assert_eq!(call("lower", &[Scalar::Null]), Scalar::Null);
    }

    #[test]
    fn coercions() {
        assert_eq!(call("int", &["42".into()]), Scalar::I64(42));
        assert_eq!(call("int", &[3.9.into()]), Scalar::I64(3));
        assert_eq!(call("float", &["2.5".into()]), Scalar::F64(2.5));
        assert!(Builtins.call("int", &["x".into()]).is_err());
        assert_eq!(call("coalesce", &[Scalar::Null, 7.into()]), Scalar::I64(7));
    }

    #[test]
    fn date_parts() {
        let dob = Scalar::from("2021-03-04T05:06:07Z");
        assert_eq!(call("year", &[dob.clone()]), Scalar::I64(2021));
        assert_eq!(call("month", &[dob.clone()]), Scalar::I64(3));
        assert_eq!(call("day", &[dob.clone()]), Scalar::I64(4));
        assert_eq!(call("hour", &[dob.clone()]), Scalar::I64(5));
        assert_eq!(call("minute", &[dob]), Scalar::I64(6));
        assert_eq!(call("year", &["1999-12-31".into()]), Scalar::I64(1999));
        assert_eq!(call("month", &[Scalar::Null]), Scalar::Null);
        assert!(Builtins.call("year", &["soon".into()]).is_err());
    }

    #[test]
    fn conditional() {
        assert_eq!(
            call("if", &[true.into(), "y".into(), "n".into()]),
            Scalar::from("y")
        );
        assert_eq!(
            call("if", &[Scalar::Null, "y".into(), "n".into()]),
            Scalar::from("n")
        );
    }

    #[test]
    fn arity_table() {
        assert_eq!(Builtins.arity("if"), Some((3, Some(3))));
        assert_eq!(Builtins.arity("concat"), Some((1, None)));
        assert_eq!(Builtins.arity("sum"), None);
    }
}
