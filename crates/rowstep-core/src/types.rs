//! Loosely-typed row values.
//!
//! Rows flowing between steps are maps of attribute ident to a `Scalar`.
//! A missing key and an explicit `Scalar::Null` are different things: the
//! former means the datasource never produced the field.

use std::cmp::Ordering;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::DataType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),
    Timestamp(DateTime<Utc>),
}

impl Scalar {
    pub fn data_type(&self) -> DataType {
        match self {
            Scalar::Null => DataType::Any,
            Scalar::Bool(_) => DataType::Boolean,
            Scalar::I64(_) => DataType::Int64,
            Scalar::F64(_) => DataType::Float64,
            Scalar::Str(_) => DataType::Utf8,
            Scalar::Timestamp(_) => DataType::Timestamp,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Numeric view of the value; strings are parsed, bools are 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::I64(i) => Some(*i as f64),
            Scalar::F64(f) => Some(*f),
            Scalar::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Scalar::Str(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Timestamp view; RFC 3339 strings are accepted.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Scalar::Timestamp(t) => Some(*t),
            Scalar::Str(s) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            _ => None,
        }
    }

    /// Truthiness used by boolean filters.
    pub fn truthy(&self) -> bool {
        match self {
            Scalar::Null => false,
            Scalar::Bool(b) => *b,
            Scalar::I64(i) => *i != 0,
            Scalar::F64(f) => *f != 0.0 && !f.is_nan(),
            Scalar::Str(s) => !s.is_empty(),
            Scalar::Timestamp(_) => true,
        }
    }

    /// Equality with numeric coercion (`1 == 1.0`) and timestamp parsing.
    pub fn loose_eq(&self, other: &Scalar) -> bool {
        use Scalar::*;
        match (self, other) {
            (I64(_) | F64(_), I64(_) | F64(_)) => scalar_cmp(self, other) == Ordering::Equal,
            (Timestamp(_), Str(_)) | (Str(_), Timestamp(_)) => {
                match (self.as_timestamp(), other.as_timestamp()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::I64(i) => write!(f, "{i}"),
            Scalar::F64(v) => write!(f, "{v}"),
            Scalar::Str(s) => f.write_str(s),
            Scalar::Timestamp(t) => f.write_str(&t.to_rfc3339()),
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::I64(v as i64)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::I64(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::F64(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

impl From<DateTime<Utc>> for Scalar {
    fn from(v: DateTime<Utc>) -> Self {
        Scalar::Timestamp(v)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Scalar::Null)
    }
}

/// A single row: attribute ident -> value. Keys are case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, Scalar>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ident: &str) -> Option<&Scalar> {
        self.0.get(ident)
    }

    /// Value at `ident`, treating a missing key as `Null`.
    pub fn value(&self, ident: &str) -> Scalar {
        self.0.get(ident).cloned().unwrap_or(Scalar::Null)
    }

    pub fn set(&mut self, ident: impl Into<String>, value: impl Into<Scalar>) {
        self.0.insert(ident.into(), value.into());
    }

    pub fn remove(&mut self, ident: &str) -> Option<Scalar> {
        self.0.remove(ident)
    }

    pub fn contains(&self, ident: &str) -> bool {
        self.0.contains_key(ident)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Scalar> {
        self.0.iter()
    }

    /// Copy every field of `other` into this row, overwriting on conflict.
    pub fn merge(&mut self, other: &Row) {
        for (k, v) in other.iter() {
            self.0.insert(k.clone(), v.clone());
        }
    }
}

impl<K: Into<String>, V: Into<Scalar>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Row(iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect())
    }
}

impl IntoIterator for Row {
    type Item = (String, Scalar);
    type IntoIter = btree_map::IntoIter<String, Scalar>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = (&'a String, &'a Scalar);
    type IntoIter = btree_map::Iter<'a, String, Scalar>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Build a `Row` from `ident => value` pairs.
///
/// ```
/// use rowstep_core::row;
/// let r = row! { "k1" => "g1", "v1" => 10 };
/// assert_eq!(r.len(), 2);
/// ```
#[macro_export]
macro_rules! row {
    () => { $crate::types::Row::new() };
    ($($k:expr => $v:expr),+ $(,)?) => {{
        let mut r = $crate::types::Row::new();
        $( r.set($k, $crate::types::Scalar::from($v)); )+
        r
    }};
}

/// Compare two scalars for sorting.
///
/// Nulls are sorted first, numbers compare across `I64`/`F64`, then values
/// of different kinds are ordered by kind. Strings holding an RFC 3339
/// instant sort with timestamps, after every other string.
pub fn scalar_cmp(a: &Scalar, b: &Scalar) -> Ordering {
    use Scalar::*;

    match (a, b) {
        (Null, Null) => Ordering::Equal,
        (Null, _) => Ordering::Less,
        (_, Null) => Ordering::Greater,
        (Bool(x), Bool(y)) => x.cmp(y),
        (I64(x), I64(y)) => x.cmp(y),
        (I64(_) | F64(_), I64(_) | F64(_)) => {
            let x = a.as_f64().unwrap_or(f64::NAN);
            let y = b.as_f64().unwrap_or(f64::NAN);
            if x.is_nan() && y.is_nan() {
                Ordering::Equal
            } else if x.is_nan() {
                Ordering::Greater
            } else if y.is_nan() {
                Ordering::Less
            } else {
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        }
        // Timestamps round-trip through JSON as strings
        (Str(_) | Timestamp(_), Str(_) | Timestamp(_)) => match (sort_instant(a), sort_instant(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => a.as_str().cmp(&b.as_str()),
        },
        // Mixed types: order by kind
        _ => scalar_type_order(a).cmp(&scalar_type_order(b)),
    }
}

fn sort_instant(s: &Scalar) -> Option<DateTime<Utc>> {
    match s {
        Scalar::Timestamp(t) => Some(*t),
        Scalar::Str(x) if x.trim_start().starts_with(|c: char| c.is_ascii_digit()) => s.as_timestamp(),
        _ => None,
    }
}

/// Numeric rank of a scalar kind for mixed-type comparisons and hashing.
pub(crate) fn scalar_type_order(s: &Scalar) -> u8 {
    match s {
        Scalar::Null => 0,
        Scalar::Bool(_) => 1,
        Scalar::I64(_) | Scalar::F64(_) => 2,
        Scalar::Str(_) => 3,
        Scalar::Timestamp(_) => 4,
    }
}
