//! Paging, sorting and row filters shared by datasources and steps.
//!
//! `PagingCursor` captures the sort-key values of the last emitted row so the
//! next (or previous) page can resume from it. Its encoded form is an opaque
//! URL-safe token.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{scalar_cmp, Row, Scalar};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortExpr {
    pub column: String,
    #[serde(default)]
    pub descending: bool,
}

impl SortExpr {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortExprSet(pub Vec<SortExpr>);

impl SortExprSet {
    /// Parse `"a, -b, c DESC"` style sort definitions.
    pub fn parse(s: &str) -> Result<Self> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let mut words = part.split_whitespace();
            let col = words.next().unwrap_or_default();
            let dir = words.next().map(|w| w.to_ascii_lowercase());
            if words.next().is_some() {
                return Err(Error::config(format!("malformed sort expression: {part}")));
            }
            let (col, mut desc) = match col.strip_prefix('-') {
                Some(c) => (c, true),
                None => (col, false),
            };
            match dir.as_deref() {
                None | Some("asc") => {}
                Some("desc") => desc = true,
                Some(other) => {
                    return Err(Error::config(format!("unknown sort direction: {other}")))
                }
            }
            out.push(SortExpr {
                column: col.to_string(),
                descending: desc,
            });
        }
        Ok(Self(out))
    }

    pub fn get(&self, column: &str) -> Option<&SortExpr> {
        self.0.iter().find(|s| s.column == column)
    }

    pub fn push(&mut self, s: SortExpr) {
        self.0.push(s);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SortExpr> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compare two rows by every sort column, honouring each direction.
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        for s in &self.0 {
            let av = a.get(&s.column).unwrap_or(&Scalar::Null);
            let bv = b.get(&s.column).unwrap_or(&Scalar::Null);
            let ord = scalar_cmp(av, bv);
            let ord = if s.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl From<Vec<SortExpr>> for SortExprSet {
    fn from(v: Vec<SortExpr>) -> Self {
        Self(v)
    }
}

impl fmt::Display for SortExprSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, s) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&s.column)?;
            if s.descending {
                f.write_str(" DESC")?;
            }
        }
        Ok(())
    }
}

/// Resumable position: sort-key values of the last seen row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PagingCursor {
    #[serde(rename = "k")]
    keys: Vec<String>,
    #[serde(rename = "v")]
    values: Vec<Scalar>,
    #[serde(rename = "d")]
    desc: Vec<bool>,
    /// Reverse order: the cursor points backwards (previous page).
    #[serde(rename = "r", default)]
    pub r_order: bool,
}

impl PagingCursor {
    /// Set (or replace) the value for key `k`.
    pub fn set(&mut self, k: impl Into<String>, v: impl Into<Scalar>, desc: bool) {
        let k = k.into();
        let v = v.into();
        match self.keys.iter().position(|x| *x == k) {
            Some(i) => {
                self.values[i] = v;
                self.desc[i] = desc;
            }
            None => {
                self.keys.push(k);
                self.values.push(v);
                self.desc.push(desc);
            }
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    pub fn desc(&self) -> &[bool] {
        &self.desc
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Sort definition this cursor was collected for.
    pub fn sorting(&self) -> SortExprSet {
        self.keys
            .iter()
            .zip(self.desc.iter())
            .map(|(k, d)| SortExpr {
                column: k.clone(),
                descending: *d,
            })
            .collect::<Vec<_>>()
            .into()
    }

    /// Position of `row` relative to the cursor in the cursor's sort order.
    ///
    /// `Greater` means the row comes after the cursor.
    pub fn position(&self, row: &Row) -> Ordering {
        for ((k, v), d) in self.keys.iter().zip(&self.values).zip(&self.desc) {
            let rv = row.get(k).unwrap_or(&Scalar::Null);
            let ord = scalar_cmp(rv, v);
            let ord = if *d { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// True when `row` lies past the cursor in the cursor's direction.
    pub fn admits(&self, row: &Row) -> bool {
        let ord = self.position(row);
        if self.r_order {
            ord == Ordering::Less
        } else {
            ord == Ordering::Greater
        }
    }

    /// Opaque token; stable for identical sort configurations and values.
    pub fn encode(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn decode(token: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|e| Error::config(format!("invalid paging cursor: {e}")))?;
        let cur: PagingCursor = serde_json::from_slice(&bytes)
            .map_err(|e| Error::config(format!("invalid paging cursor: {e}")))?;
        if cur.keys.len() != cur.values.len() || cur.keys.len() != cur.desc.len() {
            return Err(Error::config("invalid paging cursor: length mismatch"));
        }
        Ok(cur)
    }
}

impl Serialize for CursorToken {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        let token = self.0.encode().map_err(serde::ser::Error::custom)?;
        s.serialize_str(&token)
    }
}

impl<'de> Deserialize<'de> for CursorToken {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let token = String::deserialize(d)?;
        PagingCursor::decode(&token)
            .map(CursorToken)
            .map_err(serde::de::Error::custom)
    }
}

/// A `PagingCursor` that (de)serializes as its opaque token.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorToken(pub PagingCursor);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paging {
    /// Page size; `0` means unbounded.
    #[serde(default)]
    pub limit: usize,
    #[serde(default, rename = "pageCursor", skip_serializing_if = "Option::is_none")]
    pub cursor: Option<CursorToken>,
    #[serde(default, rename = "nextPage", skip_serializing_if = "Option::is_none")]
    pub next_page: Option<CursorToken>,
    #[serde(default, rename = "prevPage", skip_serializing_if = "Option::is_none")]
    pub prev_page: Option<CursorToken>,
}

impl Paging {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn with_cursor(mut self, cursor: PagingCursor) -> Self {
        self.cursor = Some(CursorToken(cursor));
        self
    }

    pub fn page_cursor(&self) -> Option<&PagingCursor> {
        self.cursor.as_ref().map(|c| &c.0)
    }
}

/// Row-level filter: AND of per-column IN-sets, then a boolean expression.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowFilter {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub constraints: BTreeMap<String, Vec<Scalar>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

impl RowFilter {
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty() && self.expression.as_deref().map_or(true, str::is_empty)
    }

    /// True when every constrained column holds one of its allowed values.
    pub fn satisfies_constraints(&self, row: &Row) -> bool {
        self.constraints.iter().all(|(ident, allowed)| {
            let v = row.get(ident).unwrap_or(&Scalar::Null);
            allowed.iter().any(|a| a.loose_eq(v))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;

    #[test]
    fn cursor_token_roundtrip() {
        let mut pc = PagingCursor::default();
        pc.set("k1", "a", false);
        pc.set("v1", 12.5, true);
        let tok = pc.encode().unwrap();
        assert!(!tok.contains('='));
        assert_eq!(PagingCursor::decode(&tok).unwrap(), pc);
        assert!(PagingCursor::decode("%%%").is_err());
    }

    #[test]
    fn cursor_position_honours_direction() {
        let mut pc = PagingCursor::default();
        pc.set("k1", "b", false);
        pc.set("k2", 5, true);
        assert!(pc.admits(&row! { "k1" => "c", "k2" => 9 }));
        assert!(pc.admits(&row! { "k1" => "b", "k2" => 4 }));
        assert!(!pc.admits(&row! { "k1" => "b", "k2" => 5 }));
        assert!(!pc.admits(&row! { "k1" => "a", "k2" => 1 }));

        pc.r_order = true;
        assert!(pc.admits(&row! { "k1" => "a", "k2" => 1 }));
    }

    #[test]
    fn sort_parse() {
        let ss = SortExprSet::parse("a, -b, c desc").unwrap();
        assert_eq!(
            ss,
            SortExprSet(vec![SortExpr::asc("a"), SortExpr::desc("b"), SortExpr::desc("c")])
        );
        assert!(SortExprSet::parse("a sideways").is_err());
        assert_eq!(ss.to_string(), "a, b DESC, c DESC");
    }

    #[test]
    fn constraints_use_loose_equality() {
        let mut f = RowFilter::default();
        f.constraints.insert("k".into(), vec![Scalar::from(1.0), Scalar::from("x")]);
        assert!(f.satisfies_constraints(&row! { "k" => 1 }));
        assert!(!f.satisfies_constraints(&row! { "k" => 2 }));
        assert!(!f.satisfies_constraints(&row! { "z" => 1 }));
    }
}
