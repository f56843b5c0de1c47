//! Declarative attribute descriptions.
//!
//! An attribute names an output field (`ident`). It either renames an input
//! column (`source`), computes a value (`expr`), or reads `ident` directly.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub ident: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Attribute {
    pub fn new(ident: impl Into<String>) -> Self {
        Self {
            ident: ident.into(),
            label: String::new(),
            expr: None,
            source: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_expr(mut self, expr: impl Into<String>) -> Self {
        self.expr = Some(expr.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The text evaluated to produce this attribute's value.
    pub fn expression(&self) -> &str {
        self.expr
            .as_deref()
            .or(self.source.as_deref())
            .unwrap_or(&self.ident)
    }

    pub fn label(&self) -> &str {
        if self.label.is_empty() {
            &self.ident
        } else {
            &self.label
        }
    }
}

/// Ordered attribute collection. Lookup by ident ignores case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeSet(Vec<Attribute>);

impl AttributeSet {
    pub fn new(attrs: Vec<Attribute>) -> Self {
        Self(attrs)
    }

    pub fn find(&self, ident: &str) -> Option<&Attribute> {
        self.0.iter().find(|a| a.ident.eq_ignore_ascii_case(ident))
    }

    pub fn contains(&self, ident: &str) -> bool {
        self.find(ident).is_some()
    }

    pub fn idents(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|a| a.ident.as_str())
    }

    pub fn push(&mut self, attr: Attribute) {
        self.0.push(attr);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Attribute> for AttributeSet {
    fn from_iter<I: IntoIterator<Item = Attribute>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<Attribute>> for AttributeSet {
    fn from(v: Vec<Attribute>) -> Self {
        Self(v)
    }
}

impl<'a> IntoIterator for &'a AttributeSet {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
