//! Frame and column descriptions. Pure data.
//!
//! `Describe` on a datasource returns a `FrameDescriptionSet`; frames loaded
//! from the datasource carry the same columns.

use serde::{Deserialize, Serialize};

use crate::attribute::{Attribute, AttributeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DataType {
    #[default]
    Any,
    Boolean,
    Int64,
    Float64,
    Utf8,
    Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameColumn {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, rename = "type")]
    pub data_type: DataType,
}

impl FrameColumn {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            data_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDescription {
    pub source: String,
    #[serde(default, rename = "ref", skip_serializing_if = "String::is_empty")]
    pub reference: String,
    pub columns: Vec<FrameColumn>,
}

impl FrameDescription {
    pub fn new(source: impl Into<String>, columns: Vec<FrameColumn>) -> Self {
        Self {
            source: source.into(),
            reference: String::new(),
            columns,
        }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Column idents as plain attributes, for steps consuming this frame.
    pub fn attributes(&self) -> AttributeSet {
        self.columns
            .iter()
            .map(|c| Attribute::new(c.name.clone()).with_label(c.label.clone()))
            .collect()
    }
}

pub type FrameDescriptionSet = Vec<FrameDescription>;
