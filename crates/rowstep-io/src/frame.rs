//! Frame requests and results.

use serde::{Deserialize, Serialize};

use rowstep_core::filter::{Paging, RowFilter, SortExprSet};
use rowstep_core::schema::FrameColumn;
use rowstep_core::types::Row;

/// A request for one page of rows from a datasource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameDefinition {
    #[serde(default)]
    pub name: String,
    pub source: String,
    #[serde(default, rename = "ref", skip_serializing_if = "String::is_empty")]
    pub reference: String,
    /// Projection; empty selects every described column.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<FrameColumn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paging: Option<Paging>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sorting: Option<SortExprSet>,
    #[serde(default, skip_serializing_if = "RowFilter::is_empty")]
    pub filter: RowFilter,
}

impl FrameDefinition {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_paging(mut self, paging: Paging) -> Self {
        self.paging = Some(paging);
        self
    }

    pub fn with_sorting(mut self, sorting: SortExprSet) -> Self {
        self.sorting = Some(sorting);
        self
    }

    pub fn with_filter(mut self, filter: RowFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_columns(mut self, columns: Vec<FrameColumn>) -> Self {
        self.columns = columns;
        self
    }

    /// Requested page size; `0` when unbounded or unset.
    pub fn limit(&self) -> usize {
        self.paging.as_ref().map_or(0, |p| p.limit)
    }
}

/// A materialized page of rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub name: String,
    pub source: String,
    #[serde(default, rename = "ref", skip_serializing_if = "String::is_empty")]
    pub reference: String,
    pub columns: Vec<FrameColumn>,
    pub rows: Vec<Row>,
    /// Paging the frame was produced with, including next/prev cursors.
    #[serde(default)]
    pub paging: Paging,
    #[serde(default, skip_serializing_if = "SortExprSet::is_empty")]
    pub sorting: SortExprSet,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column in row order; missing cells are `Null`.
    pub fn column_values(&self, column: &str) -> Vec<rowstep_core::types::Scalar> {
        self.rows.iter().map(|r| r.value(column)).collect()
    }
}
