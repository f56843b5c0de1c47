use serde::{Deserialize, Serialize};

use rowstep_core::attribute::{Attribute, AttributeSet};
use rowstep_core::error::{Error, Result};
use rowstep_core::filter::{PagingCursor, RowFilter, SortExprSet};
use rowstep_core::schema::{FrameColumn, FrameDescription};
use rowstep_core::types::{Row, Scalar};
use rowstep_expr::{Evaluator, Program};
use rowstep_io::pager::{collect_cursor, cursor_order};

/// Post-aggregation filter: constraints, then the boolean expression, then
/// the ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InternalFilter {
    #[serde(flatten)]
    pub rows: RowFilter,
    #[serde(default, rename = "orderBy", skip_serializing_if = "SortExprSet::is_empty")]
    pub order_by: SortExprSet,
}

impl InternalFilter {
    pub fn with_constraint(mut self, ident: impl Into<String>, allowed: Vec<Scalar>) -> Self {
        self.rows.constraints.insert(ident.into(), allowed);
        self
    }

    pub fn with_expression(mut self, expr: impl Into<String>) -> Self {
        self.rows.expression = Some(expr.into());
        self
    }

    pub fn with_order_by(mut self, order_by: SortExprSet) -> Self {
        self.order_by = order_by;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub ident: String,
    #[serde(default, rename = "sourceAttributes")]
    pub source_attributes: AttributeSet,
    pub group: AttributeSet,
    #[serde(rename = "outAttributes")]
    pub out_attributes: AttributeSet,
    #[serde(default)]
    pub filter: InternalFilter,
}

/// A group attribute ready to evaluate.
#[derive(Debug, Clone)]
pub(crate) struct GroupColumn {
    pub ident: String,
    /// Input column name when the attribute renames one.
    pub source: Option<String>,
    pub program: Program,
}

#[derive(Debug, Clone)]
pub(crate) struct OutColumn {
    pub ident: String,
    pub program: Program,
}

/// Every expression of a validated definition, parsed once.
#[derive(Debug, Clone)]
pub(crate) struct Compiled {
    pub group: Vec<GroupColumn>,
    pub out: Vec<OutColumn>,
    pub filter: Option<Program>,
}

impl Aggregate {
    pub fn new(ident: impl Into<String>) -> Self {
        Self {
            ident: ident.into(),
            ..Default::default()
        }
    }

    pub fn with_source_attributes(mut self, attrs: impl Into<AttributeSet>) -> Self {
        self.source_attributes = attrs.into();
        self
    }

    pub fn with_group(mut self, attrs: impl Into<AttributeSet>) -> Self {
        self.group = attrs.into();
        self
    }

    pub fn with_out_attributes(mut self, attrs: impl Into<AttributeSet>) -> Self {
        self.out_attributes = attrs.into();
        self
    }

    pub fn with_filter(mut self, filter: InternalFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Take source attributes from `input` unless they were declared.
    pub fn bind(&self, input: &FrameDescription) -> Aggregate {
        let mut def = self.clone();
        if def.source_attributes.is_empty() {
            def.source_attributes = input.attributes();
        }
        def
    }

    /// Validate the definition without reading any rows.
    pub fn dryrun(&self, evaluator: &dyn Evaluator) -> Result<()> {
        self.compile(evaluator).map(|_| ())
    }

    pub(crate) fn compile(&self, evaluator: &dyn Evaluator) -> Result<Compiled> {
        self.compile_inner(evaluator)
            .map_err(|e| e.context(&format!("aggregate {}", self.ident)))
    }

    fn compile_inner(&self, evaluator: &dyn Evaluator) -> Result<Compiled> {
        if self.group.is_empty() {
            return Err(Error::config("no group attributes specified"));
        }
        if self.out_attributes.is_empty() {
            return Err(Error::config("no output attributes specified"));
        }

        let resolve_source = |program: &Program| -> Result<()> {
            for ident in program.idents() {
                if !self.source_attributes.contains(&ident) {
                    return Err(Error::config(format!("unresolved identifier: {ident}")));
                }
            }
            Ok(())
        };

        let mut group = Vec::with_capacity(self.group.len());
        for attr in &self.group {
            let program = evaluator.parse(attr.expression())?;
            resolve_source(&program)?;
            if program.is_aggregate() {
                return Err(Error::config(format!(
                    "group attribute {} must not use an aggregate function",
                    attr.ident
                )));
            }
            group.push(GroupColumn {
                ident: attr.ident.clone(),
                source: renamed_source(attr),
                program,
            });
        }

        let mut out = Vec::with_capacity(self.out_attributes.len());
        for attr in &self.out_attributes {
            let program = evaluator.parse(attr.expression())?;
            resolve_source(&program)?;
            if !program.is_aggregate() {
                return Err(Error::config(format!(
                    "output attribute {} must use an aggregate function",
                    attr.ident
                )));
            }
            if let Some(free) = program.free_idents().first() {
                return Err(Error::config(format!(
                    "output attribute {}: {free} is used outside of an aggregate function",
                    attr.ident
                )));
            }
            out.push(OutColumn {
                ident: attr.ident.clone(),
                program,
            });
        }

        let resolvable = |ident: &str| {
            self.source_attributes.contains(ident)
                || self.group.contains(ident)
                || self.out_attributes.contains(ident)
                || group
                    .iter()
                    .any(|g| g.source.as_deref().is_some_and(|s| s.eq_ignore_ascii_case(ident)))
        };

        for s in self.filter.order_by.iter() {
            if !resolvable(&s.column) {
                return Err(Error::config(format!("unresolved sort column: {}", s.column)));
            }
        }
        for ident in self.filter.rows.constraints.keys() {
            if !resolvable(ident) {
                return Err(Error::config(format!(
                    "unresolved constraint attribute: {ident}"
                )));
            }
        }

        let filter = match self.filter.rows.expression.as_deref().map(str::trim) {
            Some(src) if !src.is_empty() => {
                let program = evaluator.parse(src)?;
                if program.is_aggregate() {
                    return Err(Error::config(
                        "filter expression must not use an aggregate function",
                    ));
                }
                if let Some(ident) = program.idents().into_iter().find(|i| !resolvable(i)) {
                    return Err(Error::config(format!("unresolved identifier: {ident}")));
                }
                Some(program)
            }
            _ => None,
        };

        Ok(Compiled { group, out, filter })
    }

    /// Idents of the group attributes, in declaration order.
    pub fn group_idents(&self) -> Vec<String> {
        self.group.idents().map(str::to_string).collect()
    }

    /// Ordering cursors are collected for: `orderBy` followed by the group
    /// idents it does not cover, so one cursor names exactly one group.
    pub fn cursor_order(&self) -> SortExprSet {
        cursor_order(&self.filter.order_by, &self.group_idents())
    }

    /// Cursor pointing past `row` in emission order.
    pub fn forward_cursor(&self, row: &Row) -> Result<PagingCursor> {
        self.cursor(row, false)
    }

    /// Cursor pointing before `row`, for loading the previous page.
    pub fn back_cursor(&self, row: &Row) -> Result<PagingCursor> {
        self.cursor(row, true)
    }

    fn cursor(&self, row: &Row, reverse: bool) -> Result<PagingCursor> {
        let order = self.cursor_order();
        if let Some(missing) = order.iter().find(|s| !row.contains(&s.column)) {
            return Err(Error::config(format!(
                "cursor column {} missing from row",
                missing.column
            )));
        }
        Ok(collect_cursor(row, &order, reverse))
    }

    /// Columns of the aggregated frame: group idents, then output idents.
    pub fn describe(&self) -> FrameDescription {
        let columns = self
            .group
            .iter()
            .chain(self.out_attributes.iter())
            .map(|a| {
                let mut c = FrameColumn::new(a.ident.clone(), Default::default());
                c.label = a.label().to_string();
                c
            })
            .collect();
        FrameDescription::new(self.ident.clone(), columns)
    }
}

fn renamed_source(attr: &Attribute) -> Option<String> {
    match (&attr.expr, &attr.source) {
        (None, Some(src)) if *src != attr.ident => Some(src.clone()),
        _ => None,
    }
}
