//! In-memory datasources.

use std::sync::Arc;

use rowstep_core::context::Context;
use rowstep_core::error::Result;
use rowstep_core::schema::{FrameColumn, FrameDescription, FrameDescriptionSet};
use rowstep_core::types::Row;
use rowstep_expr::{Evaluator, ExprEngine};

use crate::buffer::{Buffer, InMemoryBuffer};
use crate::datasource::{single_source, Datasource, DatasourceProvider, LoadStepDefinition, LoaderGuard};
use crate::frame::FrameDefinition;
use crate::pager::build_frame;

/// Serves frames from a buffer snapshot.
#[derive(Clone)]
pub struct BufferDatasource {
    name: String,
    buffer: InMemoryBuffer,
    description: FrameDescription,
    key: Vec<String>,
    evaluator: Arc<dyn Evaluator>,
}

impl BufferDatasource {
    /// Columns are inferred from the rows; every column is part of the
    /// cursor key unless `with_key` narrows it.
    pub fn new(name: impl Into<String>, buffer: InMemoryBuffer) -> Self {
        let name = name.into();
        let description = FrameDescription::new(name.clone(), infer_columns(buffer.rows()));
        let key = description.columns.iter().map(|c| c.name.clone()).collect();
        Self {
            name,
            buffer,
            description,
            key,
            evaluator: Arc::new(ExprEngine::default()),
        }
    }

    /// Replace the inferred description; the cursor key follows its columns.
    pub fn with_description(mut self, mut description: FrameDescription) -> Self {
        description.source = self.name.clone();
        self.key = description.columns.iter().map(|c| c.name.clone()).collect();
        self.description = description;
        self
    }

    pub fn with_key(mut self, key: Vec<String>) -> Self {
        self.key = key;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }
}

impl Datasource for BufferDatasource {
    fn name(&self) -> &str {
        &self.name
    }

    fn describe(&self) -> FrameDescriptionSet {
        vec![self.description.clone()]
    }

    fn load(&self, ctx: &Context, defs: &[FrameDefinition]) -> Result<LoaderGuard> {
        single_source(defs, &self.name)?;
        tracing::debug!(source = %self.name, frames = defs.len(), "load buffer datasource");

        let ctx = ctx.clone();
        let mut buffer = self.buffer.clone();
        let defs = defs.to_vec();
        let description = self.description.clone();
        let key = self.key.clone();
        let evaluator = Arc::clone(&self.evaluator);

        Ok(LoaderGuard::new(move |limit| {
            buffer.seek(&ctx, 0)?;
            let mut rows = Vec::with_capacity(buffer.len());
            while let Some(r) = buffer.next_row(&ctx)? {
                rows.push(r);
            }
            defs.iter()
                .map(|d| build_frame(&description, d, rows.clone(), &key, evaluator.as_ref(), limit))
                .collect()
        }))
    }
}

/// Union of row keys in first-seen order, typed by the first non-null value.
pub fn infer_columns(rows: &[Row]) -> Vec<FrameColumn> {
    let mut cols: Vec<FrameColumn> = Vec::new();
    for row in rows {
        for (k, v) in row.iter() {
            match cols.iter_mut().find(|c| c.name == *k) {
                Some(c) => {
                    if c.data_type == Default::default() && !v.is_null() {
                        c.data_type = v.data_type();
                    }
                }
                None => cols.push(FrameColumn::new(k.clone(), v.data_type())),
            }
        }
    }
    cols
}

/// Provider serving a fixed row set to every load step naming it.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    rows: Vec<Row>,
    description: Option<FrameDescription>,
}

impl StaticProvider {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            description: None,
        }
    }

    pub fn with_description(mut self, description: FrameDescription) -> Self {
        self.description = Some(description);
        self
    }
}

impl DatasourceProvider for StaticProvider {
    fn datasource(&self, ctx: &Context, def: &LoadStepDefinition) -> Result<Arc<dyn Datasource>> {
        ctx.check()?;
        let mut ds = BufferDatasource::new(def.name.clone(), self.rows.clone().into());
        if let Some(d) = &self.description {
            ds = ds.with_description(d.clone());
        }
        Ok(Arc::new(ds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowstep_core::filter::{Paging, SortExprSet};
    use rowstep_core::row;
    use rowstep_core::schema::DataType;
    use rowstep_core::types::Scalar;

    fn users() -> Vec<Row> {
        vec![
            row! { "id" => 1, "name" => "Ana" },
            row! { "id" => 2, "name" => "John", "age" => 30 },
            row! { "id" => 3, "name" => "Jane" },
        ]
    }

    #[test]
    fn describes_inferred_columns() {
        let ds = BufferDatasource::new("users", users().into());
        let d = ds.describe();
        assert_eq!(d.len(), 1);
        let names: Vec<_> = d[0].columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "age"]);
        assert_eq!(d[0].columns[0].data_type, DataType::Int64);
    }

    #[test]
    fn loads_sorted_pages() {
        let ctx = Context::background();
        let ds = BufferDatasource::new("users", users().into());
        let def = FrameDefinition::new("users")
            .with_sorting(SortExprSet::parse("name").unwrap())
            .with_paging(Paging::with_limit(2));

        let mut guard = ds.load(&ctx, &[def.clone()]).unwrap();
        let frames = guard.frames(0).unwrap();
        assert_eq!(
            frames[0].column_values("name"),
            vec![Scalar::from("Ana"), Scalar::from("Jane")]
        );

        let next = frames[0].paging.next_page.clone().unwrap();
        let def = def.with_paging(Paging::with_limit(2).with_cursor(next.0));
        let frames = ds.load(&ctx, &[def]).unwrap().frames(0).unwrap();
        assert_eq!(frames[0].column_values("name"), vec![Scalar::from("John")]);
        assert!(frames[0].paging.prev_page.is_some());
    }

    #[test]
    fn rejects_foreign_sources() {
        let ctx = Context::background();
        let ds = BufferDatasource::new("users", users().into());
        assert!(ds.load(&ctx, &[FrameDefinition::new("orders")]).is_err());
        assert!(ds.load(&ctx, &[]).is_err());
    }

    #[test]
    fn static_provider_names_datasource_after_step() {
        let ctx = Context::background();
        let p = StaticProvider::new(users());
        let ds = p
            .datasource(&ctx, &LoadStepDefinition::new("people", "static"))
            .unwrap();
        assert_eq!(ds.name(), "people");
        assert_eq!(ds.describe()[0].source, "people");
    }
}
