//! Left hash join.
//!
//! Foreign rows are indexed by `foreign_column`. Each local row is emitted
//! once per matching foreign row, or once unchanged when nothing matches.
//! Foreign columns appear as `<foreign_source>.<column>`; null keys never
//! match.

use std::collections::HashMap;
use std::sync::Arc;

use rowstep_core::context::Context;
use rowstep_core::error::{Error, Result};
use rowstep_core::hash::{hash_key, Hash256};
use rowstep_core::schema::{FrameColumn, FrameDescription, FrameDescriptionSet};
use rowstep_core::types::Row;
use rowstep_expr::Evaluator;
use rowstep_io::datasource::single_source;
use rowstep_io::pager::build_frame;
use rowstep_io::{drain, Datasource, FrameDefinition, InMemoryBuffer, LoaderGuard};

use crate::traits::Operator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashJoin {
    pub local_column: String,
    pub foreign_source: String,
    pub foreign_column: String,
}

impl HashJoin {
    pub fn new(
        local_column: impl Into<String>,
        foreign_source: impl Into<String>,
        foreign_column: impl Into<String>,
    ) -> Self {
        Self {
            local_column: local_column.into(),
            foreign_source: foreign_source.into(),
            foreign_column: foreign_column.into(),
        }
    }

    fn prefixed(&self, column: &str) -> String {
        format!("{}.{}", self.foreign_source, column)
    }

    pub fn join_rows(&self, local: &[Row], foreign: &[Row]) -> Vec<Row> {
        let mut index: HashMap<Hash256, Vec<usize>> = HashMap::new();
        for (i, r) in foreign.iter().enumerate() {
            let k = r.value(&self.foreign_column);
            if k.is_null() {
                continue;
            }
            index.entry(hash_key(&[k])).or_default().push(i);
        }

        let mut out = Vec::with_capacity(local.len());
        for l in local {
            let k = l.value(&self.local_column);
            let matches = if k.is_null() {
                None
            } else {
                index.get(&hash_key(&[k]))
            };
            match matches {
                Some(ids) => {
                    for &i in ids {
                        let mut row = l.clone();
                        for (c, v) in foreign[i].iter() {
                            row.set(self.prefixed(c), v.clone());
                        }
                        out.push(row);
                    }
                }
                None => out.push(l.clone()),
            }
        }
        out
    }
}

impl Operator for HashJoin {
    fn name(&self) -> &'static str {
        "join_hash"
    }

    fn plan(&self, inputs: &[FrameDescription], _evaluator: &dyn Evaluator) -> Result<FrameDescription> {
        let [local, foreign] = inputs else {
            return Err(Error::config("hash join expects two inputs"));
        };
        for (d, col) in [(local, &self.local_column), (foreign, &self.foreign_column)] {
            if !d.columns.is_empty() && d.index_of(col).is_none() {
                return Err(Error::config(format!(
                    "unresolved join column: {}.{col}",
                    d.source
                )));
            }
        }

        let mut columns = local.columns.clone();
        columns.extend(foreign.columns.iter().map(|c| {
            let mut p = FrameColumn::new(self.prefixed(&c.name), c.data_type);
            p.label = c.label.clone();
            p
        }));
        Ok(FrameDescription::new(local.source.clone(), columns))
    }

    fn eval(
        &self,
        ctx: &Context,
        inputs: Vec<InMemoryBuffer>,
        _evaluator: &dyn Evaluator,
    ) -> Result<Vec<Row>> {
        ctx.check()?;
        let [local, foreign]: [InMemoryBuffer; 2] = inputs
            .try_into()
            .map_err(|_| Error::config("hash join expects two inputs"))?;
        Ok(self.join_rows(local.rows(), foreign.rows()))
    }
}

/// Exposes a join of two datasources under the join step's name.
pub struct JoinDatasource {
    name: String,
    join: HashJoin,
    local: Arc<dyn Datasource>,
    foreign: Arc<dyn Datasource>,
    evaluator: Arc<dyn Evaluator>,
    description: FrameDescription,
}

impl JoinDatasource {
    pub fn new(
        name: impl Into<String>,
        join: HashJoin,
        local: Arc<dyn Datasource>,
        foreign: Arc<dyn Datasource>,
        evaluator: Arc<dyn Evaluator>,
    ) -> Result<Self> {
        let name = name.into();
        let first = |ds: &Arc<dyn Datasource>| {
            ds.describe()
                .into_iter()
                .next()
                .unwrap_or_else(|| FrameDescription::new(ds.name(), vec![]))
        };
        let mut description = join.plan(&[first(&local), first(&foreign)], evaluator.as_ref())?;
        description.source = name.clone();
        Ok(Self {
            name,
            join,
            local,
            foreign,
            evaluator,
            description,
        })
    }
}

impl Datasource for JoinDatasource {
    fn name(&self) -> &str {
        &self.name
    }

    fn describe(&self) -> FrameDescriptionSet {
        vec![self.description.clone()]
    }

    fn load(&self, ctx: &Context, defs: &[FrameDefinition]) -> Result<LoaderGuard> {
        single_source(defs, &self.name)?;
        tracing::debug!(join = %self.name, local = self.local.name(), foreign = self.foreign.name(), "load join");

        let ctx = ctx.clone();
        let defs = defs.to_vec();
        let join = self.join.clone();
        let local = Arc::clone(&self.local);
        let foreign = Arc::clone(&self.foreign);
        let evaluator = Arc::clone(&self.evaluator);
        let description = self.description.clone();
        let key: Vec<String> = description.columns.iter().map(|c| c.name.clone()).collect();

        Ok(LoaderGuard::new(move |limit| {
            let inputs = vec![drain(&ctx, local.as_ref())?, drain(&ctx, foreign.as_ref())?];
            let rows = join.eval(&ctx, inputs, evaluator.as_ref())?;
            defs.iter()
                .map(|d| build_frame(&description, d, rows.clone(), &key, evaluator.as_ref(), limit))
                .collect()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowstep_core::row;
    use rowstep_core::types::Scalar;
    use rowstep_expr::ExprEngine;
    use rowstep_io::BufferDatasource;

    fn users() -> Vec<Row> {
        vec![
            row! { "id" => 1, "name" => "Ana" },
            row! { "id" => 2, "name" => "John" },
            row! { "name" => "Ghost" },
        ]
    }

    fn orders() -> Vec<Row> {
        vec![
            row! { "user" => 1, "total" => 10 },
            row! { "user" => 1, "total" => 5 },
            row! { "user" => 3, "total" => 7 },
        ]
    }

    #[test]
    fn left_join_rows() {
        let j = HashJoin::new("id", "orders", "user");
        let out = j.join_rows(&users(), &orders());
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].value("orders.total"), Scalar::I64(10));
        assert_eq!(out[1].value("orders.total"), Scalar::I64(5));
        assert_eq!(out[2].value("name"), Scalar::from("John"));
        assert!(!out[2].contains("orders.total"));
        assert!(!out[3].contains("orders.user"));
    }

    #[test]
    fn plan_prefixes_foreign_columns() {
        let j = HashJoin::new("id", "orders", "user");
        let local = FrameDescription::new("users", rowstep_io::memory::infer_columns(&users()));
        let foreign = FrameDescription::new("orders", rowstep_io::memory::infer_columns(&orders()));
        let d = j.plan(&[local.clone(), foreign.clone()], &ExprEngine::default()).unwrap();
        let names: Vec<_> = d.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "orders.total", "orders.user"]);

        let bad = HashJoin::new("nope", "orders", "user");
        assert!(bad.plan(&[local.clone(), foreign], &ExprEngine::default()).is_err());
        assert!(j.plan(&[local], &ExprEngine::default()).is_err());
    }

    #[test]
    fn join_datasource_loads_frames() {
        let ctx = Context::background();
        let users: Arc<dyn Datasource> = Arc::new(BufferDatasource::new("users", users().into()));
        let orders: Arc<dyn Datasource> = Arc::new(BufferDatasource::new("orders", orders().into()));
        let ds = JoinDatasource::new(
            "user_orders",
            HashJoin::new("id", "orders", "user"),
            users,
            orders,
            Arc::new(ExprEngine::default()),
        )
        .unwrap();

        assert_eq!(ds.describe()[0].source, "user_orders");
        let frames = ds
            .load(&ctx, &[FrameDefinition::new("user_orders")])
            .unwrap()
            .frames(0)
            .unwrap();
        assert_eq!(frames[0].rows.len(), 4);
    }
}
