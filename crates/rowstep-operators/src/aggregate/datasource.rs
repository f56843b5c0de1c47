use std::sync::Arc;

use rowstep_core::context::Context;
use rowstep_core::error::Result;
use rowstep_core::filter::{Paging, RowFilter};
use rowstep_core::schema::{FrameDescription, FrameDescriptionSet};
use rowstep_core::types::Row;
use rowstep_expr::Evaluator;
use rowstep_io::datasource::single_source;
use rowstep_io::memory::infer_columns;
use rowstep_io::pager::frame_from_sorted;
use rowstep_io::{drain, Datasource, FrameDefinition, InMemoryBuffer, LoaderGuard};

use super::definition::Aggregate;
use super::iter::AggregateIter;
use crate::traits::Operator;

/// Exposes an aggregate over an input datasource as a datasource.
///
/// Every `load` drains the input into a fresh buffer snapshot, so
/// concurrent loads never share iterator state.
pub struct AggregateDatasource {
    def: Aggregate,
    input: Arc<dyn Datasource>,
    evaluator: Arc<dyn Evaluator>,
    batch_rows: Option<usize>,
    description: FrameDescription,
}

impl AggregateDatasource {
    /// Binds the definition to the input's description and validates it;
    /// fails with `Error::Config` when it does not validate.
    pub fn new(def: Aggregate, input: Arc<dyn Datasource>, evaluator: Arc<dyn Evaluator>) -> Result<Self> {
        let inputs = input.describe();
        let def = match inputs.first() {
            Some(d) => def.bind(d),
            None => def,
        };
        let description = def.plan(&inputs, evaluator.as_ref())?;
        Ok(Self {
            def,
            input,
            evaluator,
            batch_rows: None,
            description,
        })
    }

    pub fn with_batch_rows(mut self, rows: Option<usize>) -> Self {
        self.batch_rows = rows;
        self
    }
}

/// The definition as requested by one frame: frame sorting replaces
/// `orderBy`, frame filters narrow the definition's filter.
fn overlay(def: &Aggregate, frame: &FrameDefinition) -> Aggregate {
    let mut out = def.clone();

    if let Some(cursor) = frame.paging.as_ref().and_then(Paging::page_cursor) {
        out.filter.order_by = cursor.sorting();
    } else {
        if let Some(sorting) = frame.sorting.as_ref().filter(|s| !s.is_empty()) {
            out.filter.order_by = sorting.clone();
        }
        out.filter.order_by = out.cursor_order();
    }

    merge_filter(&mut out.filter.rows, &frame.filter);
    out
}

fn merge_filter(into: &mut RowFilter, extra: &RowFilter) {
    for (ident, allowed) in &extra.constraints {
        match into.constraints.get_mut(ident) {
            Some(cur) => cur.retain(|v| allowed.iter().any(|a| a.loose_eq(v))),
            None => {
                into.constraints.insert(ident.clone(), allowed.clone());
            }
        }
    }
    let extra_expr = extra.expression.as_deref().map(str::trim).filter(|e| !e.is_empty());
    if let Some(e) = extra_expr {
        into.expression = Some(match into.expression.as_deref().map(str::trim) {
            Some(cur) if !cur.is_empty() => format!("({cur}) && ({e})"),
            _ => e.to_string(),
        });
    }
}

impl Datasource for AggregateDatasource {
    fn name(&self) -> &str {
        &self.def.ident
    }

    fn describe(&self) -> FrameDescriptionSet {
        vec![self.description.clone()]
    }

    fn load(&self, ctx: &Context, defs: &[FrameDefinition]) -> Result<LoaderGuard> {
        single_source(defs, &self.def.ident)?;

        // validate every overlay before handing out the loader
        let plans: Vec<(FrameDefinition, Aggregate)> = defs
            .iter()
            .map(|d| {
                let agg = overlay(&self.def, d);
                agg.dryrun(self.evaluator.as_ref()).map(|_| (d.clone(), agg))
            })
            .collect::<Result<_>>()?;

        tracing::debug!(aggregate = %self.def.ident, input = self.input.name(), frames = defs.len(), "load aggregate");

        let ctx = ctx.clone();
        let input = Arc::clone(&self.input);
        let evaluator = Arc::clone(&self.evaluator);
        let description = self.description.clone();
        let batch_rows = self.batch_rows;

        Ok(LoaderGuard::new(move |limit| {
            let buffer = drain(&ctx, input.as_ref())?;
            let mut frames = Vec::with_capacity(plans.len());
            for (frame_def, agg) in &plans {
                let order = agg.filter.order_by.clone();
                let mut it = AggregateIter::new(agg.clone(), buffer.clone(), evaluator.as_ref())?
                    .with_batch_rows(batch_rows);
                let rows = it.collect_totals(&ctx)?;
                frames.push(frame_from_sorted(&description, frame_def, rows, &order, limit));
            }
            Ok(frames)
        }))
    }
}

impl Operator for Aggregate {
    fn name(&self) -> &'static str {
        "aggregate"
    }

    fn plan(&self, inputs: &[FrameDescription], evaluator: &dyn Evaluator) -> Result<FrameDescription> {
        let def = match inputs.first() {
            Some(d) => self.bind(d),
            None => self.clone(),
        };
        def.dryrun(evaluator)?;
        Ok(def.describe())
    }

    fn eval(
        &self,
        ctx: &Context,
        inputs: Vec<InMemoryBuffer>,
        evaluator: &dyn Evaluator,
    ) -> Result<Vec<Row>> {
        let buffer = inputs.into_iter().next().unwrap_or_default();
        let description = FrameDescription::new("", infer_columns(buffer.rows()));
        AggregateIter::new(self.bind(&description), buffer, evaluator)?.collect_rows(ctx)
    }
}
