use std::collections::{HashMap, VecDeque};

use rowstep_core::context::Context;
use rowstep_core::error::{Error, Result};
use rowstep_core::filter::PagingCursor;
use rowstep_core::hash::{hash_key, Hash256};
use rowstep_core::types::{Row, Scalar};
use rowstep_expr::{Accumulator, Evaluator};
use rowstep_io::{Buffer, InMemoryBuffer};

use super::definition::{Aggregate, Compiled};

/// Per-group running state.
struct GroupState {
    key: Vec<Scalar>,
    /// One accumulator list per output attribute.
    accs: Vec<Vec<Accumulator>>,
    /// Already handed to the caller; later updates are silent.
    emitted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Accumulating,
    Emitting,
    Done,
}

/// One scan of an aggregate over a buffer.
///
/// States: `Accumulating -> Emitting -> Accumulating -> ... -> Done`. A pass
/// ends when the buffer is exhausted or after `batch_rows` input rows; the
/// groups not yet returned are then finalized, filtered, ordered and emitted.
/// `more` re-enters accumulation after seeking the buffer.
pub struct AggregateIter<B: Buffer = InMemoryBuffer> {
    def: Aggregate,
    compiled: Compiled,
    buffer: B,

    groups: Vec<GroupState>,
    index: HashMap<Hash256, usize>,
    /// Buffer positions below this were accumulated already.
    high_water: usize,
    batch_rows: Option<usize>,
    exhausted: bool,

    phase: Phase,
    pending: VecDeque<(usize, Row)>,
    current: Option<Row>,
    err: Option<Error>,
}

impl<B: Buffer> AggregateIter<B> {
    /// Validate `def` and prepare a scan over `buffer` from its current
    /// position.
    pub fn new(def: Aggregate, buffer: B, evaluator: &dyn Evaluator) -> Result<Self> {
        let compiled = def.compile(evaluator)?;
        Ok(Self {
            def,
            compiled,
            buffer,
            groups: Vec::new(),
            index: HashMap::new(),
            high_water: 0,
            batch_rows: None,
            exhausted: false,
            phase: Phase::Accumulating,
            pending: VecDeque::new(),
            current: None,
            err: None,
        })
    }

    /// End every accumulation pass after `rows` input rows.
    pub fn with_batch_rows(mut self, rows: Option<usize>) -> Self {
        self.batch_rows = rows.filter(|r| *r > 0);
        self
    }

    pub fn definition(&self) -> &Aggregate {
        &self.def
    }

    /// The scanned buffer. Rows added here are picked up by the next `more`.
    pub fn buffer_mut(&mut self) -> &mut B {
        &mut self.buffer
    }

    /// Advance to the next output row. Returns `false` when exhausted or on
    /// error; check `err` afterwards.
    pub fn next(&mut self, ctx: &Context) -> bool {
        self.current = None;
        loop {
            match self.phase {
                Phase::Done => return false,
                Phase::Emitting => {
                    if let Some((gi, row)) = self.pending.pop_front() {
                        self.groups[gi].emitted = true;
                        self.current = Some(row);
                        return true;
                    }
                    self.phase = if self.exhausted {
                        Phase::Done
                    } else {
                        Phase::Accumulating
                    };
                }
                Phase::Accumulating => {
                    if let Err(e) = self.accumulate(ctx).and_then(|_| self.prepare_batch()) {
                        self.fail(e);
                        return false;
                    }
                    self.phase = Phase::Emitting;
                }
            }
        }
    }

    /// Copy the current row's values into `dst`.
    pub fn scan(&self, dst: &mut Row) -> Result<()> {
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| Error::state("scan called without a current row"))?;
        dst.merge(row);
        Ok(())
    }

    pub fn current(&self) -> Option<&Row> {
        self.current.as_ref()
    }

    /// The error that stopped iteration, if any.
    pub fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    pub fn take_err(&mut self) -> Option<Error> {
        self.err.take()
    }

    /// Resume accumulation from buffer `offset`.
    ///
    /// The group of `last_row` (the last row the caller consumed) counts as
    /// returned. Rows already accumulated are not counted again; rows past
    /// them merge into their groups. Returned groups are updated silently,
    /// every other group is emitted in the next batch.
    pub fn more(&mut self, ctx: &Context, offset: usize, last_row: Option<&Row>) -> Result<()> {
        self.buffer.seek(ctx, offset)?;
        if let Some(row) = last_row {
            let key: Vec<Scalar> = self.compiled.group.iter().map(|g| row.value(&g.ident)).collect();
            if let Some(&gi) = self.index.get(&hash_key(&key)) {
                self.groups[gi].emitted = true;
            }
        }
        self.pending.clear();
        self.current = None;
        self.exhausted = false;
        self.phase = Phase::Accumulating;
        tracing::trace!(aggregate = %self.def.ident, offset, high_water = self.high_water, "resume aggregation");
        Ok(())
    }

    pub fn forward_cursor(&self, row: &Row) -> Result<PagingCursor> {
        self.def.forward_cursor(row)
    }

    pub fn back_cursor(&self, row: &Row) -> Result<PagingCursor> {
        self.def.back_cursor(row)
    }

    /// Drain every remaining output row.
    pub fn collect_rows(&mut self, ctx: &Context) -> Result<Vec<Row>> {
        let mut out = Vec::new();
        while self.next(ctx) {
            if let Some(r) = self.current.take() {
                out.push(r);
            }
        }
        match self.err.take() {
            Some(e) => Err(e),
            None => Ok(out),
        }
    }

    /// Fold the rest of the buffer, one `batch_rows` pass at a time, then
    /// finalize every group not yet returned exactly once.
    ///
    /// Unlike `collect_rows`, no group is emitted before its last input row
    /// has been folded.
    pub fn collect_totals(&mut self, ctx: &Context) -> Result<Vec<Row>> {
        self.current = None;
        let mut passes = 0usize;
        let folded = loop {
            if self.exhausted || self.phase == Phase::Done {
                break Ok(());
            }
            if let Err(e) = ctx.check().and_then(|_| self.accumulate(ctx)) {
                break Err(e);
            }
            passes += 1;
        };
        if let Err(e) = folded.and_then(|_| self.prepare_batch()) {
            tracing::debug!(aggregate = %self.def.ident, error = %e, "aggregation failed");
            self.pending.clear();
            self.phase = Phase::Done;
            return Err(e);
        }
        tracing::debug!(aggregate = %self.def.ident, passes, groups = self.groups.len(), "aggregate totals");

        let pending = std::mem::take(&mut self.pending);
        let mut out = Vec::with_capacity(pending.len());
        for (gi, row) in pending {
            self.groups[gi].emitted = true;
            out.push(row);
        }
        self.phase = Phase::Done;
        Ok(out)
    }

    fn fail(&mut self, e: Error) {
        tracing::debug!(aggregate = %self.def.ident, error = %e, "aggregation failed");
        self.err = Some(e);
        self.pending.clear();
        self.phase = Phase::Done;
    }

    /// One accumulation pass.
    fn accumulate(&mut self, ctx: &Context) -> Result<()> {
        let mut seen = 0usize;
        loop {
            if self.batch_rows.is_some_and(|b| seen >= b) {
                break;
            }
            let pos = self.buffer.position();
            let Some(row) = self.buffer.next_row(ctx)? else {
                self.exhausted = true;
                break;
            };
            if pos < self.high_water {
                continue;
            }
            self.high_water = pos + 1;
            self.fold(&row)?;
            seen += 1;
        }
        tracing::trace!(aggregate = %self.def.ident, rows = seen, groups = self.groups.len(), "accumulated");
        Ok(())
    }

    fn fold(&mut self, row: &Row) -> Result<()> {
        let key = self
            .compiled
            .group
            .iter()
            .map(|g| g.program.eval(row))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let gi = match self.index.get(&hash_key(&key)) {
            Some(&gi) => gi,
            None => {
                let gi = self.groups.len();
                self.index.insert(hash_key(&key), gi);
                self.groups.push(GroupState {
                    key,
                    accs: self.compiled.out.iter().map(|o| o.program.accumulators()).collect(),
                    emitted: false,
                });
                gi
            }
        };

        let group = &mut self.groups[gi];
        for (out, accs) in self.compiled.out.iter().zip(group.accs.iter_mut()) {
            out.program.accumulate(accs, row)?;
        }
        Ok(())
    }

    /// Finalize, filter and order every group not yet returned.
    fn prepare_batch(&mut self) -> Result<()> {
        let mut batch = Vec::new();
        for (gi, g) in self.groups.iter().enumerate() {
            if g.emitted {
                continue;
            }
            let row = self.output_row(g)?;
            if self.admits(&row, g)? {
                batch.push((gi, row));
            }
        }
        // stable: equal keys keep first-seen order
        let order = &self.def.filter.order_by;
        batch.sort_by(|a, b| order.compare(&a.1, &b.1));
        self.pending = batch.into();
        Ok(())
    }

    fn output_row(&self, g: &GroupState) -> Result<Row> {
        let mut row = Row::new();
        for (col, v) in self.compiled.group.iter().zip(&g.key) {
            row.set(col.ident.clone(), v.clone());
        }
        for (col, accs) in self.compiled.out.iter().zip(&g.accs) {
            row.set(col.ident.clone(), col.program.finalize(accs)?);
        }
        Ok(row)
    }

    /// Constraints, then the filter expression, over the output row plus the
    /// source names of renamed group attributes.
    fn admits(&self, row: &Row, g: &GroupState) -> Result<bool> {
        if self.def.filter.rows.constraints.is_empty() && self.compiled.filter.is_none() {
            return Ok(true);
        }
        let mut eval_row = row.clone();
        for (col, v) in self.compiled.group.iter().zip(&g.key) {
            if let Some(src) = &col.source {
                if !eval_row.contains(src) {
                    eval_row.set(src.clone(), v.clone());
                }
            }
        }
        if !self.def.filter.rows.satisfies_constraints(&eval_row) {
            return Ok(false);
        }
        match &self.compiled.filter {
            Some(p) => Ok(p.eval_bool(&eval_row)?),
            None => Ok(true),
        }
    }
}
