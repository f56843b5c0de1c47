//! Append-only, seekable row storage.

use rowstep_core::context::Context;
use rowstep_core::error::{Error, Result};
use rowstep_core::types::Row;

/// Minimal row store every step reads from.
///
/// Reads are sequential from the current position; `seek` moves the
/// position anywhere in `0..=len()`.
pub trait Buffer: Send {
    fn add(&mut self, ctx: &Context, row: Row) -> Result<()>;

    fn seek(&mut self, ctx: &Context, offset: usize) -> Result<()>;

    /// Next row at the current position, or `None` at the end.
    fn next_row(&mut self, ctx: &Context) -> Result<Option<Row>>;

    fn position(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `Vec`-backed buffer. Cloning yields an independent snapshot with its own
/// read position.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBuffer {
    rows: Vec<Row>,
    pos: usize,
}

impl InMemoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
}

impl From<Vec<Row>> for InMemoryBuffer {
    fn from(rows: Vec<Row>) -> Self {
        Self { rows, pos: 0 }
    }
}

impl FromIterator<Row> for InMemoryBuffer {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<_>>().into()
    }
}

impl Buffer for InMemoryBuffer {
    fn add(&mut self, ctx: &Context, row: Row) -> Result<()> {
        ctx.check()?;
        self.rows.push(row);
        Ok(())
    }

    fn seek(&mut self, ctx: &Context, offset: usize) -> Result<()> {
        ctx.check()?;
        if offset > self.rows.len() {
            return Err(Error::resource(format!(
                "seek offset {offset} out of bounds (len {})",
                self.rows.len()
            )));
        }
        self.pos = offset;
        Ok(())
    }

    fn next_row(&mut self, ctx: &Context) -> Result<Option<Row>> {
        ctx.check()?;
        let row = self.rows.get(self.pos).cloned();
        if row.is_some() {
            self.pos += 1;
        }
        Ok(row)
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowstep_core::row;

    #[test]
    fn sequential_reads_and_seek() {
        let ctx = Context::background();
        let mut b = InMemoryBuffer::new();
        b.add(&ctx, row! { "a" => 1 }).unwrap();
        b.add(&ctx, row! { "a" => 2 }).unwrap();

        assert_eq!(b.next_row(&ctx).unwrap(), Some(row! { "a" => 1 }));
        assert_eq!(b.position(), 1);
        assert_eq!(b.next_row(&ctx).unwrap(), Some(row! { "a" => 2 }));
        assert_eq!(b.next_row(&ctx).unwrap(), None);

        b.seek(&ctx, 1).unwrap();
        assert_eq!(b.next_row(&ctx).unwrap(), Some(row! { "a" => 2 }));
        assert!(b.seek(&ctx, 3).is_err());
        assert!(b.seek(&ctx, 2).is_ok());
    }

    #[test]
    fn snapshots_are_independent() {
        let ctx = Context::background();
        let mut a: InMemoryBuffer = vec![row! { "x" => 1 }].into();
        let mut b = a.clone();
        a.next_row(&ctx).unwrap();
        assert_eq!(a.position(), 1);
        assert_eq!(b.position(), 0);
        b.add(&ctx, row! { "x" => 2 }).unwrap();
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn cancelled_reads_fail() {
        let ctx = Context::background();
        let mut b: InMemoryBuffer = vec![row! { "x" => 1 }].into();
        ctx.cancel();
        assert!(matches!(b.next_row(&ctx), Err(Error::Cancelled)));
    }
}
