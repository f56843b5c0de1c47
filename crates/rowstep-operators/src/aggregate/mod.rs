//! Group-by aggregation.
//!
//! `Aggregate` is the immutable definition; `dryrun` validates it and
//! compiles every expression before any row is read. `AggregateIter` owns the
//! live grouping state for one scan over one buffer, and
//! `AggregateDatasource` exposes the result through the datasource contract.

mod datasource;
mod definition;
mod iter;

pub use datasource::AggregateDatasource;
pub use definition::{Aggregate, InternalFilter};
pub use iter::AggregateIter;
