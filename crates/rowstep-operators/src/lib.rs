#![forbid(unsafe_code)]
//! rowstep-operators: the operators steps reduce to.
//!
//! - `aggregate`: streaming group-by with post-aggregation filter, ordering,
//!   resumable accumulation (`more`) and cursor construction.
//! - `join`: left hash join of two datasources.
//!
//! Both implement `Operator` (describe output, evaluate over buffers) and
//! come with a `Datasource` wrapper so the model can expose their results.
//! Everything is synchronous and pull-based; nothing here spawns threads.

pub mod aggregate;
pub mod join;
pub mod traits;

pub use aggregate::{Aggregate, AggregateDatasource, AggregateIter, InternalFilter};
pub use join::{HashJoin, JoinDatasource};
pub use traits::Operator;
