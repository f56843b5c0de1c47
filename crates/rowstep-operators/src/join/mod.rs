//! Joins.

mod hash;

pub use hash::{HashJoin, JoinDatasource};
