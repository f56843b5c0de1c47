#![forbid(unsafe_code)]
//! rowstep-core: shared vocabulary for the rowstep engine.
//!
//! - `types`: the `Scalar` value and the `Row` map flowing through steps.
//! - `attribute`: declarative attribute descriptions (`ident`/`source`/`expr`).
//! - `schema`: frame/column descriptions returned by `Describe`.
//! - `filter`: paging, sorting and the resumable `PagingCursor`.
//! - `context`: cancellation handle threaded through every read.
//!
//! No I/O lives here; datasources and buffers are in `rowstep-io`.

pub mod attribute;
pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod hash;
pub mod prelude;
pub mod schema;
pub mod types;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
