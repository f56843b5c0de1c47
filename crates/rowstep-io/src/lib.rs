#![forbid(unsafe_code)]
//! rowstep-io: row storage and the datasource read contract.
//!
//! - `buffer`: append-only, seekable row store (`Buffer`, `InMemoryBuffer`).
//! - `datasource`: the `Datasource`/`DatasourceProvider` traits and the
//!   `LoaderGuard` returned by `load`.
//! - `frame`: frame requests (`FrameDefinition`) and results (`Frame`).
//! - `pager`: filtering, ordering and cursor paging shared by datasources.
//! - `memory`: `BufferDatasource` and the in-memory `StaticProvider`.
//! - `readers::csv` / `writers::jsonl`: file adapters used by the CLI.

pub mod buffer;
pub mod datasource;
pub mod frame;
pub mod memory;
pub mod pager;
pub mod readers;
pub mod writers;

pub use buffer::{Buffer, InMemoryBuffer};
pub use datasource::{drain, Datasource, DatasourceProvider, LoadStepDefinition, LoaderGuard};
pub use frame::{Frame, FrameDefinition};
pub use memory::{BufferDatasource, StaticProvider};
pub use readers::csv::CsvProvider;
pub use writers::jsonl::JsonlWriter;
