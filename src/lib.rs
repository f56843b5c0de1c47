#![forbid(unsafe_code)]
//! rowstep: declarative, step-based row pipelines.
//!
//! This crate re-exports the workspace crates so embedders need a single
//! dependency:
//!
//! - [`core`]: rows, scalars, attributes, paging cursors, errors, config.
//! - [`expr`]: the expression evaluator and aggregate accumulators.
//! - [`io`]: buffers, the datasource contract, CSV and JSON-lines adapters.
//! - [`operators`]: the aggregate and hash-join operators.
//! - [`model`]: step definitions, graph reduction and the `Model` API.

pub use rowstep_core as core;
pub use rowstep_expr as expr;
pub use rowstep_io as io;
pub use rowstep_model as model;
pub use rowstep_operators as operators;

pub mod prelude {
    pub use rowstep_core::prelude::*;
    pub use rowstep_core::row;
    pub use rowstep_expr::{Evaluator, ExprEngine};
    pub use rowstep_io::{
        Buffer, Datasource, DatasourceProvider, Frame, FrameDefinition, InMemoryBuffer,
        LoadStepDefinition, StaticProvider,
    };
    pub use rowstep_model::{
        parse_yaml_pipeline, GroupStepDefinition, JoinStepDefinition, Model, Providers,
        StepDefinition,
    };
    pub use rowstep_operators::{Aggregate, AggregateIter, InternalFilter};
}
