#![forbid(unsafe_code)]
//! rowstep-model: turns declarative step definitions into datasources.
//!
//! A `Model` is built from named `DatasourceProvider`s and a list of
//! `StepDefinition`s (`load`, `join` or `group`). `run` validates the steps,
//! links them into a graph by name and reduces the graph bottom-up; the
//! resulting datasources are then served through `load` and `describe`.
//!
//! Pipelines can also be written as YAML, see [`dsl::yaml`].

pub mod definition;
pub mod dsl;
pub mod graph;
pub mod model;
pub mod step;

pub use definition::{GroupStepDefinition, JoinStepDefinition, StepDefinition, StepKind};
pub use dsl::yaml::{parse_yaml_pipeline, ParsedPipeline, PipelineConfig};
pub use model::{Model, Providers};
pub use step::{GroupStep, JoinStep, RunEnv, Step};
