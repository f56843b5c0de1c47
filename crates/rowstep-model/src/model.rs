//! The model: build from definitions, `run` once, then `load`/`describe`.

use std::collections::BTreeMap;
use std::sync::Arc;

use rowstep_core::config::EngineConfig;
use rowstep_core::context::Context;
use rowstep_core::error::{Error, Result};
use rowstep_core::filter::{Paging, SortExprSet};
use rowstep_core::schema::FrameDescriptionSet;
use rowstep_expr::{Evaluator, ExprEngine};
use rowstep_io::datasource::find;
use rowstep_io::{Datasource, DatasourceProvider, Frame, FrameDefinition};

use crate::definition::{StepDefinition, StepKind};
use crate::graph::StepGraph;
use crate::step::{GroupStep, JoinStep, RunEnv, Step};

/// Datasource providers by the name load steps refer to.
pub type Providers = BTreeMap<String, Arc<dyn DatasourceProvider>>;

pub struct Model {
    config: EngineConfig,
    evaluator: Arc<dyn Evaluator>,
    steps: Vec<Box<dyn Step>>,
    datasources: Vec<Arc<dyn Datasource>>,
    ran: bool,
}

impl Model {
    /// Resolve every load step against `providers` and defer the rest.
    ///
    /// Additional steps may be added until `run` is called.
    pub fn new(ctx: &Context, providers: &Providers, defs: &[StepDefinition]) -> Result<Self> {
        let mut model = Self {
            config: EngineConfig::default(),
            evaluator: Arc::new(ExprEngine::default()),
            steps: Vec::with_capacity(defs.len()),
            datasources: Vec::new(),
            ran: false,
        };
        model
            .add_definitions(ctx, providers, defs)
            .map_err(|e| e.context("failed to create the model"))?;
        Ok(model)
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn add_definitions(&mut self, ctx: &Context, providers: &Providers, defs: &[StepDefinition]) -> Result<()> {
        for d in defs {
            match d.kind()? {
                StepKind::Load(load) => {
                    let provider = providers.get(&load.source).ok_or_else(|| {
                        Error::resource(format!("unresolved datasource: {}", load.source))
                    })?;
                    let ds = provider.datasource(ctx, load)?;
                    tracing::debug!(name = %load.name, provider = %load.source, "datasource resolved");
                    self.datasources.push(ds);
                }
                StepKind::Join(join) => self.steps.push(Box::new(JoinStep::new(join.clone()))),
                StepKind::Group(group) => self.steps.push(Box::new(GroupStep::new(group.clone()))),
            }
        }
        Ok(())
    }

    /// Add deferred steps; fails once the model ran.
    pub fn add(&mut self, steps: Vec<Box<dyn Step>>) -> Result<&mut Self> {
        if self.ran {
            return Err(Error::state("model already ran, steps can no longer be added"));
        }
        self.steps.extend(steps);
        Ok(self)
    }

    /// Validate and reduce the step graph. Only the first call may succeed;
    /// the model counts as ran even when this fails.
    pub fn run(&mut self, ctx: &Context) -> Result<()> {
        let res = self.run_inner(ctx);
        self.ran = true;
        res.map_err(|e| e.context("failed to run the model"))
    }

    fn run_inner(&mut self, ctx: &Context) -> Result<()> {
        if self.ran {
            return Err(Error::state("model already ran"));
        }
        if self.steps.is_empty() && self.datasources.is_empty() {
            return Err(Error::state("no model steps defined"));
        }
        for s in &self.steps {
            s.validate()?;
        }
        if self.steps.is_empty() {
            return Ok(());
        }

        let env = RunEnv {
            evaluator: Arc::clone(&self.evaluator),
            config: self.config.clone(),
        };
        let graph = StepGraph::build(&self.steps, &self.datasources)?;
        tracing::debug!(nodes = graph.len(), steps = self.steps.len(), "reducing step graph");
        let reduced = graph.reduce(ctx, &env)?;
        self.datasources = reduced;
        Ok(())
    }

    pub fn is_ran(&self) -> bool {
        self.ran
    }

    /// Names of the datasources the model currently serves.
    pub fn datasource_names(&self) -> Vec<&str> {
        self.datasources.iter().map(|d| d.name()).collect()
    }

    /// Definitions of the deferred steps.
    pub fn definitions(&self) -> Vec<StepDefinition> {
        self.steps.iter().map(|s| s.definition()).collect()
    }

    /// Frame/column descriptions of datasource `source`.
    pub fn describe(&self, source: &str) -> Result<FrameDescriptionSet> {
        self.describe_inner(source)
            .map_err(|e| e.context("unable to describe the model source"))
    }

    fn describe_inner(&self, source: &str) -> Result<FrameDescriptionSet> {
        if !self.ran {
            return Err(Error::state("model was not yet ran"));
        }
        let ds = find(&self.datasources, source).ok_or_else(|| {
            Error::resource(format!("model does not contain the datasource: {source}"))
        })?;
        Ok(ds.describe())
    }

    /// Load frames from one datasource. Every definition must name the same
    /// source; call `load` once per datasource otherwise.
    pub fn load(&self, ctx: &Context, defs: &[FrameDefinition]) -> Result<Vec<Frame>> {
        self.load_inner(ctx, defs)
            .map_err(|e| e.context("unable to load frames"))
    }

    fn load_inner(&self, ctx: &Context, defs: &[FrameDefinition]) -> Result<Vec<Frame>> {
        if !self.ran {
            return Err(Error::state("model was not yet ran"));
        }
        let first = defs
            .first()
            .ok_or_else(|| Error::config("no frame definitions provided"))?;
        for pair in defs.windows(2) {
            if pair[1].source != pair[0].source {
                return Err(Error::config(format!(
                    "frame definition source mismatch: expected {}, got {}",
                    pair[0].source, pair[1].source
                )));
            }
        }
        let ds = find(&self.datasources, &first.source)
            .ok_or_else(|| Error::resource(format!("unresolved datasource: {}", first.source)))?;

        let defs: Vec<FrameDefinition> = defs.iter().map(|d| self.with_defaults(d)).collect();
        let limit = defs[0].limit();
        tracing::debug!(source = %first.source, frames = defs.len(), limit, "load frames");

        let mut guard = ds.load(ctx, &defs)?;
        guard.frames(limit)
    }

    /// Bounded paging and explicit (possibly empty) sorting.
    fn with_defaults(&self, def: &FrameDefinition) -> FrameDefinition {
        let mut def = def.clone();
        match def.paging.as_mut() {
            Some(p) => p.limit = self.config.page_limit(p.limit),
            None => def.paging = Some(Paging::with_limit(self.config.default_page_size)),
        }
        if def.sorting.is_none() {
            def.sorting = Some(SortExprSet::default());
        }
        def
    }
}
