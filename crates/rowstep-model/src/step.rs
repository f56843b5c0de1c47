//! Deferred pipeline steps.
//!
//! `load` steps become datasources as soon as the model is built; `join` and
//! `group` steps wait for `Model::run`, where each is handed the datasources
//! named by `source()` and reduced to a datasource of its own.

use std::sync::Arc;

use rowstep_core::config::EngineConfig;
use rowstep_core::context::Context;
use rowstep_core::error::{Error, Result};
use rowstep_expr::Evaluator;
use rowstep_io::Datasource;
use rowstep_operators::{AggregateDatasource, HashJoin, JoinDatasource};

use crate::definition::{GroupStepDefinition, JoinStepDefinition, StepDefinition};

/// Shared collaborators for reducing steps.
#[derive(Clone)]
pub struct RunEnv {
    pub evaluator: Arc<dyn Evaluator>,
    pub config: EngineConfig,
}

pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    /// Names of the datasources/steps this step reads, in input order.
    fn source(&self) -> Vec<String>;

    /// Structural checks that need no input.
    fn validate(&self) -> Result<()>;

    fn run(&self, ctx: &Context, inputs: Vec<Arc<dyn Datasource>>, env: &RunEnv) -> Result<Arc<dyn Datasource>>;

    fn definition(&self) -> StepDefinition;
}

pub struct GroupStep {
    def: GroupStepDefinition,
}

impl GroupStep {
    pub fn new(def: GroupStepDefinition) -> Self {
        Self { def }
    }
}

impl Step for GroupStep {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn source(&self) -> Vec<String> {
        vec![self.def.source.clone()]
    }

    fn validate(&self) -> Result<()> {
        let check = || {
            if self.def.name.is_empty() {
                return Err(Error::config("group step name not defined"));
            }
            if self.def.source.is_empty() {
                return Err(Error::config("group step source not defined"));
            }
            if self.def.keys.is_empty() {
                return Err(Error::config("group step keys not defined"));
            }
            if self.def.columns.is_empty() {
                return Err(Error::config("group step columns not defined"));
            }
            Ok(())
        };
        check().map_err(|e| e.context(&format!("invalid group step {}", self.def.name)))
    }

    fn run(&self, ctx: &Context, inputs: Vec<Arc<dyn Datasource>>, env: &RunEnv) -> Result<Arc<dyn Datasource>> {
        ctx.check()?;
        let [input]: [Arc<dyn Datasource>; 1] = inputs
            .try_into()
            .map_err(|_| Error::config(format!("group step {} expects one input", self.def.name)))?;

        let ds = AggregateDatasource::new(self.def.aggregate(), input, Arc::clone(&env.evaluator))?
            .with_batch_rows(env.config.aggregate_batch_rows);
        Ok(Arc::new(ds))
    }

    fn definition(&self) -> StepDefinition {
        self.def.clone().into()
    }
}

pub struct JoinStep {
    def: JoinStepDefinition,
}

impl JoinStep {
    pub fn new(def: JoinStepDefinition) -> Self {
        Self { def }
    }
}

impl Step for JoinStep {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn source(&self) -> Vec<String> {
        vec![self.def.local_source.clone(), self.def.foreign_source.clone()]
    }

    fn validate(&self) -> Result<()> {
        let d = &self.def;
        let required = [
            ("name", &d.name),
            ("local source", &d.local_source),
            ("local column", &d.local_column),
            ("foreign source", &d.foreign_source),
            ("foreign column", &d.foreign_column),
        ];
        let check = || {
            if let Some((field, _)) = required.iter().find(|(_, v)| v.is_empty()) {
                return Err(Error::config(format!("join step {field} not defined")));
            }
            if d.local_source == d.foreign_source {
                return Err(Error::config("join step local and foreign sources must differ"));
            }
            Ok(())
        };
        check().map_err(|e| e.context(&format!("invalid join step {}", d.name)))
    }

    fn run(&self, ctx: &Context, inputs: Vec<Arc<dyn Datasource>>, env: &RunEnv) -> Result<Arc<dyn Datasource>> {
        ctx.check()?;
        let [local, foreign]: [Arc<dyn Datasource>; 2] = inputs
            .try_into()
            .map_err(|_| Error::config(format!("join step {} expects two inputs", self.def.name)))?;

        let join = HashJoin::new(
            self.def.local_column.clone(),
            self.def.foreign_source.clone(),
            self.def.foreign_column.clone(),
        );
        let ds = JoinDatasource::new(self.def.name.clone(), join, local, foreign, Arc::clone(&env.evaluator))?;
        Ok(Arc::new(ds))
    }

    fn definition(&self) -> StepDefinition {
        self.def.clone().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowstep_core::attribute::Attribute;

    #[test]
    fn group_validation() {
        let ok = GroupStepDefinition::new("g", "src")
            .with_keys(vec![Attribute::new("k")])
            .with_columns(vec![Attribute::new("n").with_expr("count()")]);
        assert!(GroupStep::new(ok.clone()).validate().is_ok());
        assert_eq!(GroupStep::new(ok.clone()).source(), vec!["src"]);

        let err = GroupStep::new(ok.clone().with_keys(Vec::<Attribute>::new()))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("keys not defined"), "{err}");

        let err = GroupStep::new(GroupStepDefinition { source: String::new(), ..ok })
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("source not defined"), "{err}");
    }

    #[test]
    fn join_validation() {
        let ok = JoinStepDefinition::new("j", ("a", "id"), ("b", "a_id"));
        assert!(JoinStep::new(ok.clone()).validate().is_ok());
        assert_eq!(JoinStep::new(ok.clone()).source(), vec!["a", "b"]);

        let same = JoinStepDefinition::new("j", ("a", "id"), ("a", "parent"));
        assert!(matches!(JoinStep::new(same).validate(), Err(Error::Config(_))));

        let missing = JoinStepDefinition {
            foreign_column: String::new(),
            ..ok
        };
        let err = JoinStep::new(missing).validate().unwrap_err();
        assert!(err.to_string().contains("foreign column"), "{err}");
    }
}
