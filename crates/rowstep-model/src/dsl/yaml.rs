//! YAML pipelines.
//!
//! Example:
//! ```yaml
//! config:
//!   default_page_size: 50
//! steps:
//!   - load: { name: users, source: csv, definition: { path: users.csv } }
//!   - load: { name: orders, source: csv, definition: { path: orders.csv } }
//!   - join:
//!       name: user_orders
//!       localSource: users
//!       localColumn: id
//!       foreignSource: orders
//!       foreignColumn: user
//!   - group:
//!       name: spend
//!       source: user_orders
//!       keys: [{ ident: name }]
//!       columns: [{ ident: total, expr: "sum(orders.amount)" }]
//!       filter: { expression: "total > 0", orderBy: [{ column: total, descending: true }] }
//! ```
//!
//! Steps use the same `load`/`join`/`group` tagging as the JSON wire shape.

use serde::{Deserialize, Serialize};

use rowstep_core::config::EngineConfig;
use rowstep_core::error::{Error, Result};

use crate::definition::StepDefinition;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(default)]
    pub config: Option<PipelineConfig>,
    pub steps: Vec<StepDefinition>,
}

/// Per-pipeline overrides applied on top of `EngineConfig::from_env`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub default_page_size: Option<usize>,
    pub max_page_size: Option<usize>,
    pub aggregate_batch_rows: Option<usize>,
}

impl PipelineConfig {
    pub fn apply(&self, mut cfg: EngineConfig) -> EngineConfig {
        if let Some(v) = self.default_page_size {
            cfg.default_page_size = v;
        }
        if let Some(v) = self.max_page_size {
            cfg.max_page_size = v;
        }
        if let Some(v) = self.aggregate_batch_rows {
            cfg.aggregate_batch_rows = (v > 0).then_some(v);
        }
        cfg
    }
}

#[derive(Debug, Clone)]
pub struct ParsedPipeline {
    pub steps: Vec<StepDefinition>,
    pub config: PipelineConfig,
}

/// Parse a YAML pipeline; every step must select exactly one kind.
pub fn parse_yaml_pipeline(yaml_src: &str) -> Result<ParsedPipeline> {
    let doc: Pipeline =
        serde_yaml::from_str(yaml_src).map_err(|e| Error::Codec(format!("pipeline yaml: {e}")))?;

    for (i, step) in doc.steps.iter().enumerate() {
        step.kind().map_err(|e| e.context(&format!("step {i}")))?;
    }

    Ok(ParsedPipeline {
        steps: doc.steps,
        config: doc.config.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::StepKind;

    const PIPELINE: &str = r#"
config:
  default_page_size: 50
  aggregate_batch_rows: 0
steps:
  - load: { name: users, source: csv, definition: { path: users.csv } }
  - load: { name: orders, source: csv, definition: { path: orders.csv } }
  - join:
      name: user_orders
      localSource: users
      localColumn: id
      foreignSource: orders
      foreignColumn: user
  - group:
      name: spend
      source: user_orders
      keys: [{ ident: name }]
      columns: [{ ident: total, expr: "sum(orders.amount)" }]
      filter:
        constraints: { name: [Ana, John] }
        expression: "total > 0"
        orderBy: [{ column: total, descending: true }]
"#;

    #[test]
    fn parses_all_step_kinds() {
        let p = parse_yaml_pipeline(PIPELINE).unwrap();
        assert_eq!(p.steps.len(), 4);

        let StepKind::Load(load) = p.steps[0].kind().unwrap() else {
            panic!("expected load");
        };
        assert_eq!(load.option_str("path"), Some("users.csv"));

        let StepKind::Group(group) = p.steps[3].kind().unwrap() else {
            panic!("expected group");
        };
        assert_eq!(group.filter.order_by.to_string(), "total DESC");
        assert_eq!(group.filter.rows.constraints["name"].len(), 2);

        let cfg = p.config.apply(EngineConfig::default());
        assert_eq!(cfg.default_page_size, 50);
        assert_eq!(cfg.max_page_size, 1000);
        assert_eq!(cfg.aggregate_batch_rows, None);
    }

    #[test]
    fn rejects_bad_documents() {
        assert!(matches!(parse_yaml_pipeline("steps: 3"), Err(Error::Codec(_))));
        assert!(matches!(parse_yaml_pipeline("steps: [{}]"), Err(Error::Config(_))));
    }
}
