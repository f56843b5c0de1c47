//! Step graph: an arena of datasource and step nodes linked by name.
//!
//! Edges point from a step to every node named in its `source()`. Reduction
//! is depth-first and post-order; each node is reduced once, so a datasource
//! shared by several steps yields one `Arc`. Nodes nothing depends on are the
//! graph's roots and make up the model's datasources after a run.

use std::collections::HashMap;
use std::sync::Arc;

use rowstep_core::context::Context;
use rowstep_core::error::{Error, Result};
use rowstep_io::Datasource;

use crate::step::{RunEnv, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

enum NodeKind<'a> {
    Datasource(Arc<dyn Datasource>),
    Step(&'a dyn Step),
}

struct Node<'a> {
    name: String,
    kind: NodeKind<'a>,
    inputs: Vec<NodeId>,
    has_parent: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

pub struct StepGraph<'a> {
    nodes: Vec<Node<'a>>,
}

impl<'a> StepGraph<'a> {
    /// Link `steps` to each other and to `datasources` by name.
    pub fn build(steps: &'a [Box<dyn Step>], datasources: &[Arc<dyn Datasource>]) -> Result<Self> {
        let mut nodes = Vec::with_capacity(steps.len() + datasources.len());
        let mut by_name: HashMap<String, NodeId> = HashMap::new();

        let mut push = |nodes: &mut Vec<Node<'a>>, name: &str, kind: NodeKind<'a>| -> Result<()> {
            let id = NodeId(nodes.len());
            if by_name.insert(name.to_string(), id).is_some() {
                return Err(Error::config(format!("duplicate step or datasource name: {name}")));
            }
            nodes.push(Node {
                name: name.to_string(),
                kind,
                inputs: Vec::new(),
                has_parent: false,
            });
            Ok(())
        };

        for ds in datasources {
            push(&mut nodes, ds.name(), NodeKind::Datasource(Arc::clone(ds)))?;
        }
        for s in steps {
            push(&mut nodes, s.name(), NodeKind::Step(s.as_ref()))?;
        }

        for i in 0..nodes.len() {
            let sources = match &nodes[i].kind {
                NodeKind::Step(s) => s.source(),
                NodeKind::Datasource(_) => continue,
            };
            for src in sources {
                let id = *by_name.get(&src).ok_or_else(|| {
                    Error::resource(format!("unresolved step source: {src} (step {})", nodes[i].name))
                })?;
                nodes[i].inputs.push(id);
                nodes[id.0].has_parent = true;
            }
        }

        Ok(Self { nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> Vec<NodeId> {
        (0..self.nodes.len())
            .map(NodeId)
            .filter(|id| !self.nodes[id.0].has_parent)
            .collect()
    }

    /// Reduce every node and return the roots' datasources.
    pub fn reduce(&self, ctx: &Context, env: &RunEnv) -> Result<Vec<Arc<dyn Datasource>>> {
        let mut memo: Vec<Option<Arc<dyn Datasource>>> = vec![None; self.nodes.len()];
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];

        // every node, not just roots, so cycles nobody reaches are reported too
        for i in 0..self.nodes.len() {
            self.reduce_node(ctx, env, NodeId(i), &mut memo, &mut marks)?;
        }

        self.roots()
            .into_iter()
            .map(|id| {
                memo[id.0]
                    .clone()
                    .ok_or_else(|| Error::state(format!("node {} was not reduced", self.nodes[id.0].name)))
            })
            .collect()
    }

    fn reduce_node(
        &self,
        ctx: &Context,
        env: &RunEnv,
        id: NodeId,
        memo: &mut [Option<Arc<dyn Datasource>>],
        marks: &mut [Mark],
    ) -> Result<Arc<dyn Datasource>> {
        let node = &self.nodes[id.0];
        match marks[id.0] {
            Mark::Done => {
                if let Some(ds) = &memo[id.0] {
                    return Ok(Arc::clone(ds));
                }
            }
            Mark::Visiting => {
                return Err(Error::config(format!("step graph contains a cycle at {}", node.name)));
            }
            Mark::Unvisited => {}
        }
        marks[id.0] = Mark::Visiting;

        let ds = match &node.kind {
            NodeKind::Datasource(ds) => Arc::clone(ds),
            NodeKind::Step(step) => {
                let mut inputs = Vec::with_capacity(node.inputs.len());
                for input in &node.inputs {
                    inputs.push(self.reduce_node(ctx, env, *input, memo, marks)?);
                }
                tracing::debug!(step = %node.name, inputs = inputs.len(), "reduce step");
                step.run(ctx, inputs, env)
                    .map_err(|e| e.context(&format!("step {}", node.name)))?
            }
        };

        marks[id.0] = Mark::Done;
        memo[id.0] = Some(Arc::clone(&ds));
        Ok(ds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowstep_core::attribute::Attribute;
    use rowstep_core::row;
    use rowstep_expr::ExprEngine;
    use rowstep_io::BufferDatasource;

    use crate::definition::{GroupStepDefinition, JoinStepDefinition};
    use crate::step::{GroupStep, JoinStep};

    fn env() -> RunEnv {
        RunEnv {
            evaluator: Arc::new(ExprEngine::default()),
            config: Default::default(),
        }
    }

    fn source(name: &str) -> Arc<dyn Datasource> {
        Arc::new(BufferDatasource::new(
            name,
            vec![row! { "id" => 1, "k" => "a" }, row! { "id" => 2, "k" => "b" }].into(),
        ))
    }

    fn group(name: &str, src: &str) -> Box<dyn Step> {
        Box::new(GroupStep::new(
            GroupStepDefinition::new(name, src)
                .with_keys(vec![Attribute::new("k")])
                .with_columns(vec![Attribute::new("n").with_expr("count()")]),
        ))
    }

    #[test]
    fn roots_replace_consumed_sources() {
        let steps = vec![group("g", "a")];
        let sources = vec![source("a"), source("b")];
        let graph = StepGraph::build(&steps, &sources).unwrap();
        assert_eq!(graph.len(), 3);

        let out = graph.reduce(&Context::background(), &env()).unwrap();
        let names: Vec<_> = out.iter().map(|d| d.name().to_string()).collect();
        assert_eq!(names, vec!["b", "g"]);
    }

    #[test]
    fn shared_inputs_are_reduced_once() {
        let steps: Vec<Box<dyn Step>> = vec![
            group("g", "a"),
            Box::new(JoinStep::new(JoinStepDefinition::new("j", ("a", "k"), ("g", "k")))),
        ];
        let sources = vec![source("a")];
        let graph = StepGraph::build(&steps, &sources).unwrap();
        let out = graph.reduce(&Context::background(), &env()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name(), "j");
    }

    #[test]
    fn unknown_sources_and_duplicates() {
        let steps = vec![group("g", "missing")];
        let err = StepGraph::build(&steps, &[source("a")]).err().unwrap();
        assert!(matches!(err, Error::Resource(_)), "{err}");

        let steps = vec![group("a", "a")];
        let err = StepGraph::build(&steps, &[source("a")]).err().unwrap();
        assert!(matches!(err, Error::Config(_)), "{err}");
    }

    #[test]
    fn cycles_are_config_errors() {
        let steps = vec![group("x", "y"), group("y", "x")];
        let graph = StepGraph::build(&steps, &[]).unwrap();
        assert!(graph.roots().is_empty());
        let err = graph.reduce(&Context::background(), &env()).err().unwrap();
        assert!(matches!(err, Error::Config(_)), "{err}");
        assert!(err.to_string().contains("cycle"), "{err}");
    }
}
