//! The datasource read contract.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use rowstep_core::context::Context;
use rowstep_core::error::{Error, Result};
use rowstep_core::filter::Paging;
use rowstep_core::schema::FrameDescriptionSet;

use crate::buffer::{Buffer, InMemoryBuffer};
use crate::frame::{Frame, FrameDefinition};

type FrameLoader = Box<dyn FnMut(usize) -> Result<Vec<Frame>> + Send>;
type Closer = Box<dyn FnOnce() + Send>;

/// Result of `Datasource::load`: a lazy frame loader plus its closer.
///
/// The closer runs exactly once, when the guard is dropped, whichever way
/// the caller leaves the scope.
pub struct LoaderGuard {
    loader: FrameLoader,
    closer: Option<Closer>,
}

impl LoaderGuard {
    pub fn new(loader: impl FnMut(usize) -> Result<Vec<Frame>> + Send + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            closer: None,
        }
    }

    pub fn with_closer(mut self, closer: impl FnOnce() + Send + 'static) -> Self {
        self.closer = Some(Box::new(closer));
        self
    }

    /// Materialize one frame per requested definition; `limit` caps the rows
    /// per frame (`0` = no extra cap).
    pub fn frames(&mut self, limit: usize) -> Result<Vec<Frame>> {
        (self.loader)(limit)
    }
}

impl Drop for LoaderGuard {
    fn drop(&mut self) {
        if let Some(close) = self.closer.take() {
            close();
        }
    }
}

impl fmt::Debug for LoaderGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderGuard")
            .field("closed", &self.closer.is_none())
            .finish()
    }
}

/// Named provider of rows.
pub trait Datasource: Send + Sync {
    fn name(&self) -> &str;

    fn describe(&self) -> FrameDescriptionSet;

    fn load(&self, ctx: &Context, defs: &[FrameDefinition]) -> Result<LoaderGuard>;
}

/// Declarative load step: materialize `source` under the name `name`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadStepDefinition {
    pub name: String,
    pub source: String,
    /// Provider-specific options (e.g. `path` for CSV files).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub definition: BTreeMap<String, serde_json::Value>,
}

impl LoadStepDefinition {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            definition: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.definition.insert(key.into(), value.into());
        self
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.definition.get(key).and_then(|v| v.as_str())
    }
}

/// Builds datasources for load steps.
pub trait DatasourceProvider: Send + Sync {
    fn datasource(&self, ctx: &Context, def: &LoadStepDefinition) -> Result<Arc<dyn Datasource>>;
}

/// Read every row of `ds` into a fresh buffer through the load contract.
pub fn drain(ctx: &Context, ds: &dyn Datasource) -> Result<InMemoryBuffer> {
    let def = FrameDefinition::new(ds.name()).with_paging(Paging::with_limit(0));
    let mut guard = ds.load(ctx, std::slice::from_ref(&def))?;
    let frames = guard.frames(0)?;

    let mut buf = InMemoryBuffer::new();
    for frame in frames {
        for row in frame.rows {
            buf.add(ctx, row)?;
        }
    }
    tracing::trace!(source = ds.name(), rows = buf.len(), "drained datasource");
    Ok(buf)
}

/// Look up a datasource by name.
pub fn find<'a>(set: &'a [Arc<dyn Datasource>], name: &str) -> Option<&'a Arc<dyn Datasource>> {
    set.iter().find(|d| d.name() == name)
}

/// All frame definitions must target `name`; an empty source means "this one".
pub fn single_source(defs: &[FrameDefinition], name: &str) -> Result<()> {
    if defs.is_empty() {
        return Err(Error::config("no frame definitions provided"));
    }
    if let Some(d) = defs.iter().find(|d| !d.source.is_empty() && d.source != name) {
        return Err(Error::config(format!(
            "frame definition source mismatch: expected {name}, got {}",
            d.source
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn closer_runs_once_on_drop() {
        let closed = Arc::new(AtomicUsize::new(0));
        {
            let c = Arc::clone(&closed);
            let mut guard = LoaderGuard::new(|_| Ok(vec![])).with_closer(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
            assert!(guard.frames(10).unwrap().is_empty());
        }
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn closer_runs_on_error_paths() {
        let closed = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&closed);
        let run = || -> Result<Vec<Frame>> {
            let mut guard = LoaderGuard::new(|_| Err(Error::resource("gone")))
                .with_closer(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                });
            guard.frames(0)
        };
        assert!(run().is_err());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn load_step_options() {
        let def = LoadStepDefinition::new("users", "csv").with_option("path", "users.csv");
        assert_eq!(def.option_str("path"), Some("users.csv"));
        let json = serde_json::to_string(&def).unwrap();
        let back: LoadStepDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, def);
    }
}
