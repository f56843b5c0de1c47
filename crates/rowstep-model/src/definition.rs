//! Wire shapes of pipeline steps.
//!
//! ```json
//! { "group": { "name": "totals", "source": "orders",
//!              "keys": [{ "ident": "customer" }],
//!              "columns": [{ "ident": "total", "expr": "sum(amount)" }] } }
//! ```

use serde::{Deserialize, Serialize};

use rowstep_core::attribute::AttributeSet;
use rowstep_core::error::{Error, Result};
use rowstep_io::LoadStepDefinition;
use rowstep_operators::{Aggregate, InternalFilter};

/// One pipeline step; exactly one field is populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load: Option<LoadStepDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<JoinStepDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupStepDefinition>,
}

/// Borrowed view of the populated step kind.
#[derive(Debug, Clone, Copy)]
pub enum StepKind<'a> {
    Load(&'a LoadStepDefinition),
    Join(&'a JoinStepDefinition),
    Group(&'a GroupStepDefinition),
}

impl StepDefinition {
    pub fn kind(&self) -> Result<StepKind<'_>> {
        match (&self.load, &self.join, &self.group) {
            (Some(l), None, None) => Ok(StepKind::Load(l)),
            (None, Some(j), None) => Ok(StepKind::Join(j)),
            (None, None, Some(g)) => Ok(StepKind::Group(g)),
            (None, None, None) => Err(Error::config(
                "malformed step definition: unsupported step kind",
            )),
            _ => Err(Error::config(
                "malformed step definition: more than one step kind",
            )),
        }
    }

    /// Name the step is exposed under.
    pub fn name(&self) -> Option<&str> {
        match self.kind().ok()? {
            StepKind::Load(l) => Some(&l.name),
            StepKind::Join(j) => Some(&j.name),
            StepKind::Group(g) => Some(&g.name),
        }
    }
}

impl From<LoadStepDefinition> for StepDefinition {
    fn from(def: LoadStepDefinition) -> Self {
        Self {
            load: Some(def),
            ..Default::default()
        }
    }
}

impl From<JoinStepDefinition> for StepDefinition {
    fn from(def: JoinStepDefinition) -> Self {
        Self {
            join: Some(def),
            ..Default::default()
        }
    }
}

impl From<GroupStepDefinition> for StepDefinition {
    fn from(def: GroupStepDefinition) -> Self {
        Self {
            group: Some(def),
            ..Default::default()
        }
    }
}

/// Left join of `local_source` with `foreign_source` on
/// `local_column = foreign_column`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinStepDefinition {
    pub name: String,
    pub local_source: String,
    pub local_column: String,
    pub foreign_source: String,
    pub foreign_column: String,
}

impl JoinStepDefinition {
    pub fn new(
        name: impl Into<String>,
        (local_source, local_column): (&str, &str),
        (foreign_source, foreign_column): (&str, &str),
    ) -> Self {
        Self {
            name: name.into(),
            local_source: local_source.to_string(),
            local_column: local_column.to_string(),
            foreign_source: foreign_source.to_string(),
            foreign_column: foreign_column.to_string(),
        }
    }
}

/// Group `source` by `keys`, computing `columns` per group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupStepDefinition {
    pub name: String,
    pub source: String,
    pub keys: AttributeSet,
    pub columns: AttributeSet,
    #[serde(default)]
    pub filter: InternalFilter,
}

impl GroupStepDefinition {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_keys(mut self, keys: impl Into<AttributeSet>) -> Self {
        self.keys = keys.into();
        self
    }

    pub fn with_columns(mut self, columns: impl Into<AttributeSet>) -> Self {
        self.columns = columns.into();
        self
    }

    pub fn with_filter(mut self, filter: InternalFilter) -> Self {
        self.filter = filter;
        self
    }

    /// The aggregate this step runs; source attributes are bound later from
    /// the input's description.
    pub fn aggregate(&self) -> Aggregate {
        Aggregate::new(self.name.clone())
            .with_group(self.keys.clone())
            .with_out_attributes(self.columns.clone())
            .with_filter(self.filter.clone())
    }
}
