//! CSV-backed datasource provider.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use rowstep_core::context::Context;
use rowstep_core::error::{Error, Result};
use rowstep_core::schema::{DataType, FrameColumn, FrameDescription};
use rowstep_core::types::{Row, Scalar};

use crate::datasource::{Datasource, DatasourceProvider, LoadStepDefinition};
use crate::memory::{infer_columns, BufferDatasource};

/// Reads the CSV file named by the load step's `path` option (relative paths
/// resolve against `root`). The first record is the header.
#[derive(Debug, Clone, Default)]
pub struct CsvProvider {
    root: Option<PathBuf>,
    path: Option<PathBuf>,
}

impl CsvProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative `path` options against `root`.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Read this file regardless of the load step's options.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    fn resolve(&self, def: &LoadStepDefinition) -> Result<PathBuf> {
        let p = match (&self.path, def.option_str("path")) {
            (Some(p), _) => p.clone(),
            (None, Some(p)) => PathBuf::from(p),
            (None, None) => {
                return Err(Error::config(format!(
                    "load step {}: csv source requires a path",
                    def.name
                )))
            }
        };
        Ok(match &self.root {
            Some(root) if p.is_relative() => root.join(p),
            _ => p,
        })
    }
}

impl DatasourceProvider for CsvProvider {
    fn datasource(&self, ctx: &Context, def: &LoadStepDefinition) -> Result<Arc<dyn Datasource>> {
        ctx.check()?;
        let path = self.resolve(def)?;
        let f = File::open(&path)
            .map_err(|e| Error::resource(format!("open {}: {e}", path.display())))?;
        let (headers, rows) = read_table(f)?;
        tracing::debug!(step = %def.name, path = %path.display(), rows = rows.len(), "read csv");

        // header order, typed from the data
        let inferred = infer_columns(&rows);
        let columns = headers
            .into_iter()
            .map(|h| {
                inferred
                    .iter()
                    .find(|c| c.name == h)
                    .cloned()
                    .unwrap_or_else(|| FrameColumn::new(h, DataType::Any))
            })
            .collect();
        let ds = BufferDatasource::new(def.name.clone(), rows.into())
            .with_description(FrameDescription::new(def.name.clone(), columns));
        Ok(Arc::new(ds))
    }
}

/// Parse CSV records into rows, inferring a scalar per cell. Empty cells are
/// left out of the row.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<Row>> {
    read_table(reader).map(|(_, rows)| rows)
}

fn read_table<R: Read>(reader: R) -> Result<(Vec<String>, Vec<Row>)> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| Error::Codec(format!("csv header: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for rec in rdr.records() {
        let rec = rec.map_err(|e| Error::Codec(format!("csv record: {e}")))?;
        let mut row = Row::new();
        for (name, cell) in headers.iter().zip(rec.iter()) {
            if let Some(v) = infer_scalar(cell) {
                row.set(name.clone(), v);
            }
        }
        rows.push(row);
    }
    Ok((headers, rows))
}

fn infer_scalar(cell: &str) -> Option<Scalar> {
    if cell.is_empty() {
        return None;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Some(Scalar::I64(i));
    }
    if let Ok(f) = cell.parse::<f64>() {
        if f.is_finite() {
            return Some(Scalar::F64(f));
        }
    }
    match cell.to_ascii_lowercase().as_str() {
        "true" => return Some(Scalar::Bool(true)),
        "false" => return Some(Scalar::Bool(false)),
        _ => {}
    }
    let s = Scalar::Str(cell.to_string());
    Some(s.as_timestamp().map(Scalar::Timestamp).unwrap_or(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    const USERS: &str = "id,name,score,active,joined\n\
                         1,Ana,2.5,true,2022-10-20T09:44:49Z\n\
                         2,John,,false,\n";

    #[test]
    fn infers_cell_types() {
        let rows = read_rows(USERS.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value("id"), Scalar::I64(1));
        assert_eq!(rows[0].value("score"), Scalar::F64(2.5));
        assert_eq!(rows[0].value("active"), Scalar::Bool(true));
        assert_eq!(rows[0].value("joined").data_type(), DataType::Timestamp);
        assert!(!rows[1].contains("score"));
        assert!(!rows[1].contains("joined"));
    }

    #[test]
    fn path_is_required() {
        let ctx = Context::background();
        let def = LoadStepDefinition::new("users", "csv");
        assert!(matches!(
            CsvProvider::new().datasource(&ctx, &def),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn fixed_path_keeps_header_order() {
        let path = std::env::temp_dir().join(format!("rowstep-csv-{}.csv", std::process::id()));
        std::fs::write(&path, USERS).unwrap();

        let ctx = Context::background();
        let def = LoadStepDefinition::new("users", "csv").with_option("path", "ignored.csv");
        let ds = CsvProvider::new().with_path(&path).datasource(&ctx, &def).unwrap();
        let d = ds.describe();
        let names: Vec<_> = d[0].columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "score", "active", "joined"]);
        assert_eq!(d[0].columns[2].data_type, DataType::Float64);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_a_resource_error() {
        let ctx = Context::background();
        let def = LoadStepDefinition::new("users", "csv").with_option("path", "nope.csv");
        let p = CsvProvider::new().with_root("/definitely/not/here");
        assert!(matches!(p.datasource(&ctx, &def), Err(Error::Resource(_))));
    }
}
