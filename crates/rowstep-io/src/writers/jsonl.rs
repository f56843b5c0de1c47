//! Streaming NDJSON writer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rowstep_core::error::Result;
use rowstep_core::types::Row;

use crate::frame::Frame;

pub struct JsonlWriter<W: Write> {
    writer: BufWriter<W>,
    rows: usize,
}

impl JsonlWriter<File> {
    pub fn to_path(path: impl AsRef<Path>) -> Result<Self> {
        let f = File::create(path)?;
        Ok(Self::to_writer(f))
    }
}

impl<W: Write> JsonlWriter<W> {
    pub fn to_writer(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            rows: 0,
        }
    }

    /// Write a frame as one JSON object per row, restricted to the frame's
    /// columns when it declares any.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        for row in &frame.rows {
            if frame.columns.is_empty() {
                self.write_row(row)?;
            } else {
                let projected: Row = frame
                    .columns
                    .iter()
                    .filter_map(|c| row.get(&c.name).map(|v| (c.name.clone(), v.clone())))
                    .collect();
                self.write_row(&projected)?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn write_row(&mut self, row: &Row) -> Result<()> {
        let line = serde_json::to_string(row)?;
        writeln!(self.writer, "{}", line)?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        self.writer
            .into_inner()
            .map_err(|e| rowstep_core::error::Error::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowstep_core::row;
    use rowstep_core::schema::{DataType, FrameColumn};

    #[test]
    fn writes_projected_lines() {
        let frame = Frame {
            name: "f".into(),
            source: "users".into(),
            columns: vec![FrameColumn::new("name", DataType::Utf8)],
            rows: vec![
                row! { "name" => "Ana", "id" => 1 },
                row! { "name" => "John", "id" => 2 },
            ],
            ..Default::default()
        };
        let mut w = JsonlWriter::to_writer(Vec::new());
        w.write_frame(&frame).unwrap();
        assert_eq!(w.rows_written(), 2);
        let out = String::from_utf8(w.into_inner().unwrap()).unwrap();
        assert_eq!(out, "{\"name\":\"Ana\"}\n{\"name\":\"John\"}\n");
    }
}
