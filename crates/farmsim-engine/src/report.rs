//! Append-only tabular output sinks.
//!
//! Each run policy writes a fixed header once, then one row per batch,
//! replication, or lag. The sink is closed exactly once at finalize;
//! writing after close or closing twice is a usage-order bug.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::{EngineError, EngineResult};

pub trait ReportSink {
    fn write_header(&mut self, columns: &[&str]) -> EngineResult<()>;
    fn write_row(&mut self, fields: &[String]) -> EngineResult<()>;
    fn close(&mut self) -> EngineResult<()>;
}

/// CSV file sink.
pub struct CsvSink {
    path: String,
    writer: Option<BufWriter<File>>,
    rows: u64,
}

impl CsvSink {
    pub fn create(path: &Path) -> EngineResult<Self> {
        let file = File::create(path)?;
        Ok(Self {
            path: path.display().to_string(),
            writer: Some(BufWriter::new(file)),
            rows: 0,
        })
    }

    fn writer(&mut self) -> EngineResult<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| EngineError::InvalidState("write to a closed sink".into()))
    }
}

impl ReportSink for CsvSink {
    fn write_header(&mut self, columns: &[&str]) -> EngineResult<()> {
        let line = columns.join(",");
        writeln!(self.writer()?, "{line}")?;
        Ok(())
    }

    fn write_row(&mut self, fields: &[String]) -> EngineResult<()> {
        let line = fields.join(",");
        writeln!(self.writer()?, "{line}")?;
        self.rows += 1;
        Ok(())
    }

    fn close(&mut self) -> EngineResult<()> {
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| EngineError::InvalidState("sink closed twice".into()))?;
        writer.flush()?;
        info!(path = %self.path, rows = self.rows, "report written");
        Ok(())
    }
}

/// In-memory sink for tests and embedding.
#[derive(Default)]
pub struct MemorySink {
    pub header: Option<Vec<String>>,
    pub rows: Vec<Vec<String>>,
    closed: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl ReportSink for MemorySink {
    fn write_header(&mut self, columns: &[&str]) -> EngineResult<()> {
        if self.closed {
            return Err(EngineError::InvalidState("write to a closed sink".into()));
        }
        self.header = Some(columns.iter().map(|c| c.to_string()).collect());
        Ok(())
    }

    fn write_row(&mut self, fields: &[String]) -> EngineResult<()> {
        if self.closed {
            return Err(EngineError::InvalidState("write to a closed sink".into()));
        }
        self.rows.push(fields.to_vec());
        Ok(())
    }

    fn close(&mut self) -> EngineResult<()> {
        if self.closed {
            return Err(EngineError::InvalidState("sink closed twice".into()));
        }
        self.closed = true;
        Ok(())
    }
}

/// Shared-handle passthrough so a test (or embedder) can keep a handle
/// to a sink it hands to a policy by value.
impl<T: ReportSink> ReportSink for std::rc::Rc<std::cell::RefCell<T>> {
    fn write_header(&mut self, columns: &[&str]) -> EngineResult<()> {
        self.borrow_mut().write_header(columns)
    }

    fn write_row(&mut self, fields: &[String]) -> EngineResult<()> {
        self.borrow_mut().write_row(fields)
    }

    fn close(&mut self) -> EngineResult<()> {
        self.borrow_mut().close()
    }
}
