//! JSON lines writer
//!
//! Messages go out in the order the engine produced them; nothing is
//! reordered or batched beyond the underlying buffer.

use crate::engine::Message;
use crate::error::{Error, Result, ResultExt};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// One message per line
    #[default]
    Json,
    /// Human-readable, multi-line JSON
    Pretty,
}

/// Writes messages to any `Write` sink
#[derive(Debug)]
pub struct MessageWriter<W: Write> {
    inner: W,
    format: OutputFormat,
    written: usize,
}

impl MessageWriter<io::Stdout> {
    /// Write to standard output
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(io::stdout(), format)
    }
}

impl MessageWriter<BufWriter<File>> {
    /// Create (or truncate) a file and write to it
    pub fn create(path: impl AsRef<Path>, format: OutputFormat) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            Error::config(format!(
                "Failed to create output file '{}': {e}",
                path.display()
            ))
        })?;
        Ok(Self::new(BufWriter::new(file), format))
    }
}

impl<W: Write> MessageWriter<W> {
    /// Wrap a sink
    pub fn new(inner: W, format: OutputFormat) -> Self {
        Self {
            inner,
            format,
            written: 0,
        }
    }

    /// Write one sync message
    pub fn write(&mut self, message: &Message) -> Result<()> {
        self.write_json(message)
    }

    /// Write any serializable value as one output entry
    pub fn write_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let line = match self.format {
            OutputFormat::Json => serde_json::to_string(value)?,
            OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
        };
        writeln!(self.inner, "{line}")?;
        self.written += 1;
        Ok(())
    }

    /// Flush buffered output
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush().context("Failed to flush output")
    }

    /// Entries written so far
    pub fn written(&self) -> usize {
        self.written
    }

    /// Unwrap the sink
    pub fn into_inner(self) -> W {
        self.inner
    }
}
