//! # Run Log Sinks
//!
//! Append-only CSV destinations for per-batch records. The sink is a
//! capability handed to the chain crate's run logger, so tests can swap the
//! file for memory and inspect exact rows.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Line-oriented, append-only destination.
pub trait LogSink: Send {
    /// True when nothing has been written to the destination yet.
    fn is_empty(&self) -> io::Result<bool>;

    /// Appends one line and makes it durable before returning.
    fn append_line(&mut self, line: &str) -> io::Result<()>;
}

impl LogSink for Box<dyn LogSink> {
    fn is_empty(&self) -> io::Result<bool> {
        (**self).is_empty()
    }

    fn append_line(&mut self, line: &str) -> io::Result<()> {
        (**self).append_line(line)
    }
}

/// File opened in append mode; never truncated.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: File,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileSink {
    fn is_empty(&self) -> io::Result<bool> {
        Ok(self.file.metadata()?.len() == 0)
    }

    fn append_line(&mut self, line: &str) -> io::Result<()> {
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.file.flush()?;
        self.file.sync_data()
    }
}

/// In-memory sink; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl LogSink for MemorySink {
    fn is_empty(&self) -> io::Result<bool> {
        self.lines
            .lock()
            .map(|l| l.is_empty())
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory sink poisoned"))
    }

    fn append_line(&mut self, line: &str) -> io::Result<()> {
        self.lines
            .lock()
            .map(|mut l| l.push(line.to_string()))
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory sink poisoned"))
    }
}

/// CSV writer over a sink with a fixed header.
pub struct CsvLog<S: LogSink> {
    sink: S,
    header: &'static [&'static str],
    header_checked: bool,
}

impl<S: LogSink> CsvLog<S> {
    pub fn new(sink: S, header: &'static [&'static str]) -> Self {
        Self {
            sink,
            header,
            header_checked: false,
        }
    }

    /// Writes one row; the header goes first only if the destination is empty.
    pub fn append_row(&mut self, fields: &[String]) -> io::Result<()> {
        if fields.len() != self.header.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "row has {} fields, header has {}",
                    fields.len(),
                    self.header.len()
                ),
            ));
        }
        if !self.header_checked {
            if self.sink.is_empty()? {
                self.sink.append_line(&self.header.join(","))?;
            }
            self.header_checked = true;
        }
        let line = fields
            .iter()
            .map(|f| escape_field(f))
            .collect::<Vec<_>>()
            .join(",");
        self.sink.append_line(&line)
    }
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\"").replace(['\n', '\r'], " "))
    } else {
        field.to_string()
    }
}
