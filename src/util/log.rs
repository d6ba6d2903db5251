//! The `config.log` diagnostic log.
//!
//! Every line is prefixed with an RFC 3339 timestamp, including each line
//! of multi-line messages and of captured child output. The log records each external
//! invocation, the output it produced, every synthetic test program and
//! every exit code; it is the first thing to read when a probe fails.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, SecondsFormat};

/// Default log file name.
pub const LOG_FILE: &str = "config.log";

enum Sink {
    File { file: File, path: PathBuf },
    Memory(Vec<u8>),
}

/// Append-only timestamped log.
pub struct ConfigLog {
    sink: Sink,
}

impl ConfigLog {
    /// Create (truncating) the log file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create log file: {}", path.display()))?;
        Ok(ConfigLog {
            sink: Sink::File {
                file,
                path: path.to_path_buf(),
            },
        })
    }

    /// Create a log kept in memory.
    pub fn memory() -> Self {
        ConfigLog {
            sink: Sink::Memory(Vec::new()),
        }
    }

    /// Path of the log file, if it is backed by one.
    pub fn path(&self) -> Option<&Path> {
        match &self.sink {
            Sink::File { path, .. } => Some(path),
            Sink::Memory(_) => None,
        }
    }

    /// Append a message, one timestamped line per line of `msg`.
    pub fn line(&mut self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        tracing::trace!("{}", msg);
        if msg.is_empty() {
            self.stamped("");
        }
        for line in msg.lines() {
            self.stamped(line);
        }
    }

    /// Append the captured output of a child process.
    pub fn raw(&mut self, bytes: &[u8]) {
        let text = String::from_utf8_lossy(bytes);
        for line in text.lines() {
            self.stamped(line);
        }
    }

    fn stamped(&mut self, line: &str) {
        let stamp = Local::now().to_rfc3339_opts(SecondsFormat::Micros, false);
        self.write_raw(format!("{} {}\n", stamp, line).as_bytes());
    }

    /// Contents of an in-memory log. Empty for file-backed logs.
    pub fn contents(&self) -> String {
        match &self.sink {
            Sink::Memory(buf) => String::from_utf8_lossy(buf).into_owned(),
            Sink::File { .. } => String::new(),
        }
    }

    /// Flush and close the log.
    pub fn close(mut self) -> io::Result<()> {
        match &mut self.sink {
            Sink::File { file, .. } => file.flush(),
            Sink::Memory(_) => Ok(()),
        }
    }

    fn write_raw(&mut self, bytes: &[u8]) {
        let result = match &mut self.sink {
            Sink::File { file, .. } => file.write_all(bytes).and_then(|_| file.flush()),
            Sink::Memory(buf) => {
                buf.extend_from_slice(bytes);
                Ok(())
            }
        };
        // A log write failure must not change the outcome of a probe.
        if let Err(e) = result {
            tracing::warn!("failed to write config log: {}", e);
        }
    }
}

impl std::fmt::Debug for ConfigLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.sink {
            Sink::File { path, .. } => f.debug_struct("ConfigLog").field("path", path).finish(),
            Sink::Memory(buf) => f
                .debug_struct("ConfigLog")
                .field("memory_bytes", &buf.len())
                .finish(),
        }
    }
}
