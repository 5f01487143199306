//! Trace output and diagnostic log sinks
//!
//! Both sinks are append-only text files written one whole line at a time
//! under a lock, so concurrent producers may interleave lines but never
//! characters within a line.

use crate::engine::ChildKind;
use crate::error::TraceError;
use nix::unistd::Pid;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// One first-call record: `[PID:<pid>] [Image:<image>] [Called:<function>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    pub pid: Pid,
    pub image: Arc<str>,
    pub function: Arc<str>,
}

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[PID:{}] [Image:{}] [Called:{}]",
            self.pid, self.image, self.function
        )
    }
}

/// Lines written to the diagnostic log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic<'a> {
    /// An (image, section) pair visited by the walker
    Section { image: &'a str, section: &'a str },
    /// A routine accepted for instrumentation
    Function { image: &'a str, function: &'a str },
    /// A child process is being followed
    Follow {
        parent: Pid,
        child: Pid,
        kind: ChildKind,
    },
    /// A traced process exited
    Exited { pid: Pid, code: i32 },
    /// A traced process instance was replaced by exec
    Replaced { pid: Pid },
}

impl fmt::Display for Diagnostic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Section { image, section } => {
                write!(f, "[Image:{}] [Section:{}]", image, section)
            }
            Diagnostic::Function { image, function } => {
                write!(f, "[Image:{}] [Function:{}]", image, function)
            }
            Diagnostic::Follow {
                parent,
                child,
                kind,
            } => {
                let kind = match kind {
                    ChildKind::Fork => "fork",
                    ChildKind::Exec => "exec",
                };
                write!(f, "[PID:{}] [Follow:{} -> {}]", parent, kind, child)
            }
            Diagnostic::Exited { pid, code } => write!(f, "[PID:{}] [Exited:{}]", pid, code),
            Diagnostic::Replaced { pid } => write!(f, "[PID:{}] [Replaced:exec]", pid),
        }
    }
}

type BoxedWriter = BufWriter<Box<dyn Write + Send>>;

/// Append-only line sink, closed exactly once
pub struct LineSink {
    writer: Mutex<Option<BoxedWriter>>,
    autoflush: bool,
}

impl LineSink {
    /// Create (truncate) the file at `path`
    pub fn create(path: &Path) -> Result<Self, TraceError> {
        let file = File::create(path).map_err(|source| TraceError::OutputOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_writer(file))
    }

    /// Wrap an arbitrary writer
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        let boxed: Box<dyn Write + Send> = Box::new(writer);
        Self {
            writer: Mutex::new(Some(BufWriter::new(boxed))),
            autoflush: false,
        }
    }

    /// Flush after every line instead of only at close
    pub fn with_autoflush(mut self, autoflush: bool) -> Self {
        self.autoflush = autoflush;
        self
    }

    /// Append one line
    ///
    /// Write errors and writes after close are reported through `tracing`
    /// and otherwise dropped; callers run inside engine callbacks.
    pub fn write_line(&self, line: impl fmt::Display) {
        // Format outside the lock
        let text = format!("{}\n", line);

        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(writer) = guard.as_mut() else {
            tracing::debug!("dropping line written after close: {}", text.trim_end());
            return;
        };

        let result = writer.write_all(text.as_bytes()).and_then(|()| {
            if self.autoflush {
                writer.flush()
            } else {
                Ok(())
            }
        });
        if let Err(e) = result {
            tracing::warn!("failed to write output line: {}", e);
        }
    }

    /// Flush buffered lines
    pub fn flush(&self) -> io::Result<()> {
        match self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }

    /// Flush and close; later calls are no-ops
    pub fn close(&self) -> io::Result<()> {
        let taken = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match taken {
            Some(mut writer) => writer.flush(),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl fmt::Debug for LineSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineSink")
            .field("closed", &self.is_closed())
            .field("autoflush", &self.autoflush)
            .finish()
    }
}
