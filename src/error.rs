//! Error types for tracer startup and engine failures

use std::path::PathBuf;
use thiserror::Error;

/// Failures that stop a trace before or while it runs
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Failed to initialize instrumentation engine: {0}")]
    EngineInit(String),

    #[error("Could not open output file {}: {source}", path.display())]
    OutputOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid trace target: {0}")]
    Target(String),

    #[error("ptrace operation failed: {context}: {source}")]
    Ptrace {
        context: String,
        #[source]
        source: nix::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TraceError {
    /// Wrap a nix error with a description of the failed operation
    pub fn ptrace(context: impl Into<String>, source: nix::Error) -> Self {
        TraceError::Ptrace {
            context: context.into(),
            source,
        }
    }
}
