//! Tracer lifecycle
//!
//! Opens the trace output and diagnostic log before the engine starts,
//! hands the engine one fresh set of callbacks per traced process instance,
//! and closes both sinks once the engine returns.

use crate::call_logger::CallLogger;
use crate::engine::{ChildProcess, Engine, Image, Instrumenter, ProcessTool, Tool};
use crate::error::TraceError;
use crate::ledger::DedupLedger;
use crate::output::{Diagnostic, LineSink};
use crate::walker::ImageWalker;
use anyhow::{Context, Result};
use nix::unistd::Pid;
use std::path::PathBuf;
use std::sync::Arc;

/// Default trace output path
pub const DEFAULT_OUTPUT: &str = "functrace.out";

/// Default diagnostic log path
pub const DEFAULT_LOG: &str = "functrace.log";

/// Configuration for a tracing session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracerConfig {
    /// Trace output destination
    pub output: PathBuf,
    /// Diagnostic log destination
    pub log: PathBuf,
    /// Instrument forked and exec'd children
    pub follow_children: bool,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from(DEFAULT_OUTPUT),
            log: PathBuf::from(DEFAULT_LOG),
            follow_children: true,
        }
    }
}

/// The first-call tracer tool
#[derive(Debug)]
pub struct FuncTracer {
    trace: Arc<LineSink>,
    diagnostics: Arc<LineSink>,
    follow_children: bool,
}

impl FuncTracer {
    /// Open both sinks; fails if either destination cannot be created
    pub fn open(config: &TracerConfig) -> Result<Self, TraceError> {
        let trace = LineSink::create(&config.output)?.with_autoflush(true);
        let diagnostics = LineSink::create(&config.log)?;
        Ok(Self::with_sinks(
            Arc::new(trace),
            Arc::new(diagnostics),
            config.follow_children,
        ))
    }

    /// Build a tracer over already-open sinks
    pub fn with_sinks(
        trace: Arc<LineSink>,
        diagnostics: Arc<LineSink>,
        follow_children: bool,
    ) -> Self {
        Self {
            trace,
            diagnostics,
            follow_children,
        }
    }

    /// Flush and close both sinks
    pub fn finish(&self) -> std::io::Result<()> {
        let trace = self.trace.close();
        let diagnostics = self.diagnostics.close();
        trace.and(diagnostics)
    }
}

impl Tool for FuncTracer {
    type Process = ProcessInstrumentation;

    fn start_process(&self, pid: Pid) -> ProcessInstrumentation {
        tracing::debug!("starting fresh instrumentation for pid {}", pid);
        let logger = Arc::new(CallLogger::new(
            Arc::new(DedupLedger::new()),
            Arc::clone(&self.trace),
        ));
        ProcessInstrumentation {
            walker: ImageWalker::new(logger.clone(), Arc::clone(&self.diagnostics)),
            logger,
            diagnostics: Arc::clone(&self.diagnostics),
            trace: Arc::clone(&self.trace),
        }
    }

    fn follow_child(&self, child: &ChildProcess) -> bool {
        if self.follow_children {
            self.diagnostics.write_line(Diagnostic::Follow {
                parent: child.parent,
                child: child.child,
                kind: child.kind,
            });
        }
        self.follow_children
    }
}

/// Callbacks for one traced process instance, owning its ledger
pub struct ProcessInstrumentation {
    walker: ImageWalker,
    logger: Arc<CallLogger>,
    diagnostics: Arc<LineSink>,
    trace: Arc<LineSink>,
}

impl ProcessInstrumentation {
    /// Functions logged so far by this process
    pub fn logged_functions(&self) -> usize {
        self.logger.ledger().len()
    }
}

impl ProcessTool for ProcessInstrumentation {
    fn image_load(&mut self, image: &Image, instrumenter: &mut dyn Instrumenter) {
        self.walker.walk(image, instrumenter);
    }

    fn fini(&mut self, pid: Pid, exit_code: i32) {
        tracing::debug!(
            "pid {} finished with code {} after {} first calls",
            pid,
            exit_code,
            self.logged_functions()
        );
        self.diagnostics
            .write_line(Diagnostic::Exited { pid, code: exit_code });
        if let Err(e) = self.trace.flush() {
            tracing::warn!("failed to flush trace output: {}", e);
        }
    }

    fn replaced(&mut self, pid: Pid) {
        tracing::debug!(
            "pid {} replaced by exec after {} first calls",
            pid,
            self.logged_functions()
        );
        self.diagnostics.write_line(Diagnostic::Replaced { pid });
    }
}

/// Trace with `engine` until every traced process is gone
///
/// Output is opened before the engine starts and closed exactly once after
/// it returns, whether or not the engine succeeded.
pub fn run<E>(engine: E, config: &TracerConfig) -> Result<i32>
where
    E: Engine,
    E::Error: std::error::Error + Send + Sync + 'static,
{
    let tracer = FuncTracer::open(config)?;

    let outcome = engine.run(&tracer);
    let closed = tracer.finish();

    let exit_code = outcome.context("Tracing failed")?;
    closed.with_context(|| format!("Failed to finalize {}", config.output.display()))?;
    Ok(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ChildKind;

    #[test]
    fn test_default_config() {
        let config = TracerConfig::default();
        assert_eq!(config.output, PathBuf::from("functrace.out"));
        assert_eq!(config.log, PathBuf::from("functrace.log"));
        assert!(config.follow_children);
    }

    #[test]
    fn test_each_process_gets_its_own_ledger() {
        let sink = || Arc::new(LineSink::from_writer(std::io::sink()));
        let tracer = FuncTracer::with_sinks(sink(), sink(), true);

        let parent = tracer.start_process(Pid::from_raw(100));
        let child = tracer.start_process(Pid::from_raw(101));
        assert!(!Arc::ptr_eq(&parent.logger, &child.logger));
        assert_eq!(parent.logged_functions(), 0);
        assert_eq!(child.logged_functions(), 0);
    }

    #[test]
    fn test_follow_child_respects_config() {
        let sink = || Arc::new(LineSink::from_writer(std::io::sink()));
        let child = ChildProcess {
            parent: Pid::from_raw(1),
            child: Pid::from_raw(2),
            kind: ChildKind::Fork,
        };

        assert!(FuncTracer::with_sinks(sink(), sink(), true).follow_child(&child));
        assert!(!FuncTracer::with_sinks(sink(), sink(), false).follow_child(&child));
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_instance_end_is_logged() {
        let log = SharedBuffer::default();
        let diagnostics = Arc::new(LineSink::from_writer(log.clone()));
        let trace = Arc::new(LineSink::from_writer(std::io::sink()));
        let tracer = FuncTracer::with_sinks(trace, Arc::clone(&diagnostics), true);

        let mut before_exec = tracer.start_process(Pid::from_raw(7));
        before_exec.replaced(Pid::from_raw(7));
        let mut after_exec = tracer.start_process(Pid::from_raw(7));
        after_exec.fini(Pid::from_raw(7), 1);
        diagnostics.close().unwrap();

        let text = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "[PID:7] [Replaced:exec]\n[PID:7] [Exited:1]\n");
    }

    #[test]
    fn test_finish_closes_sinks() {
        let trace = Arc::new(LineSink::from_writer(std::io::sink()));
        let diagnostics = Arc::new(LineSink::from_writer(std::io::sink()));
        let tracer = FuncTracer::with_sinks(Arc::clone(&trace), Arc::clone(&diagnostics), true);

        tracer.finish().unwrap();
        assert!(trace.is_closed());
        assert!(diagnostics.is_closed());
    }
}
