//! Instrumentation engine interface
//!
//! The engine owns the traced processes: it discovers images, patches entry
//! points and calls back into the tool. The tool side never drives a loop;
//! it only implements the callbacks below and registers them once through
//! [`Engine::run`].
//!
//! Descriptors handed to callbacks ([`Image`], [`Section`], [`Routine`])
//! are borrowed for the duration of the callback only. Anything a hook needs
//! later must be copied into owned storage such as [`HookArgs`].

use nix::unistd::Pid;
use std::sync::Arc;

/// Classification of an image section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// Executable code
    Exec,
    /// Initialized or zero-filled data
    Data,
    /// Anything else (debug info, symbol tables, notes)
    Other,
}

/// A routine (function) discovered inside a section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routine {
    name: String,
    address: u64,
    size: u64,
}

impl Routine {
    /// Create a routine at a runtime address
    pub fn new(name: impl Into<String>, address: u64, size: u64) -> Self {
        Self {
            name: name.into(),
            address,
            size,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runtime entry address (load bias applied)
    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// A section of a loaded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    name: String,
    kind: SectionKind,
    routines: Vec<Routine>,
}

impl Section {
    pub fn new(name: impl Into<String>, kind: SectionKind, routines: Vec<Routine>) -> Self {
        Self {
            name: name.into(),
            kind,
            routines,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SectionKind {
        self.kind
    }

    pub fn routines(&self) -> &[Routine] {
        &self.routines
    }
}

/// A code image (executable or shared library) loaded into a process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    name: String,
    load_bias: u64,
    sections: Vec<Section>,
}

impl Image {
    pub fn new(name: impl Into<String>, load_bias: u64, sections: Vec<Section>) -> Self {
        Self {
            name: name.into(),
            load_bias,
            sections,
        }
    }

    /// Image name (the path it was mapped from)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn load_bias(&self) -> u64 {
        self.load_bias
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }
}

/// Fixed arguments bound to an entry hook at registration time
///
/// Owned, reference-counted name storage: it lives as long as the
/// instrumentation that carries it, independent of the enumeration that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookArgs {
    pub image: Arc<str>,
    pub function: Arc<str>,
}

/// Engine services available to analysis code running inside a traced context
pub trait Client {
    /// Take the engine's client lock
    fn lock(&self) -> Box<dyn ClientGuard + '_>;
}

/// Queries that must run under the engine's client lock
pub trait ClientGuard {
    /// OS process id of the traced context that is executing
    fn pid(&self) -> Pid;
}

/// Analysis routine called at an instrumented routine's entry
///
/// Runs synchronously on whichever traced context reached the entry point.
pub trait EntryHook: Send + Sync {
    fn on_entry(&self, client: &dyn Client, args: &HookArgs);
}

/// Registration surface offered during an image-load callback
pub trait Instrumenter {
    /// Call `hook` with `args` before the first instruction of `routine`
    fn insert_entry_call(&mut self, routine: &Routine, hook: Arc<dyn EntryHook>, args: HookArgs);
}

/// How a child process came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    /// fork/vfork/clone without shared thread group
    Fork,
    /// The process replaced its image with execve
    Exec,
}

/// A new process instance the engine may follow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildProcess {
    pub parent: Pid,
    pub child: Pid,
    pub kind: ChildKind,
}

/// Callbacks bound to one instrumented process instance
pub trait ProcessTool {
    /// An image was loaded into the process
    fn image_load(&mut self, image: &Image, instrumenter: &mut dyn Instrumenter);

    /// The process terminated
    fn fini(&mut self, pid: Pid, exit_code: i32);

    /// The process image was replaced by exec; this instance is over
    fn replaced(&mut self, pid: Pid);
}

/// Process-independent side of a tool
pub trait Tool {
    type Process: ProcessTool;

    /// Start instrumenting a new process instance
    fn start_process(&self, pid: Pid) -> Self::Process;

    /// Decide whether a child process is instrumented too
    fn follow_child(&self, child: &ChildProcess) -> bool;
}

/// An instrumentation engine driving a tool until every traced process is gone
pub trait Engine {
    type Error;

    /// Register the tool's callbacks and run the target to completion
    ///
    /// Returns the exit code of the root traced process.
    fn run<T: Tool>(self, tool: &T) -> Result<i32, Self::Error>;
}
