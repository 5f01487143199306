//! ptrace-based instrumentation engine
//!
//! Drives traced processes from a single tracer thread:
//! - images are discovered from `/proc/<pid>/maps` at start, after exec,
//!   and after every successful mmap/mprotect/munmap
//! - entry hooks are `int3` breakpoints, stepped over after the hooks run
//! - forks, clones and execs are followed through ptrace options; every new
//!   process instance gets its own [`ProcessTool`]
//!
//! Linux/x86_64 only.

pub mod breakpoints;
pub mod elf;
pub mod maps;

use crate::engine::{
    ChildKind, ChildProcess, Client, ClientGuard, Engine, EntryHook, HookArgs, Image,
    Instrumenter, ProcessTool, Routine, Tool,
};
use crate::error::TraceError;
use breakpoints::Breakpoints;
use nix::errno::Errno;
use nix::sys::ptrace;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use maps::MapEntry;
use std::collections::{BTreeMap, HashMap};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What to trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Launch a command and trace it from its first instruction
    Command(Vec<String>),
    /// Attach to every thread of a running process
    Attach(Pid),
}

impl Target {
    /// Resolve the mutually exclusive `-p PID` / `-- COMMAND` arguments
    pub fn from_args(pid: Option<i32>, command: Option<Vec<String>>) -> Result<Self, TraceError> {
        match (pid, command) {
            (Some(pid), None) => Ok(Target::Attach(Pid::from_raw(pid))),
            (None, Some(command)) if command.is_empty() => {
                Err(TraceError::Target("Command array is empty".to_string()))
            }
            (None, Some(command)) => Ok(Target::Command(command)),
            (Some(_), Some(_)) => Err(TraceError::Target(
                "Cannot specify both -p PID and command. Choose one.".to_string(),
            )),
            (None, None) => Err(TraceError::Target(
                "Must specify either -p PID or command. Usage: functrace -p PID or functrace -- COMMAND [ARGS...]"
                    .to_string(),
            )),
        }
    }
}

/// The ptrace engine
#[derive(Debug)]
pub struct PtraceEngine {
    target: Target,
}

impl PtraceEngine {
    pub fn new(target: Target) -> Self {
        Self { target }
    }
}

impl Engine for PtraceEngine {
    type Error = TraceError;

    fn run<T: Tool>(self, tool: &T) -> Result<i32, TraceError> {
        install_interrupt_handler()?;

        let (root, tids, launched) = match &self.target {
            Target::Command(command) => {
                let child = launch(command)?;
                (child, vec![child], true)
            }
            Target::Attach(pid) => (*pid, attach(*pid)?, false),
        };

        let mut session = Session::new(tool, root);
        session.start(&tids, launched)?;
        session.run()
    }
}

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_interrupt(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// SIGINT/SIGTERM request a detach instead of killing the tracer
///
/// No SA_RESTART, so a blocked waitpid returns EINTR.
fn install_interrupt_handler() -> Result<(), TraceError> {
    let action = SigAction::new(
        SigHandler::Handler(on_interrupt),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for sig in [Signal::SIGINT, Signal::SIGTERM] {
        unsafe { signal::sigaction(sig, &action) }.map_err(|e| {
            TraceError::EngineInit(format!("Failed to install {} handler: {}", sig, e))
        })?;
    }
    Ok(())
}

fn trace_options(launched: bool) -> ptrace::Options {
    let mut options = ptrace::Options::PTRACE_O_TRACESYSGOOD
        | ptrace::Options::PTRACE_O_TRACEFORK
        | ptrace::Options::PTRACE_O_TRACEVFORK
        | ptrace::Options::PTRACE_O_TRACECLONE
        | ptrace::Options::PTRACE_O_TRACEVFORKDONE
        | ptrace::Options::PTRACE_O_TRACEEXEC;
    if launched {
        options |= ptrace::Options::PTRACE_O_EXITKILL;
    }
    options
}

/// Fork and exec `command` under PTRACE_TRACEME, stopped after exec
fn launch(command: &[String]) -> Result<Pid, TraceError> {
    let Some((program, args)) = command.split_first() else {
        return Err(TraceError::Target("Command array is empty".to_string()));
    };

    match unsafe { fork() }.map_err(|e| TraceError::ptrace("fork", e))? {
        ForkResult::Parent { child } => {
            // Stop delivered by exec under PTRACE_TRACEME
            match waitpid(child, None).map_err(|e| TraceError::ptrace("wait for child", e))? {
                WaitStatus::Stopped(_, Signal::SIGTRAP) => {}
                WaitStatus::Exited(_, code) => {
                    return Err(TraceError::EngineInit(format!(
                        "{} exited with code {} before tracing started",
                        program, code
                    )));
                }
                other => {
                    return Err(TraceError::EngineInit(format!(
                        "Unexpected first stop of {}: {:?}",
                        program, other
                    )));
                }
            }
            ptrace::setoptions(child, trace_options(true))
                .map_err(|e| TraceError::ptrace("set ptrace options", e))?;
            tracing::info!("launched {} as {}", program, child);
            Ok(child)
        }
        ForkResult::Child => {
            // Child: allow tracing and exec target program
            if let Err(e) = ptrace::traceme() {
                eprintln!("Failed to PTRACE_TRACEME: {}", e);
                std::process::exit(1);
            }

            let err = Command::new(program).args(args).exec();

            // If we get here, exec failed
            eprintln!("Failed to exec {}: {}", program, err);
            std::process::exit(1);
        }
    }
}

/// Attach to every thread of `pid`, leaving each in a stop
fn attach(pid: Pid) -> Result<Vec<Pid>, TraceError> {
    let tids = maps::list_tasks(pid)
        .map_err(|e| TraceError::EngineInit(format!("{:#}", e)))?;

    for &tid in &tids {
        ptrace::attach(tid).map_err(|e| TraceError::ptrace(format!("attach to {}", tid), e))?;
        waitpid(tid, Some(WaitPidFlag::__WALL))
            .map_err(|e| TraceError::ptrace(format!("wait for {} to stop", tid), e))?;
        ptrace::setoptions(tid, trace_options(false))
            .map_err(|e| TraceError::ptrace("set ptrace options", e))?;
    }

    eprintln!("[functrace: Attached to process {}]", pid);
    Ok(tids)
}

/// Client handed to hooks; identity queries take the engine's client lock
struct TaskClient<'a> {
    lock: &'a Mutex<()>,
    tgid: Pid,
}

struct LockedClient<'a> {
    _guard: MutexGuard<'a, ()>,
    tgid: Pid,
}

impl ClientGuard for LockedClient<'_> {
    fn pid(&self) -> Pid {
        self.tgid
    }
}

impl Client for TaskClient<'_> {
    fn lock(&self) -> Box<dyn ClientGuard + '_> {
        Box::new(LockedClient {
            _guard: self.lock.lock().unwrap_or_else(PoisonError::into_inner),
            tgid: self.tgid,
        })
    }
}

/// Registration surface bound to one process's breakpoint table
struct BreakpointInstrumenter<'a> {
    tid: Pid,
    breakpoints: &'a mut Breakpoints,
    ranges: &'a [(u64, u64)],
    inserted: usize,
}

impl Instrumenter for BreakpointInstrumenter<'_> {
    fn insert_entry_call(&mut self, routine: &Routine, hook: Arc<dyn EntryHook>, args: HookArgs) {
        let addr = routine.address();
        if !self
            .ranges
            .iter()
            .any(|&(start, end)| start <= addr && addr < end)
        {
            tracing::trace!("{} at {:#x} is not in executable memory", routine.name(), addr);
            return;
        }

        tracing::trace!(
            "hooking {} at {:#x} ({} bytes)",
            routine.name(),
            addr,
            routine.size()
        );
        match self.breakpoints.insert(self.tid, addr, hook, args) {
            Ok(()) => self.inserted += 1,
            Err(e) => tracing::warn!("cannot instrument {}: {:#}", routine.name(), e),
        }
    }
}

/// An image mapped into a traced process
#[derive(Clone)]
struct LoadedImage {
    path: PathBuf,
    ranges: Vec<(u64, u64)>,
    /// None when the file could not be parsed
    image: Option<Image>,
}

fn ranges_of(mappings: &[MapEntry]) -> Vec<(u64, u64)> {
    mappings.iter().map(|m| (m.start, m.end)).collect()
}

/// Run the tool's image-load callback against a breakpoint table
fn announce_image<P: ProcessTool>(
    tool: &mut P,
    breakpoints: &mut Breakpoints,
    tid: Pid,
    image: &Image,
    ranges: &[(u64, u64)],
) {
    let mut instrumenter = BreakpointInstrumenter {
        tid,
        breakpoints,
        ranges,
        inserted: 0,
    };
    tool.image_load(image, &mut instrumenter);
    tracing::debug!(
        "{}: {} entry hooks in {} (bias {:#x}, {} sites in process)",
        tid,
        instrumenter.inserted,
        image.name(),
        image.load_bias(),
        instrumenter.breakpoints.len()
    );
}

/// One instrumented process instance
struct TracedProcess<P> {
    tool: P,
    images: Vec<LoadedImage>,
    breakpoints: Breakpoints,
}

impl<P: ProcessTool> TracedProcess<P> {
    fn new(tool: P) -> Self {
        Self {
            tool,
            images: Vec::new(),
            breakpoints: Breakpoints::new(),
        }
    }

    /// A forked copy of `parent`, with hooks rebound to `tool`
    fn fork_of(parent: &TracedProcess<P>, tool: P, child_tid: Pid) -> Self {
        let mut child = Self {
            tool,
            images: parent.images.clone(),
            breakpoints: parent.breakpoints.inherit(child_tid),
        };
        for loaded in &child.images {
            if let Some(image) = &loaded.image {
                announce_image(
                    &mut child.tool,
                    &mut child.breakpoints,
                    child_tid,
                    image,
                    &loaded.ranges,
                );
            }
        }
        child
    }

    /// Reconcile known images with the current executable mappings
    fn sync_images(&mut self, tid: Pid, exec_maps: &BTreeMap<PathBuf, Vec<MapEntry>>) {
        let breakpoints = &mut self.breakpoints;
        self.images.retain_mut(|loaded| match exec_maps.get(&loaded.path) {
            Some(mappings) => {
                loaded.ranges = ranges_of(mappings);
                true
            }
            None => {
                tracing::debug!("{}: {} unmapped", tid, loaded.path.display());
                for &(start, end) in &loaded.ranges {
                    breakpoints.forget_range(tid, start, end);
                }
                false
            }
        });

        for (path, mappings) in exec_maps {
            if self.images.iter().any(|loaded| &loaded.path == path) {
                continue;
            }

            let image = match elf::load_image(path, &mappings[0]) {
                Ok(image) => Some(image),
                Err(e) => {
                    tracing::warn!("skipping image {}: {:#}", path.display(), e);
                    None
                }
            };
            let loaded = LoadedImage {
                path: path.clone(),
                ranges: ranges_of(mappings),
                image,
            };
            if let Some(image) = &loaded.image {
                announce_image(
                    &mut self.tool,
                    &mut self.breakpoints,
                    tid,
                    image,
                    &loaded.ranges,
                );
            }
            self.images.push(loaded);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Task {
    tgid: Pid,
    /// Site being stepped over
    stepping: Option<u64>,
    /// Detach requested with a SIGSTOP still to arrive
    stop_sent: bool,
}

impl Task {
    fn new(tgid: Pid) -> Self {
        Self {
            tgid,
            stepping: None,
            stop_sent: false,
        }
    }
}

/// Tracer state for one run
struct Session<'t, T: Tool> {
    tool: &'t T,
    root: Pid,
    root_exit: Option<i32>,
    processes: HashMap<Pid, TracedProcess<T::Process>>,
    tasks: HashMap<Pid, Task>,
    client_lock: Mutex<()>,
    detaching: bool,
}

impl<'t, T: Tool> Session<'t, T> {
    fn new(tool: &'t T, root: Pid) -> Self {
        Self {
            tool,
            root,
            root_exit: None,
            processes: HashMap::new(),
            tasks: HashMap::new(),
            client_lock: Mutex::new(()),
            detaching: false,
        }
    }

    /// Instrument the root process and let its stopped threads run
    fn start(&mut self, tids: &[Pid], launched: bool) -> Result<(), TraceError> {
        let Some(&first) = tids.first() else {
            return Err(TraceError::EngineInit(format!(
                "process {} has no threads",
                self.root
            )));
        };

        for &tid in tids {
            self.tasks.insert(tid, Task::new(self.root));
        }
        self.processes.insert(
            self.root,
            TracedProcess::new(self.tool.start_process(self.root)),
        );
        self.refresh_images(first, self.root);

        tracing::debug!(
            "tracing {} ({} threads, {})",
            self.root,
            tids.len(),
            if launched { "launched" } else { "attached" }
        );
        for &tid in tids {
            self.resume(tid, None);
        }
        Ok(())
    }

    /// Event loop: runs until no tracee is left
    fn run(mut self) -> Result<i32, TraceError> {
        loop {
            if INTERRUPTED.load(Ordering::SeqCst) && !self.detaching {
                self.begin_detach();
            }
            if self.detaching && self.tasks.is_empty() {
                break;
            }

            let status = match waitpid(None, Some(WaitPidFlag::__WALL)) {
                Ok(status) => status,
                Err(Errno::ECHILD) => break,
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(TraceError::ptrace("waitpid", e)),
            };

            if self.detaching {
                self.handle_detach_stop(status);
            } else {
                self.handle(status);
            }
        }

        if self.detaching {
            eprintln!("[functrace: Detached]");
        }
        Ok(self.root_exit.unwrap_or(0))
    }

    fn handle(&mut self, status: WaitStatus) {
        match status {
            WaitStatus::Exited(tid, code) => self.task_gone(tid, code),
            WaitStatus::Signaled(tid, sig, _) => self.task_gone(tid, 128 + sig as i32),
            WaitStatus::PtraceSyscall(tid) => {
                if !self.ensure_task(tid) {
                    return;
                }
                self.on_syscall_stop(tid);
                self.resume(tid, None);
            }
            WaitStatus::PtraceEvent(tid, _, event) => {
                if !self.ensure_task(tid) {
                    return;
                }
                if event == ptrace::Event::PTRACE_EVENT_EXEC as i32 && !self.on_exec(tid) {
                    return;
                }
                if event == ptrace::Event::PTRACE_EVENT_VFORK_DONE as i32 {
                    self.on_vfork_done(tid);
                }
                // Fork/clone children announce themselves with their own first stop
                self.resume(tid, None);
            }
            WaitStatus::Stopped(tid, sig) => {
                if !self.tasks.contains_key(&tid) {
                    if !self.adopt(tid) {
                        return;
                    }
                    if sig == Signal::SIGSTOP {
                        // Initial stop of an auto-attached task
                        self.resume(tid, None);
                        return;
                    }
                }

                if sig == Signal::SIGTRAP && self.on_trap(tid) {
                    return;
                }

                if self.tasks.get(&tid).is_some_and(|t| t.stepping.is_some()) {
                    // Signal arrived mid-step; keep stepping with it
                    if let Err(e) = ptrace::step(tid, Some(sig)) {
                        tracing::debug!("failed to step {}: {}", tid, e);
                    }
                    return;
                }
                self.resume(tid, Some(sig));
            }
            _ => {}
        }
    }

    fn resume(&self, tid: Pid, sig: Option<Signal>) {
        if let Err(e) = ptrace::syscall(tid, sig) {
            // ESRCH: the task died under us
            tracing::debug!("failed to resume {}: {}", tid, e);
        }
    }

    fn ensure_task(&mut self, tid: Pid) -> bool {
        self.tasks.contains_key(&tid) || self.adopt(tid)
    }

    /// Classify a task seen for the first time; false when it was released
    fn adopt(&mut self, tid: Pid) -> bool {
        let status = match maps::read_status(tid) {
            Ok(status) => status,
            Err(e) => {
                tracing::debug!("cannot classify {}: {:#}", tid, e);
                return false;
            }
        };

        if self.processes.contains_key(&status.tgid) {
            tracing::debug!("new thread {} in {}", tid, status.tgid);
            self.tasks.insert(tid, Task::new(status.tgid));
            return true;
        }

        let child = ChildProcess {
            parent: status.ppid,
            child: status.tgid,
            kind: ChildKind::Fork,
        };
        let Some(parent) = self.processes.get(&status.ppid) else {
            tracing::debug!("releasing {}: parent {} is not traced", tid, status.ppid);
            self.release(tid);
            return false;
        };

        if !self.tool.follow_child(&child) {
            parent.breakpoints.restore_into(tid);
            self.release(tid);
            return false;
        }

        tracing::debug!("following fork {} -> {}", status.ppid, status.tgid);
        let process = TracedProcess::fork_of(parent, self.tool.start_process(status.tgid), tid);
        self.processes.insert(status.tgid, process);
        self.tasks.insert(tid, Task::new(status.tgid));
        true
    }

    fn release(&self, tid: Pid) {
        if let Err(e) = ptrace::detach(tid, None) {
            tracing::debug!("failed to detach {}: {}", tid, e);
        }
    }

    fn task_gone(&mut self, tid: Pid, code: i32) {
        let Some(task) = self.tasks.remove(&tid) else {
            return;
        };
        if tid == self.root {
            self.root_exit = Some(code);
        }

        // The leader is reported last
        if tid == task.tgid {
            if let Some(mut process) = self.processes.remove(&tid) {
                process.tool.fini(tid, code);
            }
        }
    }

    /// A new image replaced the process; false when it is no longer traced
    fn on_exec(&mut self, tid: Pid) -> bool {
        let tgid = self.tasks.get(&tid).map_or(tid, |task| task.tgid);

        // Only the thread now carrying the thread-group id survives exec
        self.tasks.retain(|&t, task| task.tgid != tgid || t == tgid);
        self.tasks.insert(tgid, Task::new(tgid));
        if let Some(mut previous) = self.processes.remove(&tgid) {
            previous.tool.replaced(tgid);
        }

        let child = ChildProcess {
            parent: tgid,
            child: tgid,
            kind: ChildKind::Exec,
        };
        if !self.tool.follow_child(&child) {
            self.tasks.remove(&tgid);
            self.release(tgid);
            return false;
        }

        self.processes
            .insert(tgid, TracedProcess::new(self.tool.start_process(tgid)));
        self.refresh_images(tgid, tgid);
        true
    }

    /// The parent of a vfork regains its memory
    ///
    /// An unfollowed vfork child had the shared traps removed.
    fn on_vfork_done(&mut self, tid: Pid) {
        let Some(tgid) = self.tasks.get(&tid).map(|task| task.tgid) else {
            return;
        };
        if let Some(process) = self.processes.get(&tgid) {
            process.breakpoints.rearm_all(tid);
        }
    }

    fn on_syscall_stop(&mut self, tid: Pid) {
        let Ok(regs) = ptrace::getregs(tid) else {
            return;
        };

        // rax holds -ENOSYS at syscall entry
        if regs.rax as i64 == -(libc::ENOSYS as i64) {
            return;
        }

        let nr = regs.orig_rax as i64;
        if !matches!(nr, libc::SYS_mmap | libc::SYS_mprotect | libc::SYS_munmap) {
            return;
        }
        let result = regs.rax as i64;
        if (-4095..0).contains(&result) {
            return;
        }

        if let Some(tgid) = self.tasks.get(&tid).map(|task| task.tgid) {
            self.refresh_images(tid, tgid);
        }
    }

    fn refresh_images(&mut self, tid: Pid, tgid: Pid) {
        let mappings = match maps::read_maps(tgid) {
            Ok(maps) => maps,
            Err(e) => {
                tracing::debug!("{:#}", e);
                return;
            }
        };

        let mut exec_maps: BTreeMap<PathBuf, Vec<MapEntry>> = BTreeMap::new();
        for entry in mappings {
            if !entry.is_executable() {
                continue;
            }
            if let Some(path) = entry.path.clone() {
                exec_maps.entry(path).or_default().push(entry);
            }
        }

        if let Some(process) = self.processes.get_mut(&tgid) {
            process.sync_images(tid, &exec_maps);
        }
    }

    /// Handle a SIGTRAP stop; true when it was ours and the task was resumed
    fn on_trap(&mut self, tid: Pid) -> bool {
        let Some(task) = self.tasks.get_mut(&tid) else {
            return false;
        };
        let tgid = task.tgid;

        if let Some(addr) = task.stepping.take() {
            if let Some(process) = self.processes.get_mut(&tgid) {
                if let Err(e) = process.breakpoints.end_step(tid, addr) {
                    tracing::warn!("failed to re-arm {:#x}: {:#}", addr, e);
                }
            }
            self.resume(tid, None);
            return true;
        }

        let Ok(mut regs) = ptrace::getregs(tid) else {
            return false;
        };
        let addr = regs.rip.wrapping_sub(1);

        let Some(process) = self.processes.get_mut(&tgid) else {
            return false;
        };
        let Some(hooks) = process.breakpoints.hooks_at(addr) else {
            return false;
        };

        let client = TaskClient {
            lock: &self.client_lock,
            tgid,
        };
        for bound in hooks {
            bound.hook.on_entry(&client, &bound.args);
        }

        // Step over the original instruction
        if let Err(e) = process.breakpoints.begin_step(tid, addr) {
            tracing::warn!("failed to disarm {:#x}: {:#}", addr, e);
        }
        regs.rip = addr;
        if let Err(e) = ptrace::setregs(tid, regs) {
            tracing::debug!("failed to rewind {}: {}", tid, e);
        }
        match ptrace::step(tid, None) {
            Ok(()) => {
                if let Some(task) = self.tasks.get_mut(&tid) {
                    task.stepping = Some(addr);
                }
            }
            Err(e) => {
                tracing::debug!("failed to step {}: {}", tid, e);
                let _ = process.breakpoints.end_step(tid, addr);
            }
        }
        true
    }

    /// Stop every task so breakpoints can be removed and tasks released
    fn begin_detach(&mut self) {
        tracing::info!("detaching from {} tasks", self.tasks.len());
        self.detaching = true;
        for (&tid, task) in self.tasks.iter_mut() {
            let sent = unsafe {
                libc::syscall(
                    libc::SYS_tgkill,
                    task.tgid.as_raw(),
                    tid.as_raw(),
                    libc::SIGSTOP,
                )
            };
            task.stop_sent = sent == 0;
        }
    }

    fn handle_detach_stop(&mut self, status: WaitStatus) {
        let (tid, signal) = match status {
            WaitStatus::Exited(tid, code) => return self.task_gone(tid, code),
            WaitStatus::Signaled(tid, sig, _) => return self.task_gone(tid, 128 + sig as i32),
            WaitStatus::Stopped(tid, sig) => (tid, Some(sig)),
            WaitStatus::PtraceEvent(tid, _, _) | WaitStatus::PtraceSyscall(tid) => (tid, None),
            _ => return,
        };

        let Some(task) = self.tasks.get(&tid).copied() else {
            // Born during detach; never instrumented by us
            self.release(tid);
            return;
        };

        let mut deliver = signal;
        if signal == Some(Signal::SIGTRAP) {
            if task.stepping.is_some() {
                deliver = None;
            } else if let Ok(mut regs) = ptrace::getregs(tid) {
                let addr = regs.rip.wrapping_sub(1);
                let ours = self
                    .processes
                    .get(&task.tgid)
                    .is_some_and(|p| p.breakpoints.contains(addr));
                if ours {
                    // Re-execute the real instruction once the trap is gone
                    regs.rip = addr;
                    let _ = ptrace::setregs(tid, regs);
                    deliver = None;
                }
            }
        }
        if let Some(task) = self.tasks.get_mut(&tid) {
            task.stepping = None;
        }

        if let Some(process) = self.processes.get_mut(&task.tgid) {
            if !process.breakpoints.is_empty() {
                process.breakpoints.restore_all(tid);
            }
        }

        if signal == Some(Signal::SIGSTOP) && task.stop_sent {
            self.tasks.remove(&tid);
            self.release(tid);
            return;
        }

        if let Err(e) = ptrace::cont(tid, deliver) {
            tracing::debug!("failed to continue {}: {}", tid, e);
        }
    }
}
