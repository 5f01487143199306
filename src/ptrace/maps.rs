//! `/proc` queries: executable mappings, task identity, thread listing

use anyhow::{Context, Result};
use nix::unistd::Pid;
use procfs::process::{MMPermissions, MMapPath, MemoryMap, Process};
use std::path::PathBuf;

/// The parts of a `/proc/<pid>/maps` entry the engine cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    pub start: u64,
    pub end: u64,
    pub offset: u64,
    pub executable: bool,
    /// Set only for regular files (not `[heap]`, `[vdso]`, anonymous, ...)
    pub path: Option<PathBuf>,
}

impl MapEntry {
    pub fn is_executable(&self) -> bool {
        self.executable
    }

    pub fn is_file_backed(&self) -> bool {
        self.path.is_some()
    }

    pub fn contains(&self, addr: u64) -> bool {
        self.start <= addr && addr < self.end
    }
}

impl From<&MemoryMap> for MapEntry {
    fn from(map: &MemoryMap) -> Self {
        let path = match &map.pathname {
            MMapPath::Path(path) => Some(path.clone()),
            _ => None,
        };
        Self {
            start: map.address.0,
            end: map.address.1,
            offset: map.offset,
            executable: map.perms.contains(MMPermissions::EXECUTE),
            path,
        }
    }
}

/// Memory mappings of `pid`
pub fn read_maps(pid: Pid) -> Result<Vec<MapEntry>> {
    let maps = Process::new(pid.as_raw())
        .and_then(|process| process.maps())
        .with_context(|| format!("Failed to read memory maps of {}", pid))?;
    Ok(maps.iter().map(MapEntry::from).collect())
}

/// Thread-group and parent ids of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskStatus {
    pub tgid: Pid,
    pub ppid: Pid,
}

/// Read `Tgid` and `PPid` of `tid`
pub fn read_status(tid: Pid) -> Result<TaskStatus> {
    let status = Process::new(tid.as_raw())
        .and_then(|process| process.status())
        .with_context(|| format!("Failed to read status of {}", tid))?;
    Ok(TaskStatus {
        tgid: Pid::from_raw(status.tgid),
        ppid: Pid::from_raw(status.ppid),
    })
}

/// Thread ids of `pid`, sorted
pub fn list_tasks(pid: Pid) -> Result<Vec<Pid>> {
    let tasks = Process::new(pid.as_raw())
        .and_then(|process| process.tasks())
        .with_context(|| format!("Failed to list threads of {}", pid))?;

    let mut tids = Vec::new();
    for task in tasks {
        // A thread may exit while we list
        match task {
            Ok(task) => tids.push(Pid::from_raw(task.tid)),
            Err(e) => tracing::debug!("skipping task of {}: {}", pid, e),
        }
    }
    tids.sort();
    Ok(tids)
}
