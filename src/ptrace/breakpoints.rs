//! Software breakpoints on routine entry points
//!
//! One `int3` per instrumented address, patched byte-wise through
//! `/proc/<tid>/mem` so neighbouring sites never clobber each other.
//! While a task steps over a site the original byte is back in place; the
//! site is re-armed only when the last in-flight step completes.

use crate::engine::{EntryHook, HookArgs};
use anyhow::{Context, Result};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::os::unix::fs::FileExt;
use std::sync::Arc;

/// x86 breakpoint instruction
pub const INT3: u8 = 0xCC;

/// Read one byte of tracee memory
pub fn read_byte(tid: Pid, addr: u64) -> Result<u8> {
    let mem = OpenOptions::new()
        .read(true)
        .open(format!("/proc/{}/mem", tid))
        .with_context(|| format!("Failed to open memory of {}", tid))?;
    let mut byte = [0u8; 1];
    mem.read_exact_at(&mut byte, addr)
        .with_context(|| format!("Failed to read {:#x} in {}", addr, tid))?;
    Ok(byte[0])
}

/// Write one byte of tracee memory, read-only text included
pub fn write_byte(tid: Pid, addr: u64, value: u8) -> Result<()> {
    let mem = OpenOptions::new()
        .write(true)
        .open(format!("/proc/{}/mem", tid))
        .with_context(|| format!("Failed to open memory of {}", tid))?;
    mem.write_all_at(&[value], addr)
        .with_context(|| format!("Failed to write {:#x} in {}", addr, tid))?;
    Ok(())
}

/// A hook bound to a site, with its fixed arguments
#[derive(Clone)]
pub struct BoundHook {
    pub hook: Arc<dyn EntryHook>,
    pub args: HookArgs,
}

#[derive(Clone)]
struct Site {
    original: u8,
    hooks: Vec<BoundHook>,
    in_flight: usize,
}

/// Breakpoint sites of one address space
#[derive(Default)]
pub struct Breakpoints {
    sites: HashMap<u64, Site>,
}

impl Breakpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a hook to `addr`, planting the trap on first use of the address
    pub fn insert(
        &mut self,
        tid: Pid,
        addr: u64,
        hook: Arc<dyn EntryHook>,
        args: HookArgs,
    ) -> Result<()> {
        if let Some(site) = self.sites.get_mut(&addr) {
            site.hooks.push(BoundHook { hook, args });
            return Ok(());
        }

        let original = read_byte(tid, addr)?;
        write_byte(tid, addr, INT3)?;
        self.sites.insert(
            addr,
            Site {
                original,
                hooks: vec![BoundHook { hook, args }],
                in_flight: 0,
            },
        );
        Ok(())
    }

    pub fn contains(&self, addr: u64) -> bool {
        self.sites.contains_key(&addr)
    }

    /// Hooks bound at `addr`, if it is a site
    pub fn hooks_at(&self, addr: u64) -> Option<&[BoundHook]> {
        self.sites.get(&addr).map(|site| site.hooks.as_slice())
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Put the original byte back so `tid` can execute it
    pub fn begin_step(&mut self, tid: Pid, addr: u64) -> Result<()> {
        let Some(site) = self.sites.get_mut(&addr) else {
            return Ok(());
        };
        site.in_flight += 1;
        if site.in_flight == 1 {
            write_byte(tid, addr, site.original)?;
        }
        Ok(())
    }

    /// Re-arm once no other task is still stepping over the site
    pub fn end_step(&mut self, tid: Pid, addr: u64) -> Result<()> {
        let Some(site) = self.sites.get_mut(&addr) else {
            return Ok(());
        };
        site.in_flight = site.in_flight.saturating_sub(1);
        if site.in_flight == 0 {
            write_byte(tid, addr, INT3)?;
        }
        Ok(())
    }

    /// Site table for a forked copy of this address space
    ///
    /// The child's memory already carries the traps. Hooks are not
    /// inherited; the child's own tool binds fresh ones. Sites that were
    /// mid-step at fork time are re-armed in the child.
    pub fn inherit(&self, child_tid: Pid) -> Breakpoints {
        let mut sites = HashMap::with_capacity(self.sites.len());
        for (&addr, site) in &self.sites {
            if site.in_flight > 0 {
                if let Err(e) = write_byte(child_tid, addr, INT3) {
                    tracing::debug!("failed to re-arm {:#x} in {}: {:#}", addr, child_tid, e);
                }
            }
            sites.insert(
                addr,
                Site {
                    original: site.original,
                    hooks: Vec::new(),
                    in_flight: 0,
                },
            );
        }
        Breakpoints { sites }
    }

    /// Drop sites in `[start, end)`, restoring bytes where memory remains
    pub fn forget_range(&mut self, tid: Pid, start: u64, end: u64) {
        self.sites.retain(|&addr, site| {
            if addr < start || addr >= end {
                return true;
            }
            // Usually fails because the range is already unmapped
            let _ = write_byte(tid, addr, site.original);
            false
        });
    }

    /// Restore every original byte through `tid` and forget all sites
    pub fn restore_all(&mut self, tid: Pid) {
        for (addr, site) in self.sites.drain() {
            if let Err(e) = write_byte(tid, addr, site.original) {
                tracing::warn!("failed to restore {:#x} in {}: {:#}", addr, tid, e);
            }
        }
    }

    /// Re-plant every trap not currently being stepped over
    ///
    /// Needed after a vforked child, sharing this memory, had them removed.
    pub fn rearm_all(&self, tid: Pid) {
        for (&addr, site) in &self.sites {
            if site.in_flight > 0 {
                continue;
            }
            if let Err(e) = write_byte(tid, addr, INT3) {
                tracing::debug!("failed to re-arm {:#x} in {}: {:#}", addr, tid, e);
            }
        }
    }

    /// Restore the original bytes through `tid` without forgetting sites
    ///
    /// Used for a child that shares these sites but is not followed.
    pub fn restore_into(&self, tid: Pid) {
        for (&addr, site) in &self.sites {
            if let Err(e) = write_byte(tid, addr, site.original) {
                tracing::debug!("failed to restore {:#x} in {}: {:#}", addr, tid, e);
            }
        }
    }
}
