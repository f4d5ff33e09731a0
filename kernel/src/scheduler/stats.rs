/*
 * Scheduler Diagnostics
 *
 * Read-only views of the scheduler state: the process-table dump printed by
 * the DisplayProcessTable call, a structured snapshot for tools and tests,
 * and an invariant checker. Nothing here feeds back into scheduling.
 */

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use super::process::{Process, ProcessFlags, ProcessId, ProcessStatus};
use super::types::Priority;
use super::{Kernel, SchedState};

/// Snapshot of one process-table slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: ProcessId,
    pub parent: Option<ProcessId>,
    pub name: String,
    pub priority: Priority,
    pub status: ProcessStatus,
    pub flags: ProcessFlags,
    pub active_children: usize,
    pub exiting_children: usize,
    pub exit_code: i32,
    pub cpu_time: u64,
    pub stack_size: usize,
}

impl ProcessInfo {
    fn from_process(p: &Process) -> Self {
        Self {
            pid: p.pid,
            parent: p.parent.map(|h| h.pid),
            name: String::from(p.name.as_str()),
            priority: p.priority,
            status: p.status,
            flags: p.flags,
            active_children: p.active_children.len(),
            exiting_children: p.exiting_children.len(),
            exit_code: p.exit_code,
            cpu_time: p.cpu_time,
            stack_size: p.stack_size,
        }
    }
}

/// Broken scheduler invariant found by audit()
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditError {
    /// A READY process is not queued exactly once at its own priority
    ReadyNotQueued(ProcessId),
    /// A queue entry does not name a READY process of that priority
    StaleQueueEntry(ProcessId),
    /// More than one process is RUNNING, or it is not the current one
    RunningMismatch(ProcessId),
    /// A child is missing from its parent's lists, or is in both
    ChildLinkBroken(ProcessId),
    /// An EXITED process still has live children
    ExitedWithChildren(ProcessId),
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditError::ReadyNotQueued(pid) => write!(f, "Ready pid {} not queued once", pid),
            AuditError::StaleQueueEntry(pid) => write!(f, "Stale ready-queue entry for pid {}", pid),
            AuditError::RunningMismatch(pid) => write!(f, "Unexpected running pid {}", pid),
            AuditError::ChildLinkBroken(pid) => write!(f, "Broken parent link for pid {}", pid),
            AuditError::ExitedWithChildren(pid) => {
                write!(f, "Exited pid {} has live children", pid)
            }
        }
    }
}

impl SchedState {
    /// Check the table, the ready queues and the family links agree
    pub fn audit(&self) -> Result<(), AuditError> {
        for (priority, entry) in self.ready.iter() {
            match self.table.get(entry) {
                Some(p) if p.status == ProcessStatus::Ready && p.priority == priority => {}
                _ => return Err(AuditError::StaleQueueEntry(entry.pid)),
            }
        }

        for (slot, p) in self.table.iter() {
            match p.status {
                ProcessStatus::Ready => {
                    let queued = self.ready.iter().filter(|(_, e)| e.pid == p.pid).count();
                    if queued != 1 {
                        return Err(AuditError::ReadyNotQueued(p.pid));
                    }
                }
                ProcessStatus::Running => {
                    if self.current.map(|c| c.slot) != Some(slot) {
                        return Err(AuditError::RunningMismatch(p.pid));
                    }
                }
                ProcessStatus::Exited if !p.active_children.is_empty() => {
                    return Err(AuditError::ExitedWithChildren(p.pid));
                }
                _ => {}
            }

            if let Some(parent) = p.parent.and_then(|h| self.table.get(h)) {
                let active = parent.has_active_child(p.pid);
                let exited = parent.has_exited_child(p.pid);
                let consistent = match p.status {
                    ProcessStatus::Exited => exited && !active,
                    _ => active && !exited,
                };
                if !consistent {
                    return Err(AuditError::ChildLinkBroken(p.pid));
                }
            }
        }
        Ok(())
    }

    /// Write the process-table dump: a header, then one line per occupied
    /// slot
    pub fn write_table(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(
            out,
            "{:>5} {:>5} {:>4} {:>6} {:>5} {:>10} {:>8}  NAME",
            "PID", "PPID", "PRI", "STATUS", "KIDS", "CPU", "STACK"
        )?;
        for (_, p) in self.table.iter() {
            writeln!(
                out,
                "{:>5} {:>5} {:>4} {:>6} {:>5} {:>10} {:>8}  {}",
                p.pid.0,
                p.parent.map_or(-1, |h| h.pid.0 as i64),
                p.priority.get(),
                p.status.code(),
                p.active_children.len(),
                p.cpu_time,
                p.stack_size,
                p.name
            )?;
        }
        Ok(())
    }
}

impl Kernel {
    /// Log the process table, one line per process
    pub fn display_process_table(&self) {
        let mut dump = String::new();
        // Writing into a String cannot fail
        let _ = self.critical(|st| st.write_table(&mut dump));
        for line in dump.lines() {
            log::info!("{}", line);
        }
    }

    /// Write the process-table dump to `out`
    pub fn write_process_table(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        let mut dump = String::new();
        self.critical(|st| st.write_table(&mut dump))?;
        out.write_str(&dump)
    }

    /// Snapshot of every occupied slot, in slot order
    pub fn process_table(&self) -> Vec<ProcessInfo> {
        self.critical(|st| {
            st.table
                .iter()
                .map(|(_, p)| ProcessInfo::from_process(p))
                .collect()
        })
    }

    /// Snapshot of one process, if its pid is in the table
    pub fn process(&self, pid: ProcessId) -> Option<ProcessInfo> {
        self.critical(|st| {
            st.table
                .lookup(pid)
                .and_then(|h| st.table.get(h))
                .map(ProcessInfo::from_process)
        })
    }

    /// Verify the scheduler invariants
    pub fn audit(&self) -> Result<(), AuditError> {
        self.critical(|st| st.audit())
    }
}
