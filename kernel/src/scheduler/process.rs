/*
 * Process Record
 *
 * This module defines the per-process metadata kept in each process-table
 * slot. A record holds:
 * - Identity (pid, name, start arguments)
 * - Scheduling state (priority, status, CPU time)
 * - Family links (parent handle, live children, exited-but-unreaped children)
 * - The execution context handle issued by the substrate
 *
 * Family links are arena handles (ProcRef), never pointers. Each role has its
 * own list, so a record can sit in a ready queue and in its parent's child
 * list at the same time without the lists sharing link fields.
 *
 * Why this is important:
 * - Every scheduling decision reads priority and status from here
 * - The two child lists are what wait() and join() reap from
 * - Bounded fields keep a record's size fixed, so the table never reallocates
 */

use core::fmt;

use bitflags::bitflags;
use heapless::{Deque, String, Vec};

use super::types::{BlockReason, Priority, ProcRef};
use super::Kernel;
use crate::config::{MAX_ARG, MAX_NAME, MAX_PROCESSES};
use crate::substrate::ContextHandle;

/// Unique identifier for a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub u32);

impl ProcessId {
    /// Marker held by empty slots; never assigned to a process
    pub const NONE: ProcessId = ProcessId(0);

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Function a process runs once dispatched for the first time.
///
/// It receives the kernel (for system calls) and the start arguments given to
/// spawn(). Its return value becomes the process's exit code.
pub type EntryPoint = fn(&Kernel, &str) -> i32;

/// Bounded process name
pub type ProcessName = String<{ MAX_NAME - 1 }>;

/// Bounded start arguments
pub type StartArgs = String<{ MAX_ARG - 1 }>;

/// Process status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Slot is free
    Empty,
    /// Waiting in a ready queue
    Ready,
    /// Owns the CPU
    Running,
    /// Suspended until another actor changes the awaited condition
    Blocked(BlockReason),
    /// Finished; waiting to be reaped by the parent
    Exited,
}

impl ProcessStatus {
    /// Numeric status used by the diagnostic table
    pub fn code(self) -> i32 {
        match self {
            ProcessStatus::Empty => 0,
            ProcessStatus::Ready => 1,
            ProcessStatus::Running => 2,
            ProcessStatus::Blocked(reason) => reason.code(),
            ProcessStatus::Exited => 5,
        }
    }

    /// Ready, running or blocked: the process can still execute
    pub fn is_live(self) -> bool {
        matches!(
            self,
            ProcessStatus::Ready | ProcessStatus::Running | ProcessStatus::Blocked(_)
        )
    }

    pub fn is_blocked(self) -> bool {
        matches!(self, ProcessStatus::Blocked(_))
    }
}

bitflags! {
    /// Per-process flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ProcessFlags: u8 {
        /// A terminate signal was delivered
        const SIGNALED = 1;
        /// This is the idle/deadlock watchdog
        const WATCHDOG = 1 << 1;
    }
}

/// Process control block
pub struct Process {
    pub pid: ProcessId,
    pub name: ProcessName,
    pub start_args: StartArgs,
    pub priority: Priority,
    pub status: ProcessStatus,
    pub flags: ProcessFlags,

    /// Spawning process, if any. Weak: resolved through the table.
    pub parent: Option<ProcRef>,

    /// Live children in spawn order
    pub active_children: Vec<ProcRef, MAX_PROCESSES>,

    /// Exited, unreaped children; oldest exit at the front
    pub exiting_children: Deque<ProcRef, MAX_PROCESSES>,

    pub entry_point: Option<EntryPoint>,
    pub stack_size: usize,
    pub context: Option<ContextHandle>,

    /// Valid once status is Exited
    pub exit_code: i32,

    /// CPU time credited by quantum ticks
    pub cpu_time: u64,
}

impl Process {
    /// An empty slot
    pub fn empty() -> Self {
        Process {
            pid: ProcessId::NONE,
            name: String::new(),
            start_args: String::new(),
            priority: Priority::LOWEST,
            status: ProcessStatus::Empty,
            flags: ProcessFlags::empty(),
            parent: None,
            active_children: Vec::new(),
            exiting_children: Deque::new(),
            entry_point: None,
            stack_size: 0,
            context: None,
            exit_code: 0,
            cpu_time: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status == ProcessStatus::Empty
    }

    /// Record a newly spawned child at the end of the live-children list
    pub fn add_child(&mut self, child: ProcRef) {
        // Capacity equals the table size, so a table-allocated child always fits
        let _ = self.active_children.push(child);
    }

    /// Drop a child from the live-children list, keeping spawn order
    ///
    /// Returns false if the child was not listed.
    pub fn remove_child(&mut self, pid: ProcessId) -> bool {
        if !self.has_active_child(pid) {
            return false;
        }
        let mut kept: Vec<ProcRef, MAX_PROCESSES> = Vec::new();
        for c in self.active_children.iter().filter(|c| c.pid != pid) {
            let _ = kept.push(*c);
        }
        self.active_children = kept;
        true
    }

    /// Queue an exited child for reaping
    pub fn push_exited(&mut self, child: ProcRef) {
        let _ = self.exiting_children.push_back(child);
    }

    /// Take a specific exited child out of the reaping queue, keeping the
    /// relative order of the others
    pub fn take_exited(&mut self, pid: ProcessId) -> Option<ProcRef> {
        let mut found = None;
        for _ in 0..self.exiting_children.len() {
            if let Some(child) = self.exiting_children.pop_front() {
                if found.is_none() && child.pid == pid {
                    found = Some(child);
                } else {
                    let _ = self.exiting_children.push_back(child);
                }
            }
        }
        found
    }

    pub fn has_exited_child(&self, pid: ProcessId) -> bool {
        self.exiting_children.iter().any(|c| c.pid == pid)
    }

    pub fn has_active_child(&self, pid: ProcessId) -> bool {
        self.active_children.iter().any(|c| c.pid == pid)
    }

    pub fn is_watchdog(&self) -> bool {
        self.flags.contains(ProcessFlags::WATCHDOG)
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("name", &self.name.as_str())
            .field("priority", &self.priority)
            .field("status", &self.status)
            .field("parent", &self.parent.map(|p| p.pid))
            .field("active_children", &self.active_children.len())
            .field("exiting_children", &self.exiting_children.len())
            .field("exit_code", &self.exit_code)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(slot: usize, pid: u32) -> ProcRef {
        ProcRef::new(slot, ProcessId(pid))
    }

    #[test]
    fn test_children_keep_spawn_order() {
        let mut p = Process::empty();
        p.add_child(child(1, 1));
        p.add_child(child(2, 2));
        p.add_child(child(3, 3));

        assert!(p.remove_child(ProcessId(2)));
        assert!(!p.remove_child(ProcessId(2)));

        let pids: alloc::vec::Vec<u32> = p.active_children.iter().map(|c| c.pid.0).collect();
        assert_eq!(pids, [1, 3]);
    }

    #[test]
    fn test_take_exited_preserves_fifo() {
        let mut p = Process::empty();
        p.push_exited(child(4, 4));
        p.push_exited(child(5, 5));
        p.push_exited(child(6, 6));

        assert_eq!(p.take_exited(ProcessId(5)), Some(child(5, 5)));
        assert_eq!(p.take_exited(ProcessId(5)), None);
        assert_eq!(p.exiting_children.pop_front(), Some(child(4, 4)));
        assert_eq!(p.exiting_children.pop_front(), Some(child(6, 6)));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ProcessStatus::Empty.code(), 0);
        assert_eq!(ProcessStatus::Ready.code(), 1);
        assert_eq!(ProcessStatus::Running.code(), 2);
        assert_eq!(ProcessStatus::Blocked(BlockReason::WaitingForChild).code(), 3);
        assert_eq!(ProcessStatus::Exited.code(), 5);
        assert!(!ProcessStatus::Exited.is_live());
        assert!(ProcessStatus::Blocked(BlockReason::Other(20)).is_live());
    }
}
