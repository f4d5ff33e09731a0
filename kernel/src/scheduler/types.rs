/*
 * Scheduler Type Definitions
 *
 * Small Copy-able types shared by the process table, the ready queues and the
 * dispatcher: priorities, arena handles and block reasons.
 */

use core::fmt;

use super::process::ProcessId;
use crate::config::{HIGHEST_PRIORITY, LOWEST_PRIORITY, PRIORITY_LEVELS, RESERVED_STATUS_MAX};

/// Process priority
///
/// Higher values are more urgent. Only values in
/// [LOWEST_PRIORITY, HIGHEST_PRIORITY] can be constructed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u8);

impl Priority {
    /// Watchdog priority
    pub const LOWEST: Priority = Priority(LOWEST_PRIORITY);

    /// Bootstrap test program priority
    pub const HIGHEST: Priority = Priority(HIGHEST_PRIORITY);

    /// Validate a raw priority coming through the syscall interface
    pub fn new(raw: i32) -> Option<Priority> {
        if (LOWEST_PRIORITY as i32..=HIGHEST_PRIORITY as i32).contains(&raw) {
            Some(Priority(raw as u8))
        } else {
            None
        }
    }

    /// Ready-queue index for this priority
    pub fn index(self) -> usize {
        (self.0 - LOWEST_PRIORITY) as usize
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// All priorities, most urgent first
    pub fn descending() -> impl Iterator<Item = Priority> {
        (LOWEST_PRIORITY..=HIGHEST_PRIORITY).rev().map(Priority)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const _: () = assert!(PRIORITY_LEVELS == (HIGHEST_PRIORITY - LOWEST_PRIORITY) as usize + 1);

/// Handle to a process-table slot
///
/// A handle names both the slot and the pid that occupied it when the handle
/// was taken. The table only resolves it while the slot still holds that pid,
/// so a handle to a reaped process never aliases whoever reuses the slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ProcRef {
    pub slot: usize,
    pub pid: ProcessId,
}

impl ProcRef {
    pub fn new(slot: usize, pid: ProcessId) -> Self {
        Self { slot, pid }
    }
}

/// Reason a process is BLOCKED
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// Waiting for any child to exit (wait)
    WaitingForChild,

    /// Waiting for one specific child to exit (join)
    JoiningChild(ProcessId),

    /// Caller-defined reason passed to block(); always above the reserved range
    Other(i32),
}

impl BlockReason {
    /// Status code reported for a process blocked for this reason
    pub fn code(self) -> i32 {
        match self {
            BlockReason::WaitingForChild => 3,
            BlockReason::JoiningChild(_) => 4,
            BlockReason::Other(code) => code,
        }
    }

    /// Build a caller-defined reason, rejecting the reserved range
    pub fn user(code: i32) -> Option<BlockReason> {
        if code > RESERVED_STATUS_MAX {
            Some(BlockReason::Other(code))
        } else {
            None
        }
    }
}
