/*
 * Process Table
 *
 * Fixed-capacity arena of process records. Slots are addressed by index; a
 * process with pid P always lives in slot P % MAX_PROCESSES, so a lookup by
 * pid touches exactly one slot.
 *
 * PID ALLOCATION:
 * ==============
 *
 * A counter hands out pids in increasing order. Before a value is issued the
 * counter is advanced past every value whose slot is occupied, so the new pid
 * can never collide with a live one, including after the counter wraps. Pid 0
 * marks an empty slot and is never issued.
 *
 * Why this is important:
 * - Spawn fails cleanly with TableFull instead of growing without bound
 * - Pid lookup is a single slot check, used by kill, join and unblock
 * - Handles that outlive a slot cannot reach the slot's next occupant
 */

use alloc::vec::Vec;

use super::process::{Process, ProcessId};
use super::types::ProcRef;
use crate::config::MAX_PROCESSES;
use crate::substrate::ContextHandle;

/// Process table
pub struct ProcessTable {
    slots: Vec<Process>,
    next_pid: u32,
    count: usize,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self {
            slots: (0..MAX_PROCESSES).map(|_| Process::empty()).collect(),
            next_pid: 1,
            count: 0,
        }
    }

    /// Reserve an empty slot and a fresh pid for it.
    ///
    /// The slot keeps status Empty until the caller populates it. Returns None
    /// when every slot is taken.
    pub fn allocate(&mut self) -> Option<ProcRef> {
        if self.count >= MAX_PROCESSES {
            return None;
        }

        loop {
            let candidate = self.next_pid;
            self.next_pid = self.next_pid.wrapping_add(1);
            if candidate == 0 {
                continue;
            }

            let slot = Self::slot_of(ProcessId(candidate));
            if self.slots[slot].is_empty() && self.slots[slot].pid == ProcessId::NONE {
                self.slots[slot].pid = ProcessId(candidate);
                self.count += 1;
                return Some(ProcRef::new(slot, ProcessId(candidate)));
            }
        }
    }

    /// Clear a slot back to Empty, handing back its execution context so the
    /// caller can release it
    pub fn free(&mut self, slot: usize) -> Option<ContextHandle> {
        let entry = &mut self.slots[slot];
        if entry.pid == ProcessId::NONE {
            return None;
        }
        let context = entry.context;
        *entry = Process::empty();
        self.count -= 1;
        context
    }

    /// Slot a pid maps to
    pub fn slot_of(pid: ProcessId) -> usize {
        pid.0 as usize % MAX_PROCESSES
    }

    /// Find the slot holding `pid`
    pub fn lookup(&self, pid: ProcessId) -> Option<ProcRef> {
        if pid == ProcessId::NONE {
            return None;
        }
        let slot = Self::slot_of(pid);
        let entry = &self.slots[slot];
        (entry.pid == pid && !entry.is_empty()).then(|| ProcRef::new(slot, pid))
    }

    /// Resolve a handle, failing if its slot has been recycled
    pub fn get(&self, handle: ProcRef) -> Option<&Process> {
        self.slots
            .get(handle.slot)
            .filter(|p| p.pid == handle.pid && !p.is_empty())
    }

    pub fn get_mut(&mut self, handle: ProcRef) -> Option<&mut Process> {
        self.slots
            .get_mut(handle.slot)
            .filter(|p| p.pid == handle.pid && !p.is_empty())
    }

    /// Direct slot access, for slots the caller knows are reserved
    pub fn slot_mut(&mut self, slot: usize) -> &mut Process {
        &mut self.slots[slot]
    }

    /// Occupied slots, in slot order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Process)> {
        self.slots.iter().enumerate().filter(|(_, p)| !p.is_empty())
    }

    /// Number of occupied slots
    pub fn count(&self) -> usize {
        self.count
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::process::ProcessStatus;

    /// Allocate and mark the slot live so it counts as occupied
    fn occupy(table: &mut ProcessTable) -> ProcRef {
        let handle = table.allocate().expect("table full");
        table.slot_mut(handle.slot).status = ProcessStatus::Ready;
        handle
    }

    #[test]
    fn test_pids_start_at_one_and_increase() {
        let mut table = ProcessTable::new();
        let a = occupy(&mut table);
        let b = occupy(&mut table);
        assert_eq!(a.pid, ProcessId(1));
        assert_eq!(b.pid, ProcessId(2));
        assert_eq!(a.slot, 1);
        assert_eq!(table.count(), 2);
    }

    #[test]
    fn test_table_full() {
        let mut table = ProcessTable::new();
        for _ in 0..MAX_PROCESSES {
            occupy(&mut table);
        }
        assert_eq!(table.count(), MAX_PROCESSES);
        assert!(table.allocate().is_none());
    }

    #[test]
    fn test_pid_skips_occupied_slots() {
        let mut table = ProcessTable::new();
        let handles: Vec<ProcRef> = (0..MAX_PROCESSES).map(|_| occupy(&mut table)).collect();

        // Free pid 3; the next pid must land in slot 3 and not collide with
        // any live pid
        table.free(handles[2].slot);
        let reused = occupy(&mut table);
        assert_eq!(reused.slot, handles[2].slot);
        assert_eq!(reused.pid, ProcessId(3 + MAX_PROCESSES as u32));
        assert!(table.lookup(ProcessId(3)).is_none());
    }

    #[test]
    fn test_stale_handle_does_not_resolve() {
        let mut table = ProcessTable::new();
        let first = occupy(&mut table);
        table.free(first.slot);

        // Churn until the slot is reused by a different pid
        let mut reused = None;
        for _ in 0..MAX_PROCESSES {
            let h = occupy(&mut table);
            if h.slot == first.slot {
                reused = Some(h);
                break;
            }
        }
        let reused = reused.expect("slot never reused");
        assert_ne!(reused.pid, first.pid);
        assert!(table.get(first).is_none());
        assert!(table.get(reused).is_some());
    }

    #[test]
    fn test_free_returns_context_and_clears() {
        let mut table = ProcessTable::new();
        let h = occupy(&mut table);
        table.slot_mut(h.slot).context = Some(ContextHandle(7));
        assert_eq!(table.free(h.slot), Some(ContextHandle(7)));
        assert_eq!(table.count(), 0);
        assert_eq!(table.iter().count(), 0);
        assert_eq!(table.free(h.slot), None);
    }

    #[test]
    fn test_lookup_ignores_pid_zero() {
        let table = ProcessTable::new();
        assert!(table.lookup(ProcessId::NONE).is_none());
    }
}
