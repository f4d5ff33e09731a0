/*
 * Ready Queues
 *
 * One FIFO per priority level. A process appears in at most one queue, and
 * only while its status is Ready; the dispatcher keeps the two in step.
 *
 * Selection scans from the highest priority down and takes the head of the
 * first non-empty queue, so equal-priority processes are served in the order
 * they became ready.
 */

use alloc::vec::Vec;

use heapless::Deque;

use super::process::ProcessId;
use super::types::{Priority, ProcRef};
use crate::config::{MAX_PROCESSES, PRIORITY_LEVELS};

type Queue = Deque<ProcRef, MAX_PROCESSES>;

/// Per-priority FIFO queues of ready processes
pub struct ReadyQueues {
    queues: [Queue; PRIORITY_LEVELS],
}

impl ReadyQueues {
    pub fn new() -> Self {
        Self {
            queues: core::array::from_fn(|_| Deque::new()),
        }
    }

    /// Append to the tail of the queue for `priority`
    pub fn push(&mut self, priority: Priority, proc: ProcRef) {
        // A queue holds at most every table slot once
        let _ = self.queues[priority.index()].push_back(proc);
    }

    /// Remove and return the head of the highest non-empty queue at or above
    /// `floor`
    pub fn pop_eligible(&mut self, floor: Priority) -> Option<(Priority, ProcRef)> {
        for priority in Priority::descending().take_while(|p| *p >= floor) {
            if let Some(proc) = self.queues[priority.index()].pop_front() {
                return Some((priority, proc));
            }
        }
        None
    }

    /// Take `pid` out of its queue, keeping the order of the others.
    ///
    /// Returns false if it was not queued at `priority`.
    pub fn remove(&mut self, priority: Priority, pid: ProcessId) -> bool {
        let queue = &mut self.queues[priority.index()];
        let mut found = false;
        for _ in 0..queue.len() {
            if let Some(proc) = queue.pop_front() {
                if !found && proc.pid == pid {
                    found = true;
                } else {
                    let _ = queue.push_back(proc);
                }
            }
        }
        found
    }

    /// Queued pids at one priority, head first
    pub fn pids(&self, priority: Priority) -> Vec<ProcessId> {
        self.queues[priority.index()].iter().map(|p| p.pid).collect()
    }

    /// Every queued entry together with the priority of its queue
    pub fn iter(&self) -> impl Iterator<Item = (Priority, ProcRef)> + '_ {
        Priority::descending()
            .flat_map(move |p| self.queues[p.index()].iter().map(move |proc| (p, *proc)))
    }
}

impl Default for ReadyQueues {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proc(pid: u32) -> ProcRef {
        ProcRef::new(pid as usize % MAX_PROCESSES, ProcessId(pid))
    }

    fn prio(p: i32) -> Priority {
        Priority::new(p).unwrap()
    }

    #[test]
    fn test_highest_priority_first() {
        let mut rq = ReadyQueues::new();
        rq.push(prio(1), proc(1));
        rq.push(prio(4), proc(2));
        rq.push(prio(2), proc(3));

        assert_eq!(rq.pop_eligible(Priority::LOWEST), Some((prio(4), proc(2))));
        assert_eq!(rq.pop_eligible(Priority::LOWEST), Some((prio(2), proc(3))));
        assert_eq!(rq.pop_eligible(Priority::LOWEST), Some((prio(1), proc(1))));
        assert_eq!(rq.pop_eligible(Priority::LOWEST), None);
    }

    #[test]
    fn test_fifo_within_priority() {
        let mut rq = ReadyQueues::new();
        rq.push(prio(3), proc(7));
        rq.push(prio(3), proc(8));
        rq.push(prio(3), proc(9));
        assert_eq!(rq.pids(prio(3)), [ProcessId(7), ProcessId(8), ProcessId(9)]);
        assert_eq!(rq.pop_eligible(prio(3)).map(|(_, p)| p.pid), Some(ProcessId(7)));
    }

    #[test]
    fn test_floor_excludes_lower_priorities() {
        let mut rq = ReadyQueues::new();
        rq.push(prio(2), proc(1));
        assert_eq!(rq.pop_eligible(prio(3)), None);
        assert_eq!(rq.pids(prio(2)), [ProcessId(1)]);
        assert_eq!(rq.pop_eligible(prio(2)), Some((prio(2), proc(1))));
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut rq = ReadyQueues::new();
        for pid in 1..=4 {
            rq.push(prio(0), proc(pid));
        }
        assert!(rq.remove(prio(0), ProcessId(2)));
        assert!(!rq.remove(prio(0), ProcessId(2)));
        assert_eq!(rq.pids(prio(0)), [ProcessId(1), ProcessId(3), ProcessId(4)]);
        assert_eq!(rq.iter().count(), 3);
    }
}
