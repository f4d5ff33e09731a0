/*
 * Dispatcher
 *
 * Chooses the next process to run. The decision (plan_switch) is pure state
 * manipulation done inside the kernel's critical section; the switch itself
 * is carried out by the caller through the substrate once the lock is gone.
 *
 * PREEMPTION RULE:
 * ===============
 *
 * While a process is RUNNING only candidates of equal or higher priority are
 * eligible, so a lower-priority process never takes the CPU from a higher
 * one. A preempted process goes to the tail of its queue, which is what
 * rotates equal-priority processes on quantum expiry.
 *
 * If the current process is no longer RUNNING (it blocked or exited) every
 * priority is eligible.
 *
 * Why this is important:
 * - It is the only place a process becomes RUNNING
 * - Keeping the switch outside the lock lets the incoming process make
 *   system calls as soon as it resumes
 */

use super::process::{ProcessId, ProcessStatus};
use super::types::{Priority, ProcRef};
use super::SchedState;
use crate::substrate::ContextHandle;

/// A context switch decided under the lock, to be performed after it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Switch {
    /// Outgoing context; None for the boot context
    pub from: Option<ContextHandle>,
    pub to: ContextHandle,
    pub pid: ProcessId,
}

impl SchedState {
    /// Mark a process READY and append it to its priority's queue
    pub fn make_ready(&mut self, handle: ProcRef) {
        if let Some(p) = self.table.get_mut(handle) {
            p.status = ProcessStatus::Ready;
            let priority = p.priority;
            self.ready.push(priority, handle);
        }
    }

    /// Priority of the current process, if it still holds the CPU
    fn running_priority(&self) -> Option<Priority> {
        self.current
            .and_then(|c| self.table.get(c))
            .filter(|p| p.status == ProcessStatus::Running)
            .map(|p| p.priority)
    }

    /// Decide what runs next.
    ///
    /// Returns None when the current process keeps the CPU (or nothing at all
    /// is runnable). Otherwise the state already reflects the incoming process
    /// as current and RUNNING; the caller must perform the returned switch.
    pub fn plan_switch(&mut self) -> Option<Switch> {
        let running = self.running_priority();
        let floor = running.unwrap_or(Priority::LOWEST);

        loop {
            let (priority, next) = self.ready.pop_eligible(floor)?;

            // Skip entries whose process is gone or no longer READY
            let to = match self.table.get(next) {
                Some(p) if p.status == ProcessStatus::Ready => p.context,
                _ => continue,
            };

            if Some(next) == self.current {
                if let Some(p) = self.table.get_mut(next) {
                    p.status = ProcessStatus::Running;
                }
                return None;
            }

            let Some(to) = to else { continue };

            if running.is_some() {
                if let Some(cur) = self.current {
                    self.make_ready(cur);
                }
            }

            if let Some(p) = self.table.get_mut(next) {
                p.status = ProcessStatus::Running;
            }
            self.current = Some(next);
            self.slice_used = 0;
            self.switches += 1;
            let from = self.running_context.replace(to);

            log::trace!("dispatch: pid {} (priority {})", next.pid, priority);
            return Some(Switch {
                from,
                to,
                pid: next.pid,
            });
        }
    }
}
