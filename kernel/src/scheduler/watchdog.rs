/*
 * Watchdog Process
 *
 * An ordinary process spawned at the lowest priority during boot. Because
 * every other process outranks or ties with it, it only gets the CPU when
 * nothing else is runnable at a higher priority. Each time it runs it
 * classifies the system:
 *
 * - Only the watchdog is left          -> halt, all processes completed
 * - Another process is READY           -> yield the CPU to it
 * - Everyone else is BLOCKED, no I/O   -> halt, deadlock
 *
 * While I/O is reported pending it keeps polling instead of declaring a
 * deadlock.
 */

use super::process::ProcessStatus;
use super::{Kernel, SchedState};
use crate::syscall::HaltReason;

/// What the watchdog found on one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No live process besides the watchdog
    Completed,
    /// Someone else can run
    Yield,
    /// Every other live process is blocked
    AllBlocked(usize),
}

impl SchedState {
    pub fn watchdog_verdict(&self) -> Verdict {
        let mut live = 0;
        let mut blocked = 0;
        let mut ready = false;

        for (_, p) in self.table.iter().filter(|(_, p)| !p.is_watchdog()) {
            match p.status {
                ProcessStatus::Ready => ready = true,
                ProcessStatus::Running => {}
                ProcessStatus::Blocked(_) => blocked += 1,
                ProcessStatus::Empty | ProcessStatus::Exited => continue,
            }
            live += 1;
        }

        if live == 0 {
            Verdict::Completed
        } else if ready || blocked < live {
            Verdict::Yield
        } else {
            Verdict::AllBlocked(blocked)
        }
    }
}

/// Entry point of the watchdog process
pub fn watchdog_main(kernel: &Kernel, _arg: &str) -> i32 {
    let io_pending = kernel.config().io_pending;

    loop {
        match kernel.critical(|st| st.watchdog_verdict()) {
            Verdict::Completed => {
                log::info!("watchdog: all processes completed");
                kernel.halt(HaltReason::Completed)
            }
            Verdict::Yield => {
                kernel.dispatch();
            }
            Verdict::AllBlocked(blocked) => {
                if io_pending() {
                    core::hint::spin_loop();
                    continue;
                }
                log::warn!("watchdog: {} process(es) blocked with no I/O pending", blocked);
                kernel.halt(HaltReason::Deadlock { blocked })
            }
        }
    }
}
