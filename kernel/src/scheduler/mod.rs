/*
 * Priority-Preemptive Process Scheduler
 *
 * This module implements the scheduler core of the teaching kernel: the
 * process table, the per-priority ready queues, the dispatcher and the
 * watchdog. The system calls built on top of it live in crate::syscall.
 *
 * PRIORITY SCHEDULING EXPLAINED:
 * =============================
 *
 * Every process has a fixed priority in [0, 5], 5 being the most urgent.
 * The CPU always belongs to the most urgent READY process:
 *
 * 1. A newly READY process of higher priority preempts the running one at
 *    once (after spawn, unblock, or a child's exit waking its parent)
 * 2. A lower-priority process never preempts
 * 3. Equal-priority processes share the CPU round-robin; the running one is
 *    rotated to the back of its queue each time its quantum runs out
 *
 * PROCESS LIFECYCLE:
 * =================
 *
 *   EMPTY --spawn--> READY --dispatch--> RUNNING --exit/kill--> EXITED
 *                      ^                    |                      |
 *                      |   preempt/quantum  |                  reaped
 *                      +--------------------+                      v
 *                      |                    | block/wait/join    EMPTY
 *                      +---- BLOCKED <------+
 *
 * CONTROL TRANSFER:
 * ================
 *
 * The kernel never switches in the middle of a state change. Every system
 * call does its bookkeeping inside one critical section (tick masked, kernel
 * lock held) and, if the dispatcher picked someone else, performs the switch
 * through the execution substrate only after leaving it. Control returns to
 * the caller when a later switch selects it again.
 *
 * BOOTSTRAP:
 * =========
 *
 * Kernel::boot() spawns the watchdog at the lowest priority, then the test
 * program at the highest. The boot context parks until the system halts and
 * then reports why.
 */

use alloc::boxed::Box;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;

use spin::Mutex;

pub mod dispatcher;
pub mod process;
pub mod ready_queue;
pub mod stats;
pub mod table;
pub mod types;
pub mod watchdog;

pub use dispatcher::Switch;
pub use process::{EntryPoint, Process, ProcessFlags, ProcessId, ProcessStatus};
pub use ready_queue::ReadyQueues;
pub use stats::{AuditError, ProcessInfo};
pub use table::ProcessTable;
pub use types::{BlockReason, Priority, ProcRef};

use crate::config::{SchedulerConfig, MAX_ARG, MAX_PROCESSES, WATCHDOG_NAME};
use crate::substrate::{ContextHandle, ExecutionSubstrate};
use crate::syscall::{HaltReason, SchedError, Violation};

/// Everything the kernel lock protects
pub struct SchedState {
    pub table: ProcessTable,
    pub ready: ReadyQueues,

    /// Process that owns (or last owned) the CPU
    pub current: Option<ProcRef>,

    /// Context the CPU is executing; None while on the boot context
    pub running_context: Option<ContextHandle>,

    /// Set while boot() spawns the watchdog; suppresses dispatch
    pub booting: bool,

    /// CPU time used by the current process since it was dispatched
    pub slice_used: u64,

    /// Context switches performed
    pub switches: u64,

    pub halt: Option<HaltReason>,
}

impl SchedState {
    pub fn new() -> Self {
        Self {
            table: ProcessTable::new(),
            ready: ReadyQueues::new(),
            current: None,
            running_context: None,
            booting: false,
            slice_used: 0,
            switches: 0,
            halt: None,
        }
    }

    /// The calling process
    pub fn current_process(&self) -> Result<ProcRef, Violation> {
        self.current
            .filter(|c| {
                self.table
                    .get(*c)
                    .map_or(false, |p| p.status == ProcessStatus::Running)
            })
            .ok_or(Violation::NoCurrentProcess)
    }

    /// Number of blocked processes
    pub fn blocked_count(&self) -> usize {
        self.table.iter().filter(|(_, p)| p.status.is_blocked()).count()
    }
}

impl Default for SchedState {
    fn default() -> Self {
        Self::new()
    }
}

/// The scheduler context
///
/// Created once by Kernel::new() and shared by every process. All mutable
/// state sits behind a single spin lock entered through critical().
pub struct Kernel {
    me: Weak<Kernel>,
    state: Mutex<SchedState>,
    substrate: Box<dyn ExecutionSubstrate>,
    config: SchedulerConfig,
}

impl Kernel {
    pub fn new(substrate: Box<dyn ExecutionSubstrate>, config: SchedulerConfig) -> Arc<Kernel> {
        Arc::new_cyclic(|me| Kernel {
            me: me.clone(),
            state: Mutex::new(SchedState::new()),
            substrate,
            config,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Another owning handle to this kernel, for launch closures
    pub(crate) fn handle(&self) -> Option<Arc<Kernel>> {
        self.me.upgrade()
    }

    pub(crate) fn substrate(&self) -> &dyn ExecutionSubstrate {
        self.substrate.as_ref()
    }

    /// Run `f` with the tick masked and the kernel lock held
    pub(crate) fn critical<R>(&self, f: impl FnOnce(&mut SchedState) -> R) -> R {
        let was_enabled = self.substrate.disable_interrupts();
        let result = {
            let mut state = self.state.lock();
            f(&mut state)
        };
        self.substrate.restore_interrupts(was_enabled);
        result
    }

    /// Start the system: spawn the watchdog and the test program, then run
    /// until halt.
    ///
    /// Returns the reason the system halted. Fails without running anything
    /// if either bootstrap spawn is rejected. Start arguments that do not fit
    /// halt the system before anything is spawned.
    pub fn boot(&self, entry: EntryPoint, arg: &str) -> Result<HaltReason, SchedError> {
        log::info!(
            "Booting kernel: {} slots, quantum {}, min stack {}",
            MAX_PROCESSES,
            self.config.quantum,
            self.config.min_stack_size
        );

        // There is no process to halt from yet, so record the halt here
        if arg.len() > MAX_ARG - 1 {
            let reason = HaltReason::Violation(Violation::ArgumentTooLong);
            self.critical(|st| st.halt = Some(reason));
            log::error!("Boot aborted: {}", reason);
            return Ok(reason);
        }

        self.critical(|st| st.booting = true);
        let watchdog = self.spawn_process(
            Some(WATCHDOG_NAME),
            Some(watchdog::watchdog_main),
            None,
            self.config.min_stack_size,
            Priority::LOWEST.get() as i32,
            ProcessFlags::WATCHDOG,
        );
        self.critical(|st| st.booting = false);
        let watchdog = watchdog?;
        log::info!("Watchdog started (pid {})", watchdog);

        // Dispatches the test program; returns once the system has halted
        self.spawn(
            Some(self.config.entry_name),
            Some(entry),
            Some(arg),
            self.config.min_stack_size * 2,
            Priority::HIGHEST.get() as i32,
        )?;

        let reason = self.halt_reason().unwrap_or(HaltReason::Completed);
        log::info!("System halted: {}", reason);
        Ok(reason)
    }

    /// Perform a switch decided under the lock. Returns whether one happened.
    pub(crate) fn switch(&self, switch: Option<Switch>) -> bool {
        match switch {
            Some(sw) => {
                self.substrate.switch_to(sw.from, sw.to);
                true
            }
            None => false,
        }
    }

    /// Run the dispatcher from outside any critical section
    pub fn dispatch(&self) -> bool {
        let switch = self.critical(|st| st.plan_switch());
        self.switch(switch)
    }

    /// Switch away from a caller that can no longer run. Halts if nobody
    /// else can run either.
    pub(crate) fn suspend(&self, switch: Option<Switch>) {
        if !self.switch(switch) {
            self.deadlock();
        }
    }

    /// Stop the system for good
    pub(crate) fn halt(&self, reason: HaltReason) -> ! {
        let reason = self.critical(|st| *st.halt.get_or_insert(reason));
        match reason {
            HaltReason::Completed => log::info!("Halting: {}", reason),
            HaltReason::Deadlock { .. } => log::warn!("Halting: {}", reason),
            HaltReason::Violation(_) => log::error!("Halting: {}", reason),
        }
        self.substrate.fatal_halt(reason.exit_status())
    }

    pub(crate) fn violation(&self, v: Violation) -> ! {
        log::error!("Contract violation by pid {}: {}", self.getpid(), v);
        self.halt(HaltReason::Violation(v))
    }

    pub(crate) fn deadlock(&self) -> ! {
        let blocked = self.critical(|st| st.blocked_count());
        self.halt(HaltReason::Deadlock { blocked })
    }

    /// Why the system halted, once it has
    pub fn halt_reason(&self) -> Option<HaltReason> {
        self.critical(|st| st.halt)
    }

    /// Context switches performed so far
    pub fn context_switches(&self) -> u64 {
        self.critical(|st| st.switches)
    }

    /// Pids queued at one priority, head first
    pub fn ready_pids(&self, priority: Priority) -> Vec<ProcessId> {
        self.critical(|st| st.ready.pids(priority))
    }

    /// Substrate tick: credit `elapsed` to the running process and rotate
    /// it behind its equal-priority peers once its quantum is used up
    pub fn quantum_tick(&self, elapsed: u64) {
        let quantum = self.config.quantum;
        let switch = self.critical(|st| {
            let running = st.current_process().ok()?;
            if let Some(p) = st.table.get_mut(running) {
                p.cpu_time += elapsed;
            }
            st.slice_used += elapsed;
            if st.slice_used < quantum {
                return None;
            }
            st.slice_used = 0;
            st.plan_switch()
        });
        self.switch(switch);
    }
}
