/*
 * Kernel Configuration
 *
 * Compile-time limits of the scheduler and the runtime knobs handed to
 * Kernel::new(). The limits size the fixed-capacity structures (process
 * table, per-process child lists, ready queues), so they are constants rather
 * than fields.
 */

/// Number of slots in the process table
pub const MAX_PROCESSES: usize = 50;

/// Capacity of a process name, terminator slot included
pub const MAX_NAME: usize = 256;

/// Capacity of a process's start arguments, terminator slot included
pub const MAX_ARG: usize = 256;

/// Lowest scheduling priority (the watchdog runs here)
pub const LOWEST_PRIORITY: u8 = 0;

/// Highest scheduling priority (the bootstrap test program runs here)
pub const HIGHEST_PRIORITY: u8 = 5;

/// Number of distinct priority levels, one ready queue each
pub const PRIORITY_LEVELS: usize = (HIGHEST_PRIORITY - LOWEST_PRIORITY) as usize + 1;

/// Smallest stack a process may be spawned with
pub const MIN_STACK_SIZE: usize = 8 * 1024;

/// Default CPU-time quantum before an equal-priority peer gets the CPU
pub const DEFAULT_QUANTUM: u64 = 80;

/// Status codes up to and including this value are reserved for the kernel.
/// Block() callers must pick a reason above it.
pub const RESERVED_STATUS_MAX: i32 = 10;

/// Name given to the program started by bootstrap
pub const DEFAULT_ENTRY_NAME: &str = "Scheduler";

/// Name of the idle/deadlock detector process
pub const WATCHDOG_NAME: &str = "watchdog";

/// Hook asking the I/O layer whether any operation is still outstanding.
///
/// The watchdog only declares a deadlock when this reports `false`.
pub type IoPendingFn = fn() -> bool;

/// There is no I/O subsystem: nothing is ever pending.
fn no_io_pending() -> bool {
    false
}

/// Runtime scheduler settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// CPU time a process may accumulate before being rotated behind its
    /// equal-priority peers
    pub quantum: u64,

    /// Minimum stack size accepted by spawn()
    pub min_stack_size: usize,

    /// Name of the program spawned by boot()
    pub entry_name: &'static str,

    /// Consulted by the watchdog before declaring a deadlock
    pub io_pending: IoPendingFn,
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self {
            quantum: DEFAULT_QUANTUM,
            min_stack_size: MIN_STACK_SIZE,
            entry_name: DEFAULT_ENTRY_NAME,
            io_pending: no_io_pending,
        }
    }

    pub fn with_quantum(mut self, quantum: u64) -> Self {
        self.quantum = quantum.max(1);
        self
    }

    pub fn with_min_stack_size(mut self, size: usize) -> Self {
        self.min_stack_size = size;
        self
    }

    pub fn with_entry_name(mut self, name: &'static str) -> Self {
        self.entry_name = name;
        self
    }

    pub fn with_io_pending(mut self, hook: IoPendingFn) -> Self {
        self.io_pending = hook;
        self
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new()
    }
}
