/*
 * Execution Substrate
 *
 * The scheduler decides WHO runs; the substrate makes it happen. This trait
 * is the whole mechanism interface the kernel needs:
 *
 * - Creating an execution context that will run a launch closure
 * - Switching the CPU from one context to another
 * - Forcibly stopping a context (Kill, reaping)
 * - A monotonic clock
 * - Halting the whole system
 * - Masking the periodic tick around critical sections
 *
 * The kernel never inspects a context; it only stores the handle issued by
 * init_context() and passes it back. The periodic quantum notification flows
 * the other way: a substrate with a timer calls Kernel::quantum_tick() on
 * behalf of the running process.
 *
 * Implementations:
 * - hosted::HostedSubstrate (feature "std"): one OS thread per context. It
 *   has no timer, so processes account their own CPU use by calling
 *   Kernel::quantum_tick() themselves.
 *
 * Why this is important:
 * - The scheduler core stays free of architecture code
 * - The same kernel runs on bare metal or, through the hosted substrate, in
 *   ordinary host tests
 */

use alloc::boxed::Box;
use core::fmt;

#[cfg(feature = "std")]
pub mod hosted;

#[cfg(feature = "std")]
pub use hosted::HostedSubstrate;

/// Code a context runs when it is first switched to
pub type Launch = Box<dyn FnOnce() + Send + 'static>;

/// Opaque handle to an execution context, issued by the substrate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle(pub usize);

/// Context creation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    /// The host refused to create the context
    SpawnFailed,
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::SpawnFailed => write!(f, "Context creation failed"),
        }
    }
}

/// Mechanism interface consumed by the kernel
pub trait ExecutionSubstrate: Send + Sync {
    /// Create a suspended context that runs `launch` on first resume
    fn init_context(&self, launch: Launch, stack_size: usize)
        -> Result<ContextHandle, ContextError>;

    /// Suspend the calling context and resume `to`
    ///
    /// `from` is None when the caller is the boot context, which waits until
    /// the system halts. Otherwise returns once some later switch names
    /// `from` as its target.
    ///
    /// A context that has already been stopped (including by its own
    /// release_context() just before switching) never returns from here.
    fn switch_to(&self, from: Option<ContextHandle>, to: ContextHandle);

    /// Stop a context so it never runs again. Idempotent.
    fn force_stop(&self, ctx: ContextHandle);

    /// Give a context back once its process is gone
    fn release_context(&self, ctx: ContextHandle) {
        self.force_stop(ctx)
    }

    /// Monotonic timestamp
    fn monotonic_clock(&self) -> u64;

    /// Stop the whole system with `status`; never returns to the caller
    fn fatal_halt(&self, status: i32) -> !;

    /// Mask the periodic tick. Returns whether it was enabled.
    fn disable_interrupts(&self) -> bool {
        false
    }

    /// Restore the mask saved by disable_interrupts()
    fn restore_interrupts(&self, _was_enabled: bool) {}
}
