/*
 * Hosted Execution Substrate
 *
 * Runs the kernel on a host OS. Every execution context is an OS thread, but
 * only one of them is ever allowed to make progress: each context owns a
 * baton, and a thread runs only while holding its own.
 *
 * BATON PASSING:
 * =============
 *
 * switch_to(from, to) hands the baton to `to` and then parks `from` until its
 * baton comes back. The boot thread has no baton; it parks until the system
 * halts.
 *
 *   ctx A (running)            ctx B (parked)
 *   switch_to(A, B) ---------> wakes, runs
 *   parked <------------------ switch_to(B, A)
 *   runs
 *
 * STOPPING:
 * ========
 *
 * force_stop() marks a context stopped and wakes it. A parked thread that
 * finds itself stopped unwinds with a private payload that its thread body
 * swallows, so a killed process vanishes without running another instruction
 * of its own code. fatal_halt() stops every context.
 *
 * release_context() also drops the substrate's reference to the context,
 * leaving an empty entry so handles stay stable.
 *
 * There is no timer: nothing preempts a running thread from outside. A
 * process gives up its quantum by calling Kernel::quantum_tick().
 *
 * A panic inside a process (a failed assertion in a test program, say) halts
 * the system too; the payload is re-raised on the boot thread once it wakes.
 */

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Instant;

use super::{ContextError, ContextHandle, ExecutionSubstrate, Launch};

/// Host threads never get less stack than this
pub const HOSTED_MIN_THREAD_STACK: usize = 512 * 1024;

/// Halt status recorded when a process panics
const PANIC_STATUS: i32 = -1;

thread_local! {
    /// Context owned by the calling thread; None on the boot thread
    static CURRENT: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Unwind payload of a stopped context
struct Stopped;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Baton {
    granted: bool,
    stopped: bool,
}

#[derive(Default)]
struct HostedContext {
    baton: Mutex<Baton>,
    cond: Condvar,
}

impl HostedContext {
    /// Park until granted the baton. Returns false if stopped instead.
    fn wait_turn(&self) -> bool {
        let mut baton = lock(&self.baton);
        while !baton.granted && !baton.stopped {
            baton = self.cond.wait(baton).unwrap_or_else(PoisonError::into_inner);
        }
        if baton.stopped {
            return false;
        }
        baton.granted = false;
        true
    }

    fn grant(&self) {
        lock(&self.baton).granted = true;
        self.cond.notify_all();
    }

    fn stop(&self) {
        lock(&self.baton).stopped = true;
        self.cond.notify_all();
    }
}

#[derive(Default)]
struct HaltState {
    status: Option<i32>,
    panic: Option<Box<dyn Any + Send>>,
}

#[derive(Default)]
struct Shared {
    /// Indexed by handle; None once released
    contexts: Mutex<Vec<Option<Arc<HostedContext>>>>,
    halt: Mutex<HaltState>,
    halted: Condvar,
}

impl Shared {
    fn context(&self, handle: ContextHandle) -> Option<Arc<HostedContext>> {
        lock(&self.contexts).get(handle.0).cloned().flatten()
    }

    /// Record the first halt status and stop every context
    fn halt(&self, status: i32) {
        {
            let mut state = lock(&self.halt);
            state.status.get_or_insert(status);
        }
        let contexts: Vec<Arc<HostedContext>> =
            lock(&self.contexts).iter().flatten().cloned().collect();
        for ctx in contexts {
            ctx.stop();
        }
        self.halted.notify_all();
    }

    fn record_panic(&self, payload: Box<dyn Any + Send>) {
        let mut state = lock(&self.halt);
        if state.panic.is_none() {
            state.panic = Some(payload);
        }
    }

    /// Park the boot thread until halt; hands back a process panic, if any
    fn wait_for_halt(&self) -> Option<Box<dyn Any + Send>> {
        let mut state = lock(&self.halt);
        while state.status.is_none() {
            state = self.halted.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        state.panic.take()
    }
}

/// Thread-per-context substrate for running the kernel on a host
pub struct HostedSubstrate {
    shared: Arc<Shared>,
    epoch: Instant,
}

impl HostedSubstrate {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            epoch: Instant::now(),
        }
    }

    /// Status passed to fatal_halt(), once halted
    pub fn halt_status(&self) -> Option<i32> {
        lock(&self.shared.halt).status
    }

    /// Number of contexts created so far
    pub fn contexts_created(&self) -> usize {
        lock(&self.shared.contexts).len()
    }

    /// Number of contexts not yet released
    pub fn live_contexts(&self) -> usize {
        lock(&self.shared.contexts).iter().flatten().count()
    }

    fn unwind_stopped() -> ! {
        panic::resume_unwind(Box::new(Stopped))
    }
}

impl Default for HostedSubstrate {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionSubstrate for HostedSubstrate {
    fn init_context(
        &self,
        launch: Launch,
        stack_size: usize,
    ) -> Result<ContextHandle, ContextError> {
        let ctx = Arc::new(HostedContext::default());
        let index = {
            let mut contexts = lock(&self.shared.contexts);
            contexts.push(Some(ctx.clone()));
            contexts.len() - 1
        };

        let shared = self.shared.clone();
        let body_ctx = ctx.clone();
        let spawned = thread::Builder::new()
            .name(std::format!("ctx-{}", index))
            .stack_size(stack_size.max(HOSTED_MIN_THREAD_STACK))
            .spawn(move || {
                CURRENT.with(|c| c.set(Some(index)));
                if !body_ctx.wait_turn() {
                    return;
                }
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(launch)) {
                    if !payload.is::<Stopped>() {
                        shared.record_panic(payload);
                        shared.halt(PANIC_STATUS);
                    }
                }
            });

        match spawned {
            Ok(_) => Ok(ContextHandle(index)),
            Err(err) => {
                log::warn!("hosted: failed to spawn context thread: {}", err);
                ctx.stop();
                Err(ContextError::SpawnFailed)
            }
        }
    }

    fn switch_to(&self, from: Option<ContextHandle>, to: ContextHandle) {
        if let Some(target) = self.shared.context(to) {
            target.grant();
        }

        match from {
            Some(handle) => {
                let resumed = self
                    .shared
                    .context(handle)
                    .map(|me| me.wait_turn())
                    .unwrap_or(false);
                if !resumed {
                    Self::unwind_stopped();
                }
            }
            None => {
                if let Some(payload) = self.shared.wait_for_halt() {
                    panic::resume_unwind(payload);
                }
            }
        }
    }

    fn force_stop(&self, ctx: ContextHandle) {
        if let Some(target) = self.shared.context(ctx) {
            target.stop();
        }
    }

    fn release_context(&self, ctx: ContextHandle) {
        let released = lock(&self.shared.contexts)
            .get_mut(ctx.0)
            .and_then(Option::take);
        if let Some(target) = released {
            target.stop();
        }
    }

    fn monotonic_clock(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    fn fatal_halt(&self, status: i32) -> ! {
        self.shared.halt(status);
        if CURRENT.with(|c| c.get()).is_some() {
            Self::unwind_stopped();
        }
        panic!("system halted with status {}", status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_contexts_run_one_at_a_time() {
        static STEPS: AtomicUsize = AtomicUsize::new(0);

        let substrate = Arc::new(HostedSubstrate::new());
        let s = substrate.clone();
        let a = substrate
            .init_context(
                Box::new(move || {
                    STEPS.fetch_add(1, Ordering::SeqCst);
                    s.fatal_halt(0);
                }),
                0,
            )
            .unwrap();

        substrate.switch_to(None, a);
        assert_eq!(STEPS.load(Ordering::SeqCst), 1);
        assert_eq!(substrate.halt_status(), Some(0));
    }

    #[test]
    fn test_stopped_context_never_runs() {
        static RAN: AtomicUsize = AtomicUsize::new(0);

        let substrate = Arc::new(HostedSubstrate::new());
        let victim = substrate
            .init_context(
                Box::new(|| {
                    RAN.fetch_add(1, Ordering::SeqCst);
                }),
                0,
            )
            .unwrap();
        substrate.force_stop(victim);

        let s = substrate.clone();
        let halter = substrate
            .init_context(Box::new(move || { s.fatal_halt(1); }), 0)
            .unwrap();
        substrate.switch_to(None, halter);

        assert_eq!(RAN.load(Ordering::SeqCst), 0);
        assert_eq!(substrate.halt_status(), Some(1));
        assert_eq!(substrate.contexts_created(), 2);
    }

    #[test]
    fn test_process_panic_reaches_boot_thread() {
        let substrate = Arc::new(HostedSubstrate::new());
        let ctx = substrate
            .init_context(Box::new(|| { panic::panic_any(7usize); }), 0)
            .unwrap();

        let result = panic::catch_unwind(AssertUnwindSafe(|| substrate.switch_to(None, ctx)));
        let payload = result.unwrap_err();
        assert_eq!(payload.downcast_ref::<usize>(), Some(&7));
        assert_eq!(substrate.halt_status(), Some(PANIC_STATUS));
    }

    #[test]
    fn test_release_drops_context() {
        let substrate = Arc::new(HostedSubstrate::new());
        let done = substrate.init_context(Box::new(|| {}), 0).unwrap();
        let s = substrate.clone();
        let halter = substrate
            .init_context(Box::new(move || { s.fatal_halt(0); }), 0)
            .unwrap();

        substrate.release_context(done);
        substrate.release_context(done);
        assert_eq!(substrate.live_contexts(), 1);
        assert_eq!(substrate.contexts_created(), 2);

        substrate.switch_to(None, halter);
        assert_eq!(substrate.halt_status(), Some(0));
        // Handles are not reused
        assert_eq!(halter, ContextHandle(1));
    }
}
