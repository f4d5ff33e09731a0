/*
 * System Call Layer
 *
 * The process-facing interface of the kernel. Every call is a method on
 * Kernel taking the caller implicitly: the process currently RUNNING.
 *
 * Process management:
 * - spawn:   create a child process and make it READY
 * - exit:    finish the caller; its parent may reap the exit code
 * - wait:    reap any exited child, blocking until one exits
 * - join:    reap one specific child, blocking until it exits
 * - kill:    terminate another process (or the caller) at once
 *
 * Blocking:
 * - block:   suspend the caller for a caller-defined reason
 * - unblock: make a process suspended by block() READY again
 *
 * Bookkeeping:
 * - getpid, signaled, read_time, read_clock, display_process_table
 *
 * Each call follows the same shape: validate and mutate inside one critical
 * section, let the dispatcher decide, leave the critical section, then switch
 * if needed. Contract violations are detected under the lock but the halt is
 * raised after it is released.
 *
 * Why this is important:
 * - It is the whole interface processes use to create, reap and stop each other
 * - Every exit path frees what the caller can no longer reap, so the table
 *   does not fill with unreapable processes
 */

use alloc::boxed::Box;
use alloc::vec::Vec;

pub mod error;
pub mod numbers;

pub use error::{HaltReason, SchedError, Violation};
pub use numbers::{KILLED_EXIT_CODE, SIG_TERM};

use crate::scheduler::{
    BlockReason, EntryPoint, Kernel, Priority, ProcRef, ProcessFlags, ProcessId,
    ProcessStatus, SchedState, Switch,
};
use crate::scheduler::process::{ProcessName, StartArgs};
use crate::substrate::{ContextHandle, Launch};

/// Outcome of one pass through a reaping call (wait/join)
enum Reap {
    /// A child was reaped
    Done {
        pid: ProcessId,
        code: i32,
        context: Option<ContextHandle>,
    },
    /// Nothing to reap; the caller blocked
    Blocked(Option<Switch>),
    /// Nothing to reap and nothing to wait for
    NoChildren,
}

impl SchedState {
    /// Move a process to EXITED and hand it to its parent for reaping.
    ///
    /// Its own exited, unreaped children can never be waited for again, so
    /// they are freed here. A process without a parent is freed on the spot.
    /// Every context freed along the way is pushed to `released` for the
    /// caller to release after leaving the critical section. Returns whether
    /// the process's own slot was freed.
    fn retire(&mut self, handle: ProcRef, code: i32, released: &mut Vec<ContextHandle>) -> bool {
        while let Some(child) = self
            .table
            .get_mut(handle)
            .and_then(|p| p.exiting_children.pop_front())
        {
            if let Some((_, _, Some(ctx))) = self.reap(child) {
                released.push(ctx);
            }
        }

        let Some(p) = self.table.get_mut(handle) else {
            return false;
        };
        p.exit_code = if p.flags.contains(ProcessFlags::SIGNALED) {
            KILLED_EXIT_CODE
        } else {
            code
        };
        p.status = ProcessStatus::Exited;
        let parent = p.parent;

        let wake = match parent.and_then(|h| self.table.get_mut(h)) {
            Some(pp) => {
                pp.remove_child(handle.pid);
                pp.push_exited(handle);
                match pp.status {
                    ProcessStatus::Blocked(BlockReason::WaitingForChild) => true,
                    ProcessStatus::Blocked(BlockReason::JoiningChild(pid)) => pid == handle.pid,
                    _ => false,
                }
            }
            None => {
                released.extend(self.table.free(handle.slot));
                return true;
            }
        };

        if let (true, Some(parent)) = (wake, parent) {
            self.make_ready(parent);
        }
        false
    }

    /// Free an exited child's slot. Returns its pid, exit code and context.
    fn reap(&mut self, child: ProcRef) -> Option<(ProcessId, i32, Option<ContextHandle>)> {
        let code = self.table.get(child)?.exit_code;
        let context = self.table.free(child.slot);
        Some((child.pid, code, context))
    }
}

impl Kernel {
    /// Create a child of the caller.
    ///
    /// Validation order: name present, name length, entry point present,
    /// stack size, priority, then table space. Oversized start arguments are
    /// a contract violation and halt the system.
    ///
    /// The child is READY on return unless it outranked the caller, in which
    /// case it has already run until it blocked, exited or was preempted.
    /// During boot the child is only queued.
    pub fn spawn(
        &self,
        name: Option<&str>,
        entry: Option<EntryPoint>,
        arg: Option<&str>,
        stack_size: usize,
        priority: i32,
    ) -> Result<ProcessId, SchedError> {
        self.spawn_process(name, entry, arg, stack_size, priority, ProcessFlags::empty())
    }

    pub(crate) fn spawn_process(
        &self,
        name: Option<&str>,
        entry: Option<EntryPoint>,
        arg: Option<&str>,
        stack_size: usize,
        priority: i32,
        flags: ProcessFlags,
    ) -> Result<ProcessId, SchedError> {
        let name = name.ok_or(SchedError::NullName)?;
        let mut proc_name = ProcessName::new();
        proc_name
            .push_str(name)
            .map_err(|_| SchedError::NameTooLong)?;
        let entry = entry.ok_or(SchedError::NullEntryPoint)?;
        if stack_size < self.config().min_stack_size {
            return Err(SchedError::StackTooSmall);
        }
        let priority = Priority::new(priority).ok_or(SchedError::InvalidPriority)?;
        let mut start_args = StartArgs::new();
        if start_args.push_str(arg.unwrap_or("")).is_err() {
            self.violation(Violation::ArgumentTooLong);
        }

        let kernel = self.handle().ok_or(SchedError::ContextUnavailable)?;
        let substrate = self.substrate();

        let (pid, switch) = self.critical(move |st| -> Result<_, SchedError> {
            let parent = st.current_process().ok();
            let handle = st.table.allocate().ok_or(SchedError::TableFull)?;

            let launch: Launch = Box::new(move || {
                kernel.launch(handle);
            });
            let context = match substrate.init_context(launch, stack_size) {
                Ok(ctx) => ctx,
                Err(err) => {
                    log::warn!("spawn: no context for '{}': {}", proc_name, err);
                    st.table.free(handle.slot);
                    return Err(SchedError::ContextUnavailable);
                }
            };

            log::debug!(
                "spawn: pid {} '{}' priority {} parent {:?}",
                handle.pid,
                proc_name,
                priority,
                parent.map(|p| p.pid.0)
            );

            let p = st.table.slot_mut(handle.slot);
            p.name = proc_name;
            p.start_args = start_args;
            p.priority = priority;
            p.status = ProcessStatus::Ready;
            p.flags = flags;
            p.parent = parent;
            p.entry_point = Some(entry);
            p.stack_size = stack_size;
            p.context = Some(context);
            p.exit_code = 0;
            p.cpu_time = 0;

            if let Some(pp) = parent.and_then(|h| st.table.get_mut(h)) {
                pp.add_child(handle);
            }
            st.make_ready(handle);

            let switch = if st.booting { None } else { st.plan_switch() };
            Ok((handle.pid, switch))
        })?;

        self.switch(switch);
        Ok(pid)
    }

    /// First code run by every process: call its entry point with its start
    /// arguments and exit with the result
    fn launch(&self, me: ProcRef) -> ! {
        let start = self.critical(|st| {
            let p = st.table.get(me)?;
            let entry = p.entry_point?;
            Some((entry, alloc::string::String::from(p.start_args.as_str())))
        });

        let code = match start {
            Some((entry, args)) => entry(self, &args),
            None => 0,
        };
        self.exit(code)
    }

    /// Finish the caller with `code`. Never returns.
    ///
    /// Exiting with live children is a contract violation. Children that
    /// already exited but were never reaped are freed.
    pub fn exit(&self, code: i32) -> ! {
        let outcome = self.critical(|st| -> Result<_, Violation> {
            let me = st.current_process()?;
            let p = st.table.get(me).ok_or(Violation::NoCurrentProcess)?;
            if !p.active_children.is_empty() {
                return Err(Violation::ExitWithActiveChildren);
            }
            let exit_code = if p.flags.contains(ProcessFlags::SIGNALED) {
                KILLED_EXIT_CODE
            } else {
                code
            };
            let mut released = Vec::new();
            st.retire(me, code, &mut released);
            Ok((me, exit_code, released, st.plan_switch()))
        });

        let (me, exit_code, released, switch) = match outcome {
            Ok(v) => v,
            Err(v) => self.violation(v),
        };
        log::debug!("exit: pid {} code {}", me.pid, exit_code);

        // Includes our own context when nobody will reap us
        for ctx in released {
            self.substrate().release_context(ctx);
        }
        self.switch(switch);
        self.deadlock()
    }

    /// Reap any exited child, oldest exit first.
    ///
    /// Blocks while children are alive but none has exited. Fails with
    /// NoChildren, without blocking, if the caller has no unreaped children.
    pub fn wait(&self) -> Result<(ProcessId, i32), SchedError> {
        loop {
            let step = self.critical(|st| -> Result<Reap, Violation> {
                let me = st.current_process()?;

                while let Some(child) = st
                    .table
                    .get_mut(me)
                    .and_then(|p| p.exiting_children.pop_front())
                {
                    if let Some((pid, code, context)) = st.reap(child) {
                        return Ok(Reap::Done { pid, code, context });
                    }
                }

                let p = st.table.get_mut(me).ok_or(Violation::NoCurrentProcess)?;
                if p.active_children.is_empty() {
                    return Ok(Reap::NoChildren);
                }
                p.status = ProcessStatus::Blocked(BlockReason::WaitingForChild);
                Ok(Reap::Blocked(st.plan_switch()))
            });

            match step {
                Ok(Reap::Done { pid, code, context }) => {
                    if let Some(ctx) = context {
                        self.substrate().release_context(ctx);
                    }
                    log::debug!("wait: pid {} reaped child {} (code {})", self.getpid(), pid, code);
                    return Ok((pid, code));
                }
                Ok(Reap::NoChildren) => return Err(SchedError::NoChildren),
                Ok(Reap::Blocked(switch)) => self.suspend(switch),
                Err(v) => self.violation(v),
            }
        }
    }

    /// Reap the child `pid`, blocking until it exits. Returns its exit code.
    ///
    /// Joining oneself, one's parent, or a process that is not a live or
    /// exited-but-unreaped child is a contract violation.
    pub fn join(&self, pid: ProcessId) -> i32 {
        loop {
            let step = self.critical(|st| -> Result<Reap, Violation> {
                let me = st.current_process()?;
                let p = st.table.get_mut(me).ok_or(Violation::NoCurrentProcess)?;

                if pid == me.pid {
                    return Err(Violation::JoinSelf);
                }
                if p.parent.map(|h| h.pid) == Some(pid) {
                    return Err(Violation::JoinParent);
                }
                let exited = p.take_exited(pid);
                let active = p.has_active_child(pid);

                match exited {
                    Some(child) => {
                        let (pid, code, context) =
                            st.reap(child).ok_or(Violation::JoinNotChild)?;
                        Ok(Reap::Done { pid, code, context })
                    }
                    None if active => {
                        p.status = ProcessStatus::Blocked(BlockReason::JoiningChild(pid));
                        Ok(Reap::Blocked(st.plan_switch()))
                    }
                    None => Err(Violation::JoinNotChild),
                }
            });

            match step {
                Ok(Reap::Done { pid, code, context }) => {
                    if let Some(ctx) = context {
                        self.substrate().release_context(ctx);
                    }
                    log::debug!("join: pid {} reaped child {} (code {})", self.getpid(), pid, code);
                    return code;
                }
                Ok(Reap::Blocked(switch)) => self.suspend(switch),
                Ok(Reap::NoChildren) => self.violation(Violation::JoinNotChild),
                Err(v) => self.violation(v),
            }
        }
    }

    /// Terminate `pid` with `signal`, which must be SIG_TERM.
    ///
    /// The target is stopped wherever it is: ready, running or blocked. It
    /// exits with KILLED_EXIT_CODE and its parent can reap it as usual. Its
    /// live children lose their parent; its exited children are freed.
    /// Killing the caller never returns.
    pub fn kill(&self, pid: ProcessId, signal: i32) {
        let outcome = self.critical(|st| -> Result<_, Violation> {
            if signal != SIG_TERM {
                return Err(Violation::UnsupportedSignal);
            }
            let target = st
                .table
                .lookup(pid)
                .filter(|h| st.table.get(*h).map_or(false, |p| p.status.is_live()))
                .ok_or(Violation::KillNoSuchProcess)?;
            let caller = st.current_process().ok();

            let p = st.table.get_mut(target).ok_or(Violation::KillNoSuchProcess)?;
            p.flags |= ProcessFlags::SIGNALED;
            let was = p.status;
            let priority = p.priority;
            let context = p.context;
            let orphans = core::mem::take(&mut p.active_children);

            if was == ProcessStatus::Ready {
                st.ready.remove(priority, pid);
            }
            for child in orphans.iter() {
                if let Some(c) = st.table.get_mut(*child) {
                    c.parent = None;
                }
            }

            let mut released = Vec::new();
            let freed = st.retire(target, KILLED_EXIT_CODE, &mut released);
            let self_kill = caller == Some(target);
            Ok((was, context, freed, released, self_kill, st.plan_switch()))
        });

        let (was, context, freed, released, self_kill, switch) = match outcome {
            Ok(v) => v,
            Err(v) => self.violation(v),
        };
        log::info!("kill: pid {} terminated (was {:?})", pid, was);

        for ctx in released {
            self.substrate().release_context(ctx);
        }
        // A target awaiting its reaper keeps its context until then
        if let (false, Some(ctx)) = (freed, context) {
            self.substrate().force_stop(ctx);
        }
        self.switch(switch);
        if self_kill {
            self.deadlock();
        }
    }

    /// Suspend the caller until another process unblocks it.
    ///
    /// `reason` must be above the reserved status range; it is reported as
    /// the caller's status while blocked.
    pub fn block(&self, reason: i32) {
        let switch = self.critical(|st| -> Result<Option<Switch>, Violation> {
            let reason = BlockReason::user(reason).ok_or(Violation::ReservedBlockReason)?;
            let me = st.current_process()?;
            if let Some(p) = st.table.get_mut(me) {
                p.status = ProcessStatus::Blocked(reason);
            }
            log::debug!("block: pid {} reason {}", me.pid, reason.code());
            Ok(st.plan_switch())
        });

        match switch {
            Ok(switch) => self.suspend(switch),
            Err(v) => self.violation(v),
        }
    }

    /// Make a process suspended by block() READY again.
    ///
    /// Processes blocked inside wait() or join() are not affected; they are
    /// woken by their children. A woken process of higher priority than the
    /// caller runs immediately.
    pub fn unblock(&self, pid: ProcessId) -> Result<(), SchedError> {
        let switch = self.critical(|st| -> Result<Option<Switch>, SchedError> {
            let target = st
                .table
                .lookup(pid)
                .filter(|h| {
                    matches!(
                        st.table.get(*h).map(|p| p.status),
                        Some(ProcessStatus::Blocked(BlockReason::Other(_)))
                    )
                })
                .ok_or(SchedError::NotBlocked)?;
            st.make_ready(target);
            log::debug!("unblock: pid {}", pid);
            Ok(st.plan_switch())
        })?;

        self.switch(switch);
        Ok(())
    }

    /// Pid of the caller; ProcessId::NONE outside any process
    pub fn getpid(&self) -> ProcessId {
        self.critical(|st| st.current_process().map(|c| c.pid).unwrap_or(ProcessId::NONE))
    }

    /// Whether a terminate signal has been delivered to the caller
    pub fn signaled(&self) -> bool {
        self.critical(|st| {
            st.current_process()
                .ok()
                .and_then(|c| st.table.get(c))
                .map_or(false, |p| p.flags.contains(ProcessFlags::SIGNALED))
        })
    }

    /// CPU time credited to the caller
    pub fn read_time(&self) -> u64 {
        self.critical(|st| {
            st.current_process()
                .ok()
                .and_then(|c| st.table.get(c))
                .map_or(0, |p| p.cpu_time)
        })
    }

    /// Substrate monotonic clock
    pub fn read_clock(&self) -> u64 {
        self.substrate().monotonic_clock()
    }
}
