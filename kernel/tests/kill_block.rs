//! Kill, Block/Unblock, and the contract violations that halt the system.

mod common;

use common::{run, spawn, Trace, TEST_PROGRAM_PID};
use tkos_kernel::config::MIN_STACK_SIZE;
use tkos_kernel::scheduler::{BlockReason, ProcessFlags};
use tkos_kernel::syscall::{KILLED_EXIT_CODE, SIG_TERM};
use tkos_kernel::{HaltReason, Kernel, ProcessId, ProcessStatus, SchedError, Violation};

fn noop(_k: &Kernel, _arg: &str) -> i32 {
    0
}

#[test]
fn killed_ready_process_never_runs() {
    static TRACE: Trace = Trace::new();

    fn victim(_k: &Kernel, _arg: &str) -> i32 {
        TRACE.push("victim ran");
        0
    }

    fn program(k: &Kernel, _arg: &str) -> i32 {
        let pid = spawn(k, "victim", victim, 1);
        k.kill(pid, SIG_TERM);

        let info = k.process(pid).unwrap();
        assert_eq!(info.status, ProcessStatus::Exited);
        assert_eq!(info.exit_code, KILLED_EXIT_CODE);
        assert!(info.flags.contains(ProcessFlags::SIGNALED));
        assert!(k.ready_pids(info.priority).is_empty());
        assert_eq!(k.process(k.getpid()).unwrap().exiting_children, 1);
        assert_eq!(k.audit(), Ok(()));

        assert_eq!(k.wait(), Ok((pid, KILLED_EXIT_CODE)));
        TRACE.push("reaped");
        0
    }

    assert_eq!(run(program).1, HaltReason::Completed);
    assert_eq!(TRACE.events(), ["reaped"]);
}

#[test]
fn kill_terminates_wait_blocked_process() {
    static TRACE: Trace = Trace::new();

    fn grandchild(k: &Kernel, _arg: &str) -> i32 {
        // Orphaned when its parent was killed
        assert_eq!(k.process(k.getpid()).unwrap().parent, None);
        TRACE.push("grandchild runs");
        0
    }

    fn waiter(k: &Kernel, _arg: &str) -> i32 {
        spawn(k, "grandchild", grandchild, 1);
        TRACE.push("waiter waits");
        let _ = k.wait();
        TRACE.push("waiter resumed");
        0
    }

    fn killer(k: &Kernel, arg: &str) -> i32 {
        let target = ProcessId(arg.parse().unwrap());
        assert_eq!(
            k.process(target).unwrap().status,
            ProcessStatus::Blocked(BlockReason::WaitingForChild)
        );
        TRACE.push("killer kills");
        k.kill(target, SIG_TERM);
        TRACE.push("killer resumes");
        0
    }

    fn program(k: &Kernel, _arg: &str) -> i32 {
        let waiter_pid = spawn(k, "waiter", waiter, 3);
        let arg = waiter_pid.to_string();
        k.spawn(Some("killer"), Some(killer), Some(arg.as_str()), MIN_STACK_SIZE, 2)
            .unwrap();

        assert_eq!(k.wait(), Ok((waiter_pid, KILLED_EXIT_CODE)));
        TRACE.push("program reaped waiter");
        let (_, code) = k.wait().unwrap();
        assert_eq!(code, 0);
        // The grandchild belongs to nobody now
        assert_eq!(k.wait(), Err(SchedError::NoChildren));
        0
    }

    assert_eq!(run(program).1, HaltReason::Completed);
    assert_eq!(
        TRACE.events(),
        [
            "waiter waits",
            "killer kills",
            "program reaped waiter",
            "killer resumes",
            "grandchild runs",
        ]
    );
}

#[test]
fn kill_wakes_joining_parent() {
    fn sleeper(k: &Kernel, _arg: &str) -> i32 {
        k.block(77);
        0
    }

    fn killer(k: &Kernel, arg: &str) -> i32 {
        k.kill(ProcessId(arg.parse().unwrap()), SIG_TERM);
        0
    }

    fn program(k: &Kernel, _arg: &str) -> i32 {
        let target = spawn(k, "sleeper", sleeper, 2);
        let arg = target.to_string();
        k.spawn(Some("killer"), Some(killer), Some(arg.as_str()), MIN_STACK_SIZE, 1)
            .unwrap();

        assert_eq!(k.join(target), KILLED_EXIT_CODE);
        assert!(k.wait().is_ok());
        0
    }

    assert_eq!(run(program).1, HaltReason::Completed);
}

#[test]
fn self_kill_never_returns() {
    static TRACE: Trace = Trace::new();

    fn suicidal(k: &Kernel, _arg: &str) -> i32 {
        TRACE.push("before kill");
        k.kill(k.getpid(), SIG_TERM);
        TRACE.push("after kill");
        0
    }

    fn program(k: &Kernel, _arg: &str) -> i32 {
        let pid = spawn(k, "suicidal", suicidal, 5);
        assert_eq!(k.wait(), Ok((pid, KILLED_EXIT_CODE)));
        0
    }

    assert_eq!(run(program).1, HaltReason::Completed);
    assert_eq!(TRACE.events(), ["before kill"]);
}

#[test]
fn block_and_unblock_round_trip() {
    static TRACE: Trace = Trace::new();

    fn sleeper(k: &Kernel, _arg: &str) -> i32 {
        TRACE.push("sleeper blocks");
        k.block(42);
        TRACE.push("sleeper woken");
        0
    }

    fn program(k: &Kernel, _arg: &str) -> i32 {
        // Equal priority: the sleeper runs as soon as it is spawned
        let pid = spawn(k, "sleeper", sleeper, 5);
        let info = k.process(pid).unwrap();
        assert_eq!(info.status, ProcessStatus::Blocked(BlockReason::Other(42)));
        assert_eq!(info.status.code(), 42);

        TRACE.push("program unblocks");
        assert_eq!(k.unblock(pid), Ok(()));
        TRACE.push("program resumes");
        assert_eq!(k.unblock(pid), Err(SchedError::NotBlocked));
        assert_eq!(k.unblock(ProcessId(999)), Err(SchedError::NotBlocked));
        assert_eq!(k.wait(), Ok((pid, 0)));
        0
    }

    assert_eq!(run(program).1, HaltReason::Completed);
    assert_eq!(
        TRACE.events(),
        ["sleeper blocks", "program unblocks", "sleeper woken", "program resumes"]
    );
}

#[test]
fn unblock_leaves_wait_blocked_process_alone() {
    fn child(k: &Kernel, _arg: &str) -> i32 {
        let parent = k.process(k.process(k.getpid()).unwrap().parent.unwrap()).unwrap();
        assert_eq!(k.unblock(parent.pid), Err(SchedError::NotBlocked));
        0
    }

    fn program(k: &Kernel, _arg: &str) -> i32 {
        spawn(k, "child", child, 1);
        k.wait().unwrap();
        0
    }

    assert_eq!(run(program).1, HaltReason::Completed);
}

fn expect_violation(entry: tkos_kernel::EntryPoint, violation: Violation) {
    let (kernel, reason) = run(entry);
    assert_eq!(reason, HaltReason::Violation(violation));
    assert_eq!(reason.exit_status(), 100 + violation.index());
    assert_eq!(kernel.halt_reason(), Some(reason));
}

#[test]
fn unsupported_signal_halts() {
    fn program(k: &Kernel, _arg: &str) -> i32 {
        let pid = spawn(k, "target", noop, 1);
        k.kill(pid, 9);
        0
    }
    expect_violation(program, Violation::UnsupportedSignal);
}

#[test]
fn kill_of_unknown_pid_halts() {
    fn program(k: &Kernel, _arg: &str) -> i32 {
        k.kill(ProcessId(999), SIG_TERM);
        0
    }
    expect_violation(program, Violation::KillNoSuchProcess);
}

#[test]
fn kill_of_exited_process_halts() {
    fn program(k: &Kernel, _arg: &str) -> i32 {
        let pid = spawn(k, "done", noop, 5);
        k.kill(pid, SIG_TERM);
        0
    }
    expect_violation(program, Violation::KillNoSuchProcess);
}

#[test]
fn reserved_block_reason_halts() {
    fn program(k: &Kernel, _arg: &str) -> i32 {
        k.block(10);
        0
    }
    expect_violation(program, Violation::ReservedBlockReason);
}

#[test]
fn join_self_halts() {
    fn program(k: &Kernel, _arg: &str) -> i32 {
        k.join(k.getpid());
        0
    }
    expect_violation(program, Violation::JoinSelf);
}

#[test]
fn join_parent_halts() {
    fn child(k: &Kernel, _arg: &str) -> i32 {
        k.join(TEST_PROGRAM_PID);
        0
    }

    fn program(k: &Kernel, _arg: &str) -> i32 {
        spawn(k, "child", child, 5);
        0
    }
    expect_violation(program, Violation::JoinParent);
}

#[test]
fn join_non_child_halts() {
    fn program(k: &Kernel, _arg: &str) -> i32 {
        // pid 1 is the watchdog, not our child
        k.join(ProcessId(1));
        0
    }
    expect_violation(program, Violation::JoinNotChild);
}

#[test]
fn oversized_argument_halts() {
    fn program(k: &Kernel, _arg: &str) -> i32 {
        let arg = "a".repeat(256);
        let _ = k.spawn(Some("x"), Some(noop), Some(arg.as_str()), MIN_STACK_SIZE, 1);
        0
    }
    expect_violation(program, Violation::ArgumentTooLong);
}
