/*
 * System Call Errors
 *
 * Two classes of failure leave the system-call layer:
 *
 * - SchedError: recoverable. Returned to the caller, who may retry or carry
 *   on. Each variant maps to a distinct negative code.
 * - Violation: a broken usage contract. The system cannot continue; the
 *   kernel records HaltReason::Violation and halts through the substrate.
 *
 * HaltReason describes why a system stopped, including the two normal ends
 * detected by the watchdog.
 */

use core::fmt;

use super::numbers::*;

/// Recoverable system-call failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// Spawn without a name
    NullName,
    /// Spawn name longer than MAX_NAME - 1 bytes
    NameTooLong,
    /// Spawn without an entry point
    NullEntryPoint,
    /// Wait with no unreaped children
    NoChildren,
    /// Spawn stack below the configured minimum
    StackTooSmall,
    /// Spawn priority outside [LOWEST_PRIORITY, HIGHEST_PRIORITY]
    InvalidPriority,
    /// Every process-table slot is in use
    TableFull,
    /// Unblock target is not blocked for a caller-defined reason
    NotBlocked,
    /// The substrate failed to create an execution context
    ContextUnavailable,
}

impl SchedError {
    /// Negative code for the raw syscall interface
    pub fn code(self) -> i32 {
        match self {
            SchedError::NullName => ENULLNAME,
            SchedError::NameTooLong => ENAMETOOLONG,
            SchedError::NullEntryPoint => ENULLENTRY,
            SchedError::NoChildren => ENOCHILDREN,
            SchedError::StackTooSmall => ESTACK,
            SchedError::InvalidPriority => EPRIORITY,
            SchedError::TableFull => ETABLEFULL,
            SchedError::NotBlocked => ENOTBLOCKED,
            SchedError::ContextUnavailable => ECONTEXT,
        }
    }
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::NullName => write!(f, "Process name missing"),
            SchedError::NameTooLong => write!(f, "Process name too long"),
            SchedError::NullEntryPoint => write!(f, "Entry point missing"),
            SchedError::NoChildren => write!(f, "No children to wait for"),
            SchedError::StackTooSmall => write!(f, "Stack size below minimum"),
            SchedError::InvalidPriority => write!(f, "Priority out of range"),
            SchedError::TableFull => write!(f, "Process table full"),
            SchedError::NotBlocked => write!(f, "Process not blocked"),
            SchedError::ContextUnavailable => write!(f, "Execution context unavailable"),
        }
    }
}

/// Contract violation; halts the system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// Exit while live children remain
    ExitWithActiveChildren,
    /// Join on the caller's own pid
    JoinSelf,
    /// Join on the caller's parent
    JoinParent,
    /// Join on a pid that is not a live or unreaped child
    JoinNotChild,
    /// Kill with a signal other than SIG_TERM
    UnsupportedSignal,
    /// Kill of a pid that is not ready, running or blocked
    KillNoSuchProcess,
    /// Block with a reason inside the reserved status range
    ReservedBlockReason,
    /// Spawn arguments longer than MAX_ARG - 1 bytes
    ArgumentTooLong,
    /// Process-only call made with no process running
    NoCurrentProcess,
}

impl Violation {
    /// Position of the variant, used to derive the halt status
    pub fn index(self) -> i32 {
        match self {
            Violation::ExitWithActiveChildren => 0,
            Violation::JoinSelf => 1,
            Violation::JoinParent => 2,
            Violation::JoinNotChild => 3,
            Violation::UnsupportedSignal => 4,
            Violation::KillNoSuchProcess => 5,
            Violation::ReservedBlockReason => 6,
            Violation::ArgumentTooLong => 7,
            Violation::NoCurrentProcess => 8,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::ExitWithActiveChildren => write!(f, "Exit with active children"),
            Violation::JoinSelf => write!(f, "Join on self"),
            Violation::JoinParent => write!(f, "Join on parent"),
            Violation::JoinNotChild => write!(f, "Join on a process that is not a child"),
            Violation::UnsupportedSignal => write!(f, "Unsupported signal"),
            Violation::KillNoSuchProcess => write!(f, "Kill of a process that is not live"),
            Violation::ReservedBlockReason => write!(f, "Block with a reserved reason"),
            Violation::ArgumentTooLong => write!(f, "Start arguments too long"),
            Violation::NoCurrentProcess => write!(f, "No current process"),
        }
    }
}

/// Why the system stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// Only the watchdog was left
    Completed,
    /// Every remaining process was blocked with no I/O pending
    Deadlock { blocked: usize },
    /// A system call broke its contract
    Violation(Violation),
}

impl HaltReason {
    /// Status handed to the substrate's fatal_halt()
    pub fn exit_status(self) -> i32 {
        match self {
            HaltReason::Completed => HALT_COMPLETED,
            HaltReason::Deadlock { .. } => HALT_DEADLOCK,
            HaltReason::Violation(v) => HALT_VIOLATION_BASE + v.index(),
        }
    }
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::Completed => write!(f, "All processes completed"),
            HaltReason::Deadlock { blocked } => {
                write!(f, "Deadlock: {} process(es) blocked", blocked)
            }
            HaltReason::Violation(v) => write!(f, "Contract violation: {}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_error_codes_are_distinct_and_negative() {
        let all = [
            SchedError::NullName,
            SchedError::NameTooLong,
            SchedError::NullEntryPoint,
            SchedError::NoChildren,
            SchedError::StackTooSmall,
            SchedError::InvalidPriority,
            SchedError::TableFull,
            SchedError::NotBlocked,
            SchedError::ContextUnavailable,
        ];
        for (i, a) in all.iter().enumerate() {
            assert!(a.code() < 0);
            assert_ne!(a.code(), KILLED_EXIT_CODE);
            for b in &all[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
    }

    #[test]
    fn test_halt_status() {
        assert_eq!(HaltReason::Completed.exit_status(), 0);
        assert_eq!(HaltReason::Deadlock { blocked: 3 }.exit_status(), 1);
        assert_eq!(HaltReason::Violation(Violation::JoinSelf).exit_status(), 101);
    }

    #[test]
    fn test_display() {
        assert_eq!(SchedError::TableFull.to_string(), "Process table full");
        assert_eq!(
            HaltReason::Violation(Violation::UnsupportedSignal).to_string(),
            "Contract violation: Unsupported signal"
        );
    }
}
