/*
 * System Call Constants
 *
 * Integer values that cross the system-call boundary: the negative error
 * codes returned by recoverable failures, the supported signal, the exit
 * sentinel written for killed processes, and the exit statuses of a halted
 * system.
 *
 * Error codes are negative so a caller working with raw integers can tell
 * them apart from pids (always > 0). -5 is not an error code: it is the exit
 * code reported for a process that was terminated by a signal.
 */

/// Spawn errors
pub const ENULLNAME: i32 = -1;      // Name missing
pub const ENAMETOOLONG: i32 = -2;   // Name longer than MAX_NAME - 1 bytes
pub const ENULLENTRY: i32 = -3;     // Entry point missing
pub const ESTACK: i32 = -6;         // Stack smaller than the configured minimum
pub const EPRIORITY: i32 = -7;      // Priority outside [0, 5]
pub const ETABLEFULL: i32 = -8;     // No free process-table slot
pub const ECONTEXT: i32 = -10;      // Substrate could not create a context

/// Wait error
pub const ENOCHILDREN: i32 = -4;    // Caller has no unreaped children

/// Unblock error
pub const ENOTBLOCKED: i32 = -9;    // Target is not in a caller-defined block

/// Exit code recorded for a process terminated by a signal
pub const KILLED_EXIT_CODE: i32 = -5;

/// The only signal Kill accepts: terminate
pub const SIG_TERM: i32 = 15;

/// Halt statuses passed to the substrate's fatal_halt()
///
/// Contract violations use HALT_VIOLATION_BASE plus the violation's index.
pub const HALT_COMPLETED: i32 = 0;
pub const HALT_DEADLOCK: i32 = 1;
pub const HALT_VIOLATION_BASE: i32 = 100;
