/*
 * TKOS Kernel Library
 *
 * Process scheduling core of a small teaching kernel: a fixed process table,
 * six priority levels with preemption, and the process system calls (spawn,
 * exit, wait, join, kill, block, unblock).
 *
 * Layout:
 * - config:    limits and runtime settings
 * - scheduler: process table, ready queues, dispatcher, watchdog, Kernel
 * - syscall:   the system-call layer and its error types
 * - substrate: the execution-context mechanism the kernel runs on
 * - logger:    stderr logger (feature "std")
 *
 * The core only needs `alloc`. With the default "std" feature the crate also
 * provides a hosted substrate so the kernel can run, and be tested, as an
 * ordinary host program.
 */

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod config;
pub mod scheduler;
pub mod substrate;
pub mod syscall;

#[cfg(feature = "std")]
pub mod logger;

pub use config::SchedulerConfig;
pub use scheduler::{EntryPoint, Kernel, Priority, ProcessId, ProcessInfo, ProcessStatus};
pub use substrate::{ContextHandle, ExecutionSubstrate};
pub use syscall::{HaltReason, SchedError, Violation};

#[cfg(feature = "std")]
pub use substrate::HostedSubstrate;
