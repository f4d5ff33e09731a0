/*
 * Shared helpers for the scenario tests
 *
 * Each scenario boots a fresh kernel on the hosted substrate. Entry points are
 * plain functions, so scenarios record what happened in statics declared next
 * to them (one per test, since tests run in parallel).
 */

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tkos_kernel::config::MIN_STACK_SIZE;
use tkos_kernel::{EntryPoint, HaltReason, HostedSubstrate, Kernel, ProcessId, SchedulerConfig};

/// Ordered record of events seen by the processes of one scenario
pub struct Trace(Mutex<Vec<String>>);

impl Trace {
    pub const fn new() -> Self {
        Trace(Mutex::new(Vec::new()))
    }

    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

pub fn kernel_with(config: SchedulerConfig) -> Arc<Kernel> {
    Kernel::new(Box::new(HostedSubstrate::new()), config)
}

/// Boot a kernel running `entry` as the test program; returns it after halt
pub fn run_with(config: SchedulerConfig, entry: EntryPoint) -> (Arc<Kernel>, HaltReason) {
    let kernel = kernel_with(config);
    let reason = kernel.boot(entry, "").expect("boot failed");
    (kernel, reason)
}

pub fn run(entry: EntryPoint) -> (Arc<Kernel>, HaltReason) {
    run_with(SchedulerConfig::default(), entry)
}

/// Spawn with the minimum stack and no arguments
pub fn spawn(kernel: &Kernel, name: &str, entry: EntryPoint, priority: i32) -> ProcessId {
    kernel
        .spawn(Some(name), Some(entry), None, MIN_STACK_SIZE, priority)
        .expect("spawn failed")
}

/// Pid the bootstrap gives the test program (the watchdog is pid 1)
pub const TEST_PROGRAM_PID: ProcessId = ProcessId(2);
