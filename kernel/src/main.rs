/*
 * TKOS Hosted Entry Point
 *
 * Boots the kernel on the hosted substrate with a small demonstration
 * program and exits with the halt status.
 *
 * The demo exercises the process calls end to end:
 * - children at lower and higher priority than their parent
 * - wait() and join() reaping
 * - a blocked worker released by unblock()
 * - kill() of a worker that never gets to run
 *
 * Usage: tkos [-v]   (-v enables debug logging)
 */

use log::LevelFilter;
use tkos_kernel::scheduler::Priority;
use tkos_kernel::syscall::SIG_TERM;
use tkos_kernel::{logger, HostedSubstrate, Kernel, SchedulerConfig};

/// Block reason used by the demo's sleeper
const DEMO_SLEEP: i32 = 42;

fn worker(kernel: &Kernel, arg: &str) -> i32 {
    for _ in 0..3 {
        kernel.quantum_tick(40);
    }
    log::info!("worker {} ({}) done after {} ticks", kernel.getpid(), arg, kernel.read_time());
    arg.len() as i32
}

fn sleeper(kernel: &Kernel, _arg: &str) -> i32 {
    log::info!("sleeper {} blocking", kernel.getpid());
    kernel.block(DEMO_SLEEP);
    log::info!("sleeper {} woken", kernel.getpid());
    0
}

fn urgent(kernel: &Kernel, _arg: &str) -> i32 {
    log::info!("urgent {} preempted its parent", kernel.getpid());
    7
}

fn demo(kernel: &Kernel, _arg: &str) -> i32 {
    let spawn = |name: &str, entry: tkos_kernel::EntryPoint, arg: &str, priority: u8| {
        kernel.spawn(
            Some(name),
            Some(entry),
            Some(arg),
            kernel.config().min_stack_size,
            priority as i32,
        )
    };

    let workers: Vec<_> = ["alpha", "beta"]
        .into_iter()
        .filter_map(|name| spawn("worker", worker, name, 2).ok())
        .collect();
    let sleeper_pid = match spawn("sleeper", sleeper, "", 3) {
        Ok(pid) => pid,
        Err(err) => {
            log::error!("demo: cannot spawn sleeper: {}", err);
            return 1;
        }
    };
    let doomed = spawn("doomed", worker, "never runs", 1).ok();

    kernel.display_process_table();

    if let Some(pid) = doomed {
        kernel.kill(pid, SIG_TERM);
    }
    if let Err(err) = spawn("urgent", urgent, "", Priority::HIGHEST.get()) {
        log::error!("demo: cannot spawn urgent: {}", err);
    }

    // The sleeper outranks the workers, so it is blocked by the time the
    // first join returns
    for pid in workers {
        let code = kernel.join(pid);
        log::info!("demo: joined worker {} (code {})", pid, code);
    }
    if let Err(err) = kernel.unblock(sleeper_pid) {
        log::warn!("demo: unblock failed: {}", err);
    }
    while let Ok((pid, code)) = kernel.wait() {
        log::info!("demo: reaped {} (code {})", pid, code);
    }

    kernel.display_process_table();
    0
}

fn main() {
    let verbose = std::env::args().skip(1).any(|a| a == "-v");
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    if let Err(err) = logger::init(level) {
        eprintln!("logger: {}", err);
    }

    let kernel = Kernel::new(Box::new(HostedSubstrate::new()), SchedulerConfig::default());
    match kernel.boot(demo, "") {
        Ok(reason) => std::process::exit(reason.exit_status()),
        Err(err) => {
            log::error!("boot failed: {}", err);
            std::process::exit(err.code());
        }
    }
}
