/*
 * Scheduler Scenario Tests
 *
 * These run the real scheduler: real control blocks, real stacks, real
 * context switches, multiplexed as green threads on the test runner's
 * thread. Time is virtual; the harness advances it by invoking the timer
 * interrupt body directly, exactly as the timer driver would.
 *
 * Ground rules the scenarios follow:
 * - the scheduler is one global instance, so scenario tests serialize on
 *   BOOT_LOCK and each begins with a fresh boot();
 * - the main (test) thread is the only source of ticks, so it never sleeps
 *   and never blocks on something only a sleeper can release;
 * - spawned threads run on 4 KiB kernel stacks: their bodies stick to
 *   atomics, spin-guarded records and scheduler calls, and leave the
 *   formatting to the asserting side.
 */

mod alarm;
mod donation;
mod mlfqs_policy;
mod priority;

use std::sync::{Mutex, MutexGuard};

use crate::scheduler::{self, BootOptions};
use crate::utils::timer;

/// Serializes scenario tests; the scheduler globals are one per process.
static BOOT_LOCK: Mutex<()> = Mutex::new(());

/// Boot the scheduler with the default (round-robin) policy.
pub(crate) fn boot() -> MutexGuard<'static, ()> {
    boot_with(BootOptions::default())
}

/// Boot the scheduler, adopting the test thread as "main" and starting the
/// idle thread. Holds the serialization lock until dropped.
pub(crate) fn boot_with(options: BootOptions) -> MutexGuard<'static, ()> {
    let guard = BOOT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    crate::interrupt::disable();
    timer::reset();
    scheduler::init(options);
    scheduler::start();
    guard
}

/// Advance virtual time by `n` ticks.
///
/// Each tick runs the full timer interrupt body (wake-ups, preemption
/// bookkeeping); the trailing yield lets freshly woken threads of equal
/// priority take the CPU just as they would off a real interrupt.
pub(crate) fn run_ticks(n: i64) {
    for _ in 0..n {
        timer::interrupt_tick();
        scheduler::yield_now();
    }
}
