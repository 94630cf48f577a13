/*
 * Timer Ticks
 *
 * The kernel's notion of time is a monotonic 64-bit tick counter advanced
 * by the periodic timer interrupt. One tick is the unit everything
 * scheduling-related is measured in: time slices, sleep deadlines, the
 * MLFQS decay cadence.
 *
 * The hardware side (programming the PIT/APIC, the interrupt stub) is the
 * timer driver's business. Its whole contract with the kernel is to call
 * `interrupt_tick` once per tick; the host test harness fulfills the same
 * contract by calling it directly to advance virtual time.
 */

use core::sync::atomic::{AtomicI64, Ordering};

use crate::interrupt;
use crate::scheduler::{self, sleep};

/// Timer interrupts per second.
pub const TIMER_FREQ: u64 = 100;

/// Ticks since boot.
static TICKS: AtomicI64 = AtomicI64::new(0);

/// Ticks elapsed since boot.
pub fn ticks() -> i64 {
    TICKS.load(Ordering::SeqCst)
}

/// Ticks elapsed since `then`.
pub fn elapsed(then: i64) -> i64 {
    ticks() - then
}

/// The timer interrupt body. Called exactly once per tick, from the ISR on
/// hardware or from the test harness on a host.
///
/// Advances time, charges the tick to the running thread (possibly
/// requesting preemption), and releases every sleeper that has reached its
/// deadline. Any requested yield happens as the handler context unwinds.
pub fn interrupt_tick() {
    interrupt::dispatch_handler(|| {
        let now = TICKS.fetch_add(1, Ordering::SeqCst) + 1;
        scheduler::tick();
        sleep::wakeup(now);
    });
}

/// Roll time back to zero. Test-harness use only; real time never rewinds.
#[cfg(test)]
pub(crate) fn reset() {
    TICKS.store(0, Ordering::SeqCst);
}
