/*
 * Timed Sleep
 *
 * Threads that sleep park themselves on a dedicated set ordered by wake-up
 * tick, ascending, ties in insertion order. The timer tick sweeps the set
 * from the front and stops at the first entry that is not yet due, so an
 * idle tick costs one comparison and a tick that wakes k threads costs
 * O(k).
 *
 * The set is deliberately separate from the ready queue and sorted by
 * deadline only; it shares nothing with the priority ordering of the other
 * queues. Once woken, a thread competes for the CPU exactly like any other
 * ready thread.
 *
 * Precision contract: a thread calling sleep(n) at tick T resumes no
 * earlier than tick T + n. No upper bound beyond scheduling latency is
 * promised.
 */

use core::ptr::NonNull;

use crate::collections::list::List;
use crate::interrupt;
use crate::scheduler::{self, thread, thread::Tcb};
use crate::utils::timer;

/// Blocked threads waiting for a tick, ordered by `wake_tick`.
static SLEEPERS: spin::Mutex<List> = spin::Mutex::new(List::new());

/// Reset the sleep set. Part of `scheduler::init`.
pub(crate) fn reinit() {
    SLEEPERS.lock().reinit();
}

/// Sleep for at least `duration` ticks.
///
/// Returns immediately when `duration` is zero or negative. The idle
/// thread must never sleep; everything else may.
pub fn sleep(duration: i64) {
    if duration <= 0 {
        return;
    }
    assert!(!interrupt::in_handler(), "sleep inside an interrupt handler");

    let cur = scheduler::current().as_ptr();
    assert!(cur != scheduler::idle_ptr(), "the idle thread cannot sleep");

    let _off = interrupt::off();
    unsafe {
        (*cur).wake_tick = timer::ticks() + duration;
        SLEEPERS
            .lock()
            .insert_ordered(&mut (*cur).elem, thread::earlier_wakeup);
        scheduler::block();
    }
}

/// Wake every sleeper whose deadline has passed. Runs in the timer
/// handler, once per tick.
pub fn wakeup(now: i64) {
    loop {
        let due = {
            let mut sleepers = SLEEPERS.lock();
            match sleepers.front() {
                Some(e) => unsafe {
                    let t = Tcb::from_elem(e.as_ptr());
                    if (*t).wake_tick <= now {
                        sleepers.pop_front();
                        Some(t)
                    } else {
                        // Deadline order: nobody further back is due either.
                        None
                    }
                },
                None => None,
            }
        };
        match due {
            Some(t) => scheduler::unblock(NonNull::new(t).expect("null sleeper")),
            None => break,
        }
    }
}
