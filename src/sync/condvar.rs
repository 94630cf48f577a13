/*
 * Condition Variable
 *
 * Lets a thread atomically release a lock and wait for some condition to
 * be signalled, then re-acquire the lock before returning.
 *
 * The wait set does not hold threads directly. Each call to `wait` plants
 * a private binary semaphore (initialized to zero) on the waiter's own
 * stack and queues that. `signal` pops one entry and ups its semaphore:
 * wake-ups are therefore 1:1 and deterministic, with no dependence on how
 * the signaller and the waiter happen to be scheduled around each other.
 * `broadcast` is just signal until the set is empty.
 *
 * As with semaphore wait sets, the entries are kept in waiter-priority
 * order but re-sorted at signal time, because donation may have moved the
 * waiters' priorities while they slept.
 */

use crate::collections::list::{List, ListElem, list_entry};
use crate::interrupt;
use crate::scheduler::{self, thread::Tcb};
use crate::sync::lock::Lock;
use crate::sync::semaphore::Semaphore;

/// One parked `wait` call: the waiter's private semaphore plus its thread,
/// for priority ordering. Lives in the waiting thread's stack frame, which
/// stays alive for exactly as long as the entry can be signalled.
struct Waiter {
    elem: ListElem,
    sema: Semaphore,
    thread: *mut Tcb,
}

/// A condition variable. Pair it with one lock.
pub struct Condvar {
    waiters: spin::Mutex<List>,
}

impl Condvar {
    pub const fn new() -> Self {
        Self {
            waiters: spin::Mutex::new(List::new()),
        }
    }

    /// Atomically release `lock` and wait to be signalled; re-acquires
    /// `lock` before returning.
    ///
    /// The caller must hold `lock`. Spurious wake-ups do not happen, but
    /// the usual advice stands: re-check the condition in a loop, another
    /// thread may run between the signal and our return.
    pub fn wait(&self, lock: &Lock) {
        assert!(!interrupt::in_handler(), "wait inside an interrupt handler");
        assert!(lock.held_by_current(), "wait without holding the lock");

        let mut waiter = Waiter {
            elem: ListElem::new(),
            sema: Semaphore::new(0),
            thread: scheduler::current().as_ptr(),
        };

        {
            let _off = interrupt::off();
            unsafe {
                self.waiters
                    .lock()
                    .insert_ordered(&mut waiter.elem, waiter_priority);
            }
        }

        lock.release();
        waiter.sema.down();
        lock.acquire();
    }

    /// Wake one waiter, the one with the highest current priority.
    ///
    /// The caller must hold `lock`. A no-op when nobody waits.
    pub fn signal(&self, lock: &Lock) {
        assert!(!interrupt::in_handler(), "signal inside an interrupt handler");
        assert!(lock.held_by_current(), "signal without holding the lock");

        let sema = {
            let _off = interrupt::off();
            let mut waiters = self.waiters.lock();
            if waiters.is_empty() {
                None
            } else {
                unsafe {
                    // Waiters' priorities may have changed since they
                    // queued; pick by current worth.
                    waiters.sort(waiter_priority);
                    waiters.pop_front().map(|e| unsafe {
                        &(*list_entry!(e.as_ptr(), Waiter, elem)).sema as *const Semaphore
                    })
                }
            }
        };

        if let Some(sema) = sema {
            // The entry is already off the wait set, so the waiter's frame
            // cannot be signalled twice; up() is careful not to touch the
            // semaphore after the wake-up.
            unsafe { (*sema).up() };
        }
    }

    /// Wake every waiter, in priority order.
    ///
    /// The caller must hold `lock`.
    pub fn broadcast(&self, lock: &Lock) {
        while {
            let _off = interrupt::off();
            !self.waiters.lock().is_empty()
        } {
            self.signal(lock);
        }
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait-set ordering: higher-priority waiting threads first, FIFO ties.
fn waiter_priority(a: &ListElem, b: &ListElem) -> bool {
    unsafe {
        let a = &*list_entry!(a as *const ListElem as *mut ListElem, Waiter, elem);
        let b = &*list_entry!(b as *const ListElem as *mut ListElem, Waiter, elem);
        (*a.thread).effective_priority > (*b.thread).effective_priority
    }
}
