/*
 * Counting Semaphore
 *
 * A non-negative counter with two operations: down waits for the counter
 * to become positive and decrements it; up increments it and wakes the
 * most deserving waiter.
 *
 * Waiters park on an intrusive wait set ordered by effective priority.
 * Ordering at insert time is not enough: a waiter's priority can rise
 * while it sleeps (priority donation flows through locks, and locks are
 * built on this type), so `up` re-sorts the set against current values
 * before popping. Skipping that re-sort quietly reintroduces priority
 * inversion at the hand-off.
 */

use core::ptr::NonNull;

use crate::collections::list::List;
use crate::interrupt;
use crate::scheduler::{self, thread, thread::Tcb};

struct Inner {
    value: u32,
    waiters: List,
}

/// A counting semaphore.
///
/// Const-constructible so it can live in statics; equally at home on a
/// stack frame that outlives its waiters (the condition variable and the
/// scheduler's own startup handshake both do this).
pub struct Semaphore {
    inner: spin::Mutex<Inner>,
}

impl Semaphore {
    pub const fn new(value: u32) -> Self {
        Self {
            inner: spin::Mutex::new(Inner {
                value,
                waiters: List::new(),
            }),
        }
    }

    /// Wait until the counter is positive, then decrement it.
    ///
    /// May block, so it must not be called from an interrupt handler. The
    /// re-check loop matters: between our wake-up and our next run, another
    /// thread may have consumed the count.
    pub fn down(&self) {
        assert!(!interrupt::in_handler(), "down inside an interrupt handler");

        let cur = scheduler::current().as_ptr();
        let _off = interrupt::off();
        loop {
            let mut inner = self.inner.lock();
            if inner.value > 0 {
                inner.value -= 1;
                break;
            }
            unsafe {
                inner
                    .waiters
                    .insert_ordered(&mut (*cur).elem, thread::higher_priority);
            }
            drop(inner);
            scheduler::block();
        }
    }

    /// Decrement the counter only if it is positive; never blocks.
    pub fn try_down(&self) -> bool {
        let _off = interrupt::off();
        let mut inner = self.inner.lock();
        if inner.value > 0 {
            inner.value -= 1;
            true
        } else {
            false
        }
    }

    /// Increment the counter and wake the highest-priority waiter, if any.
    ///
    /// Safe from interrupt handlers. If the woken thread outranks the
    /// running one, the running thread yields (deferred when inside a
    /// handler).
    pub fn up(&self) {
        let _off = interrupt::off();
        let mut inner = self.inner.lock();
        let woken = if inner.waiters.is_empty() {
            None
        } else {
            unsafe {
                // Priorities may have moved (donation) since the waiters
                // queued; sort by what they are worth now.
                inner.waiters.sort(thread::higher_priority);
                inner
                    .waiters
                    .pop_front()
                    .map(|e| unsafe { Tcb::from_elem(e.as_ptr()) })
            }
        };
        inner.value += 1;
        drop(inner);

        // Past this point `self` must not be touched again: waking the
        // waiter can hand it the CPU, and for a condition-variable waiter
        // that destroys the semaphore's stack frame.
        if let Some(t) = woken {
            scheduler::unblock(NonNull::new(t).expect("null semaphore waiter"));
        }
    }
}
