/*
 * Lock with Priority Donation
 *
 * A mutex: a binary semaphore plus an owner. At most one holder, not
 * recursive, and release must come from the holder.
 *
 * The interesting part is donation. When a thread blocks on a lock it
 * lends its effective priority to the holder, and transitively to whoever
 * the holder is itself waiting on, so that a high-priority thread is never
 * stuck behind a low-priority holder that cannot get the CPU (priority
 * inversion). The bookkeeping is:
 *
 *   - each blocked thread records the lock it waits on (`wait_on_lock`);
 *   - each thread keeps the set of threads donating to it (`donors`),
 *     linked through their `donation_elem`;
 *   - donation walks the wait_on_lock back-edges, raising effective
 *     priorities, with a hard depth cap: the donors relation is acyclic in
 *     correct programs, so hitting the cap means a lock cycle and panics.
 *
 * On release, exactly the donors attributable to this lock are dismissed
 * and the holder's effective priority collapses back to the maximum of its
 * base priority and the remaining donors.
 *
 * Donation is meaningless under the MLFQS policy (priorities are computed,
 * not assigned), so the whole mechanism switches off there.
 */

use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use crate::interrupt;
use crate::scheduler::{self, thread, thread::Tcb};
use crate::sync::semaphore::Semaphore;

/// Donation chains longer than this indicate a cycle of locks.
pub const DONATION_DEPTH_MAX: usize = 8;

/// A non-recursive mutex with priority donation.
pub struct Lock {
    /// The thread holding the lock, or null.
    holder: AtomicPtr<Tcb>,
    /// The turnstile. Invariant: holder is null exactly when value is 1.
    sema: Semaphore,
}

impl Lock {
    pub const fn new() -> Self {
        Self {
            holder: AtomicPtr::new(ptr::null_mut()),
            sema: Semaphore::new(1),
        }
    }

    /// True when the running thread holds this lock.
    pub fn held_by_current(&self) -> bool {
        self.holder.load(Ordering::SeqCst) == scheduler::current().as_ptr()
    }

    /// Acquire the lock, sleeping until it is available.
    ///
    /// If the lock is held, the caller first donates its priority along
    /// the chain of holders, then blocks on the turnstile.
    pub fn acquire(&self) {
        assert!(!interrupt::in_handler(), "acquire inside an interrupt handler");
        assert!(!self.held_by_current(), "lock is not recursive");

        let cur = scheduler::current().as_ptr();
        let _off = interrupt::off();

        let holder = self.holder.load(Ordering::SeqCst);
        if !holder.is_null() && !scheduler::mlfqs_enabled() {
            unsafe {
                (*cur).wait_on_lock = self as *const Lock;
                (*holder)
                    .donors
                    .insert_ordered(&mut (*cur).donation_elem, thread::higher_priority_donation);
                propagate_donation(cur);
            }
        }

        self.sema.down();

        unsafe {
            (*cur).wait_on_lock = ptr::null();
        }
        self.holder.store(cur, Ordering::SeqCst);
    }

    /// Try to acquire the lock without blocking and without donating.
    pub fn try_acquire(&self) -> bool {
        assert!(!self.held_by_current(), "lock is not recursive");
        let cur = scheduler::current().as_ptr();

        let _off = interrupt::off();
        if self.sema.try_down() {
            self.holder.store(cur, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    /// Release the lock. The caller must hold it.
    ///
    /// Dismisses the donors that were waiting on this lock, recomputes the
    /// caller's effective priority, and wakes the next contender. If that
    /// contender outranks us we yield on the spot (inside `up`).
    pub fn release(&self) {
        assert!(self.held_by_current(), "releasing a lock that is not held");

        let cur = scheduler::current().as_ptr();
        let _off = interrupt::off();

        if !scheduler::mlfqs_enabled() {
            let this = self as *const Lock;
            unsafe {
                (*cur).donors.retain(|e| unsafe {
                    let donor = Tcb::from_donation_elem(e.as_ptr());
                    (*donor).wait_on_lock != this
                });
                refresh_priority(cur);
            }
        }

        self.holder.store(ptr::null_mut(), Ordering::SeqCst);
        self.sema.up();
    }

    /// Acquire and return a guard that releases on drop. Convenience for
    /// kernel-internal critical sections (the syscall layer's filesystem
    /// lock uses it); the explicit acquire/release pair stays the primary
    /// interface.
    pub fn lock(&self) -> LockGuard<'_> {
        self.acquire();
        LockGuard { lock: self }
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII handle from [`Lock::lock`].
pub struct LockGuard<'a> {
    lock: &'a Lock,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

/// Push `donor`'s effective priority along the chain of lock holders.
///
/// Interrupts must be off. Stops early when a holder already sits at or
/// above the donated priority: its own earlier donation has then already
/// lifted everything upstream at least that high.
pub(crate) unsafe fn propagate_donation(donor: *mut Tcb) {
    unsafe {
        let priority = (*donor).effective_priority;
        let mut lock = (*donor).wait_on_lock;
        let mut depth = 0;

        while !lock.is_null() {
            depth += 1;
            assert!(
                depth <= DONATION_DEPTH_MAX,
                "donation chain exceeds {} locks; lock cycle?",
                DONATION_DEPTH_MAX
            );

            let holder = (*lock).holder.load(Ordering::SeqCst);
            if holder.is_null() || (*holder).effective_priority >= priority {
                break;
            }
            (*holder).effective_priority = priority;
            lock = (*holder).wait_on_lock;
        }
    }
}

/// Recompute `t`'s effective priority from its base priority and its
/// remaining donors. Interrupts must be off.
pub(crate) unsafe fn refresh_priority(t: *mut Tcb) {
    unsafe {
        let mut priority = (*t).base_priority;
        if let Some(e) = (*t).donors.max(thread::lower_priority_donation) {
            let top = (*Tcb::from_donation_elem(e.as_ptr())).effective_priority;
            if top > priority {
                priority = top;
            }
        }
        (*t).effective_priority = priority;
    }
}
