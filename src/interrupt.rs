/*
 * Interrupt Level Management
 *
 * The scheduler's one and only mutual-exclusion primitive is "interrupts
 * off". Every mutation of the ready queue, the sleep set, a wait set or a
 * thread's donation bookkeeping happens inside such a section, and the
 * higher-level primitives (semaphores, locks, condition variables) are built
 * on top of it.
 *
 * The current level is tracked in software and mirrored to the hardware
 * interrupt flag on bare-metal builds. Keeping the software level
 * authoritative lets the scheduler assert its discipline (for example that
 * `schedule()` is only entered with interrupts off) identically on hardware
 * and in host-run tests, where the CPU flag is not ours to toggle.
 *
 * The module also carries the external-handler bookkeeping: a flag that is
 * set while the timer handler body runs, and the deferred yield request a
 * handler files when the running thread must give up the CPU as soon as the
 * handler returns. Yielding from inside a handler directly is forbidden.
 */

use core::sync::atomic::{AtomicBool, Ordering};

/// Software interrupt level. On bare metal this mirrors the IF flag.
static INTR_ENABLED: AtomicBool = AtomicBool::new(false);

/// True while an external interrupt handler body is executing.
static IN_HANDLER: AtomicBool = AtomicBool::new(false);

/// Set by `yield_on_return`; honored when the handler finishes.
static YIELD_ON_RETURN: AtomicBool = AtomicBool::new(false);

/// Interrupt state, as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Interrupts may be taken.
    On,
    /// Interrupts are ignored until re-enabled.
    Off,
}

/// Current interrupt level.
pub fn level() -> Level {
    if INTR_ENABLED.load(Ordering::SeqCst) {
        Level::On
    } else {
        Level::Off
    }
}

/// Enable interrupts and return the previous level.
///
/// Must not be called from an external handler; a handler runs with
/// interrupts off and stays that way until it returns.
pub fn enable() -> Level {
    assert!(
        !in_handler(),
        "cannot enable interrupts inside an interrupt handler"
    );
    set_level(Level::On)
}

/// Disable interrupts and return the previous level.
pub fn disable() -> Level {
    set_level(Level::Off)
}

/// Set the interrupt level and return the previous one.
///
/// Ordering matters on bare metal: when enabling, the software level is
/// published before sti, so a tick that fires the moment interrupts open
/// already sees On; when disabling, cli comes first for the mirror-image
/// reason.
pub fn set_level(new: Level) -> Level {
    let old = level();
    match new {
        Level::On => {
            INTR_ENABLED.store(true, Ordering::SeqCst);
            hw_enable();
        }
        Level::Off => {
            hw_disable();
            INTR_ENABLED.store(false, Ordering::SeqCst);
        }
    }
    old
}

/// Disable interrupts for the lifetime of the returned guard.
///
/// The guard restores the previous level when dropped, on every exit path
/// out of the critical section, early returns and panics included.
pub fn off() -> IntrGuard {
    IntrGuard { old: disable() }
}

/// RAII interrupt-off section. See [`off`].
pub struct IntrGuard {
    old: Level,
}

impl Drop for IntrGuard {
    fn drop(&mut self) {
        set_level(self.old);
    }
}

/// Publish the level as On without touching the hardware flag.
///
/// Only the idle thread uses this, immediately before an sti;hlt pair that
/// enables and waits atomically; going through `enable` would open a window
/// where a tick fires between the enable and the halt.
pub(crate) fn mark_enabled() {
    assert!(!in_handler());
    INTR_ENABLED.store(true, Ordering::SeqCst);
}

/// True during the processing of an external interrupt (e.g. the timer).
pub fn in_handler() -> bool {
    IN_HANDLER.load(Ordering::SeqCst)
}

/// Ask the kernel to yield the CPU right after the current handler returns.
///
/// A handler cannot call `yield_now` itself: the interrupted thread's state
/// is only consistent once the handler has unwound. The timer tick uses this
/// when a time slice expires or a wake-up makes a higher-priority thread
/// ready.
pub fn yield_on_return() {
    assert!(in_handler(), "yield_on_return outside an interrupt handler");
    YIELD_ON_RETURN.store(true, Ordering::SeqCst);
}

/// Run `body` as an external interrupt handler.
///
/// Enters with interrupts forced off, marks the handler context, and on the
/// way out performs any yield the body requested. The bare-metal interrupt
/// stubs call this from the actual ISR; the host test harness calls it
/// directly to simulate timer interrupts.
pub fn dispatch_handler<F: FnOnce()>(body: F) {
    let old = disable();
    assert!(!in_handler(), "nested external interrupt handlers");

    IN_HANDLER.store(true, Ordering::SeqCst);
    body();
    IN_HANDLER.store(false, Ordering::SeqCst);

    let wants_yield = YIELD_ON_RETURN.swap(false, Ordering::SeqCst);
    set_level(old);

    // The interrupted thread gives way only once handler state is gone.
    if wants_yield {
        crate::scheduler::yield_now();
    }
}

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
fn hw_enable() {
    x86_64::instructions::interrupts::enable();
}

#[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
fn hw_enable() {}

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
fn hw_disable() {
    x86_64::instructions::interrupts::disable();
}

#[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
fn hw_disable() {}
