/*
 * Priority-Donation Scenarios
 *
 * A thread blocked on a lock lends its effective priority to the chain of
 * holders; release gives exactly that donation back. The probes run on the
 * main thread, which plays the low-priority holder throughout.
 */

use core::sync::atomic::{AtomicBool, Ordering};

use super::boot;
use crate::scheduler::{self, PRI_DEFAULT};
use crate::sync::lock::Lock;

static LOCK_A: Lock = Lock::new();
static LOCK_B: Lock = Lock::new();
static SEQ: spin::Mutex<heapless::Vec<u8, 16>> = spin::Mutex::new(heapless::Vec::new());

fn medium(_aux: usize) {
    LOCK_B.acquire();
    SEQ.lock().push(b'm').unwrap();
    // Blocks: main holds A. Our priority flows to main.
    LOCK_A.acquire();
    LOCK_A.release();
    LOCK_B.release();
    SEQ.lock().push(b'M').unwrap();
}

fn high(_aux: usize) {
    // Blocks: medium holds B, and medium is blocked on A held by main, so
    // our priority must travel two hops down the chain.
    LOCK_B.acquire();
    LOCK_B.release();
    SEQ.lock().push(b'H').unwrap();
}

#[test]
fn nested_donation_reaches_the_bottom_holder() {
    let _boot = boot();
    SEQ.lock().clear();
    assert_eq!(scheduler::get_priority(), PRI_DEFAULT);

    LOCK_A.acquire();

    scheduler::spawn("medium", PRI_DEFAULT + 1, medium, 0).unwrap();
    // medium has taken B and is now stuck on A: one donation level.
    assert_eq!(scheduler::get_priority(), PRI_DEFAULT + 1);

    scheduler::spawn("high", PRI_DEFAULT + 2, high, 0).unwrap();
    // high is stuck on B; its priority must have propagated through
    // medium all the way to us.
    assert_eq!(scheduler::get_priority(), PRI_DEFAULT + 2);

    // Releasing A dismisses the donations and hands the lock chain over;
    // both donors outrank us, so they finish before release returns.
    LOCK_A.release();
    assert_eq!(scheduler::get_priority(), PRI_DEFAULT);
    assert_eq!(SEQ.lock().as_slice(), *b"mHM");
}

static LOCK_C: Lock = Lock::new();
static LOCK_D: Lock = Lock::new();

fn contender_c(_aux: usize) {
    LOCK_C.acquire();
    LOCK_C.release();
}

fn contender_d(_aux: usize) {
    LOCK_D.acquire();
    LOCK_D.release();
}

#[test]
fn release_dismisses_only_that_locks_donors() {
    let _boot = boot();
    assert_eq!(scheduler::get_priority(), PRI_DEFAULT);

    LOCK_C.acquire();
    LOCK_D.acquire();

    scheduler::spawn("want-c", PRI_DEFAULT + 4, contender_c, 0).unwrap();
    assert_eq!(scheduler::get_priority(), PRI_DEFAULT + 4);

    scheduler::spawn("want-d", PRI_DEFAULT + 9, contender_d, 0).unwrap();
    assert_eq!(scheduler::get_priority(), PRI_DEFAULT + 9);

    // Dropping D sheds only the D donor; C's donation stays in force.
    LOCK_D.release();
    assert_eq!(scheduler::get_priority(), PRI_DEFAULT + 4);

    LOCK_C.release();
    assert_eq!(scheduler::get_priority(), PRI_DEFAULT);
}

static LOCK_T: Lock = Lock::new();
static TRY_RESULT: AtomicBool = AtomicBool::new(true);
static TRY_RAN: AtomicBool = AtomicBool::new(false);

fn try_contender(_aux: usize) {
    TRY_RESULT.store(LOCK_T.try_acquire(), Ordering::SeqCst);
    TRY_RAN.store(true, Ordering::SeqCst);
}

#[test]
fn try_acquire_fails_without_blocking_or_donating() {
    let _boot = boot();
    TRY_RAN.store(false, Ordering::SeqCst);

    LOCK_T.acquire();
    scheduler::spawn("try", PRI_DEFAULT + 5, try_contender, 0).unwrap();

    // The contender ran, failed, and did not donate: our priority is
    // untouched and nobody is blocked.
    assert!(TRY_RAN.load(Ordering::SeqCst));
    assert!(!TRY_RESULT.load(Ordering::SeqCst));
    assert_eq!(scheduler::get_priority(), PRI_DEFAULT);
    assert!(LOCK_T.held_by_current());
    LOCK_T.release();

    assert!(LOCK_T.try_acquire());
    assert!(LOCK_T.held_by_current());
    LOCK_T.release();
}
