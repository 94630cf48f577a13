/*
 * Priority Scheduling Scenarios
 *
 * Strict priority dispatch: whenever spawn, unblock or set_priority makes
 * a thread of higher effective priority ready, the running thread gives
 * way before continuing. FIFO among equals.
 */

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::boot;
use crate::scheduler::{self, PRI_DEFAULT, PRI_MIN};

static STOP: AtomicBool = AtomicBool::new(false);
static SPIN_ITERS: AtomicU64 = AtomicU64::new(0);
static LOW_DONE: AtomicBool = AtomicBool::new(false);
static HIGH_DONE: AtomicBool = AtomicBool::new(false);

fn low_spinner(_aux: usize) {
    while !STOP.load(Ordering::SeqCst) {
        SPIN_ITERS.fetch_add(1, Ordering::SeqCst);
        scheduler::yield_now();
    }
    LOW_DONE.store(true, Ordering::SeqCst);
}

fn high_runner(_aux: usize) {
    HIGH_DONE.store(true, Ordering::SeqCst);
}

#[test]
fn higher_priority_spawn_preempts_spinner() {
    let _boot = boot();
    STOP.store(false, Ordering::SeqCst);
    SPIN_ITERS.store(0, Ordering::SeqCst);
    LOW_DONE.store(false, Ordering::SeqCst);
    HIGH_DONE.store(false, Ordering::SeqCst);

    scheduler::spawn("low", PRI_DEFAULT, low_spinner, 0).unwrap();
    scheduler::yield_now();
    assert!(SPIN_ITERS.load(Ordering::SeqCst) > 0, "spinner never ran");
    assert!(!LOW_DONE.load(Ordering::SeqCst));

    // spawn() may only return after the higher-priority thread has had the
    // CPU, and it runs to completion before the spinner gets another turn.
    scheduler::spawn("high", PRI_DEFAULT + 9, high_runner, 0).unwrap();
    assert!(HIGH_DONE.load(Ordering::SeqCst), "high-priority thread did not preempt");
    assert!(!LOW_DONE.load(Ordering::SeqCst), "spinner finished before the high thread");

    STOP.store(true, Ordering::SeqCst);
    scheduler::yield_now();
    assert!(LOW_DONE.load(Ordering::SeqCst));
}

static PEER_RAN: AtomicBool = AtomicBool::new(false);

fn peer(_aux: usize) {
    PEER_RAN.store(true, Ordering::SeqCst);
}

#[test]
fn set_priority_yields_when_outranked() {
    let _boot = boot();
    PEER_RAN.store(false, Ordering::SeqCst);

    // An equal-priority thread does not preempt...
    scheduler::spawn("peer", PRI_DEFAULT, peer, 0).unwrap();
    assert!(!PEER_RAN.load(Ordering::SeqCst));

    // ...but dropping below it must hand over the CPU at once.
    scheduler::set_priority(PRI_DEFAULT - 10);
    assert!(PEER_RAN.load(Ordering::SeqCst));
    assert_eq!(scheduler::get_priority(), PRI_DEFAULT - 10);

    scheduler::set_priority(PRI_DEFAULT);
    assert_eq!(scheduler::get_priority(), PRI_DEFAULT);
}

static FIFO_ORDER: spin::Mutex<heapless::Vec<usize, 8>> = spin::Mutex::new(heapless::Vec::new());

fn fifo_recorder(i: usize) {
    FIFO_ORDER.lock().push(i).unwrap();
}

#[test]
fn equal_priority_runs_fifo() {
    let _boot = boot();
    FIFO_ORDER.lock().clear();

    for i in 0..4 {
        scheduler::spawn("fifo", PRI_DEFAULT, fifo_recorder, i).unwrap();
    }
    scheduler::yield_now();
    assert_eq!(FIFO_ORDER.lock().as_slice(), [0, 1, 2, 3]);
}

fn nobody(_aux: usize) {}

#[test]
fn tids_are_unique_and_monotonic() {
    let _boot = boot();
    let a = scheduler::spawn("a", PRI_MIN + 1, nobody, 0).unwrap();
    let b = scheduler::spawn("b", PRI_MIN + 1, nobody, 0).unwrap();
    let c = scheduler::spawn("c", PRI_MIN + 1, nobody, 0).unwrap();
    assert!(a < b && b < c);
    // Drain them so the boot that follows this test starts clean.
    scheduler::set_priority(PRI_MIN);
    scheduler::yield_now();
    scheduler::set_priority(PRI_DEFAULT);
}

#[test]
fn spawn_reports_current_thread_identity() {
    let _boot = boot();
    assert_eq!(scheduler::with_current(|t| t.name.as_str() == "main"), true);
    let tid = scheduler::current_tid();
    assert_eq!(scheduler::current_tid(), tid);
}
