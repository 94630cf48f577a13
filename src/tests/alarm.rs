/*
 * Timed-Sleep Scenarios
 *
 * The alarm tests: threads sleep for fixed durations and the recorded wake
 * order must match the deadlines. Thread i sleeps 10*(i+1) ticks, so the
 * wake order is exactly the spawn order, and with repeated sleeps the
 * product iteration*duration reproduces each wake tick and must appear in
 * nondecreasing order.
 */

use core::sync::atomic::{AtomicUsize, Ordering};

use super::{boot, run_ticks};
use crate::scheduler::{self, PRI_DEFAULT, sleep};
use crate::utils::timer;

static WAKE_ORDER: spin::Mutex<heapless::Vec<usize, 8>> = spin::Mutex::new(heapless::Vec::new());
static SINGLE_DONE: AtomicUsize = AtomicUsize::new(0);

fn sleep_once(i: usize) {
    sleep::sleep(10 * (i as i64 + 1));
    WAKE_ORDER.lock().push(i).unwrap();
    SINGLE_DONE.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn alarm_single() {
    let _boot = boot();
    WAKE_ORDER.lock().clear();
    SINGLE_DONE.store(0, Ordering::SeqCst);

    for i in 0..5 {
        scheduler::spawn("sleeper", PRI_DEFAULT, sleep_once, i).unwrap();
    }
    // Give every sleeper the CPU once so they all reach their beds.
    scheduler::yield_now();

    let mut spent = 0;
    while SINGLE_DONE.load(Ordering::SeqCst) < 5 {
        run_ticks(1);
        spent += 1;
        assert!(spent < 200, "sleepers did not all wake");
    }

    assert_eq!(WAKE_ORDER.lock().as_slice(), [0, 1, 2, 3, 4]);
    // The longest sleeper asked for 50 ticks; it cannot have woken early.
    assert!(timer::ticks() >= 50);
}

static PRODUCTS: spin::Mutex<heapless::Vec<i64, 40>> = spin::Mutex::new(heapless::Vec::new());
static MULTI_DONE: AtomicUsize = AtomicUsize::new(0);

const MULTI_ITERATIONS: i64 = 7;

fn sleep_repeatedly(i: usize) {
    let duration = 10 * (i as i64 + 1);
    for iteration in 1..=MULTI_ITERATIONS {
        sleep::sleep(duration);
        PRODUCTS.lock().push(iteration * duration).unwrap();
    }
    MULTI_DONE.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn alarm_multiple() {
    let _boot = boot();
    PRODUCTS.lock().clear();
    MULTI_DONE.store(0, Ordering::SeqCst);

    for i in 0..5 {
        scheduler::spawn("sleeper", PRI_DEFAULT, sleep_repeatedly, i).unwrap();
    }
    scheduler::yield_now();

    let mut spent = 0;
    while MULTI_DONE.load(Ordering::SeqCst) < 5 {
        run_ticks(1);
        spent += 1;
        assert!(spent < 1000, "sleepers did not all finish");
    }

    let products = PRODUCTS.lock();
    assert_eq!(products.len(), 5 * MULTI_ITERATIONS as usize);
    for pair in products.windows(2) {
        assert!(
            pair[0] <= pair[1],
            "wake products out of order: {} before {}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn sleep_zero_or_negative_returns_immediately() {
    let _boot = boot();
    let before = timer::ticks();
    sleep::sleep(0);
    sleep::sleep(-5);
    // No tick passed and we are still running: the calls did not block.
    assert_eq!(timer::ticks(), before);
}

static PAIR_ORDER: spin::Mutex<heapless::Vec<usize, 8>> = spin::Mutex::new(heapless::Vec::new());
static PAIR_DONE: AtomicUsize = AtomicUsize::new(0);

fn sleep_fixed(ticks: usize) {
    sleep::sleep(ticks as i64);
    PAIR_ORDER.lock().push(ticks).unwrap();
    PAIR_DONE.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn earlier_deadline_wakes_first_regardless_of_spawn_order() {
    let _boot = boot();
    PAIR_ORDER.lock().clear();
    PAIR_DONE.store(0, Ordering::SeqCst);

    // Spawned long-sleeper first; the short one must still wake first.
    scheduler::spawn("slow", PRI_DEFAULT, sleep_fixed, 30).unwrap();
    scheduler::spawn("fast", PRI_DEFAULT, sleep_fixed, 5).unwrap();
    scheduler::yield_now();

    let mut spent = 0;
    while PAIR_DONE.load(Ordering::SeqCst) < 2 {
        run_ticks(1);
        spent += 1;
        assert!(spent < 100, "sleepers did not wake");
    }
    assert_eq!(PAIR_ORDER.lock().as_slice(), [5, 30]);
}
