/*
 * MLFQS Policy Scenarios
 *
 * Under the feedback-queue policy priorities are computed, not assigned:
 * the load average tracks runnable threads, recent_cpu charges the running
 * thread and decays once a second, and the 4-tick sweep turns both into
 * priorities. These tests drive virtual time and watch the statistics
 * move.
 */

use super::boot_with;
use crate::scheduler::{self, BootOptions, PRI_MAX, mlfqs};
use crate::utils::timer;

fn mlfqs_boot() -> std::sync::MutexGuard<'static, ()> {
    boot_with(BootOptions { mlfqs: true })
}

/// Drive raw ticks; unlike `run_ticks` no extra yields are injected, so
/// the CPU charge lands squarely on the calling thread.
fn spin_ticks(n: usize) {
    for _ in 0..n {
        timer::interrupt_tick();
    }
}

#[test]
fn statistics_follow_a_busy_thread() {
    let _boot = mlfqs_boot();
    assert_eq!(mlfqs::get_load_avg(), 0);

    // Four seconds of a single runnable thread.
    spin_ticks(400);

    // load_avg climbs toward 1 runnable thread from below.
    let load = mlfqs::get_load_avg();
    assert!(load > 0, "load average never moved");
    assert!(load < 100, "load average overshot a single runnable thread");

    // We burned every tick, so our recent_cpu shows it and our priority
    // has decayed off the ceiling.
    assert!(mlfqs::get_recent_cpu() > 0);
    assert!(scheduler::get_priority() < PRI_MAX);
}

#[test]
fn set_priority_is_inert_under_mlfqs() {
    let _boot = mlfqs_boot();
    spin_ticks(8);

    let computed = scheduler::get_priority();
    scheduler::set_priority(5);
    assert_eq!(scheduler::get_priority(), computed);
}

#[test]
fn niceness_costs_exactly_its_weight() {
    let _boot = mlfqs_boot();
    spin_ticks(8);

    let before = scheduler::get_priority();
    mlfqs::set_nice(10);
    assert_eq!(mlfqs::get_nice(), 10);
    // priority = PRI_MAX - recent_cpu/4 - 2*nice, and recent_cpu has not
    // moved since the last sweep: the whole change is the nice term.
    assert_eq!(scheduler::get_priority(), before - 20);

    mlfqs::set_nice(0);
    assert_eq!(scheduler::get_priority(), before);
}

#[test]
fn niceness_is_only_bookkeeping_outside_mlfqs() {
    let _boot = super::boot();
    mlfqs::set_nice(5);
    assert_eq!(mlfqs::get_nice(), 5);
    // Round-robin priorities stay where they were assigned.
    assert_eq!(scheduler::get_priority(), scheduler::PRI_DEFAULT);
    mlfqs::set_nice(0);
}
