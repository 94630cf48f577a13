/*
 * Multi-Level Feedback Queue Statistics
 *
 * The alternative scheduling policy, selected by the boot option. Instead
 * of honoring explicitly assigned priorities, the scheduler computes every
 * thread's priority from its recent CPU usage and its niceness, using the
 * classic BSD decay formulas:
 *
 *     load_avg   = (59/60)*load_avg + (1/60)*ready_threads      every second
 *     recent_cpu = (2*load_avg)/(2*load_avg + 1)*recent_cpu + nice   "
 *     priority   = PRI_MAX - recent_cpu/4 - 2*nice         every 4 ticks
 *
 * plus one increment of the running thread's recent_cpu per tick. All
 * fractional state is 17.14 fixed point (`fixed`).
 *
 * Under this policy `set_priority` is ignored and priority donation is
 * disabled; priorities move only through the formulas above. The idle
 * thread is exempt from the sweeps, it stays at the bottom by construction.
 */

use crate::interrupt;
use crate::scheduler;
use crate::scheduler::fixed::Fixed;
use crate::scheduler::thread::{PRI_MAX, PRI_MIN, Tcb};
use crate::utils::timer::TIMER_FREQ;

/// Niceness bounds.
pub const NICE_MIN: i32 = -20;
pub const NICE_MAX: i32 = 20;

/// System load average, updated once per second.
static LOAD_AVG: spin::Mutex<Fixed> = spin::Mutex::new(Fixed::ZERO);

/// Forget all history. Part of `scheduler::init`.
pub(crate) fn reset() {
    *LOAD_AVG.lock() = Fixed::ZERO;
}

/// Per-tick work, called from `scheduler::tick` with interrupts off.
pub(crate) fn on_tick(cur: *mut Tcb) {
    // The running thread accumulates CPU time; idle time counts for nobody.
    if cur != scheduler::idle_ptr() {
        unsafe {
            (*cur).recent_cpu = (*cur).recent_cpu.add_int(1);
        }
    }

    let now = crate::utils::timer::ticks();
    if now % TIMER_FREQ as i64 == 0 {
        decay_second();
    }
    if now % 4 == 0 {
        recompute_priorities();
    }
}

/// Once-per-second decay: refresh the load average, then decay every
/// thread's recent_cpu against it.
fn decay_second() {
    let ready = scheduler::ready_thread_count() as i32;
    let load = {
        let mut load_avg = LOAD_AVG.lock();
        *load_avg = Fixed::ratio(59, 60)
            .mul(*load_avg)
            .add(Fixed::ratio(1, 60).mul_int(ready));
        *load_avg
    };

    let coeff = load.mul_int(2).div(load.mul_int(2).add_int(1));
    let idle = scheduler::idle_ptr();
    unsafe {
        scheduler::for_each_thread(|t| {
            if t != idle {
                unsafe {
                    (*t).recent_cpu = coeff.mul((*t).recent_cpu).add_int((*t).nice);
                }
            }
        });
    }
}

/// Every-4-ticks sweep: recompute each thread's priority from its decayed
/// CPU usage. The ready queue is re-sorted at the next dispatch.
fn recompute_priorities() {
    let idle = scheduler::idle_ptr();
    unsafe {
        scheduler::for_each_thread(|t| {
            if t != idle {
                unsafe {
                    let p = priority_for(&*t);
                    (*t).base_priority = p;
                    (*t).effective_priority = p;
                }
            }
        });
    }
}

/// The policy's priority formula, clamped to the valid range.
pub(crate) fn priority_for(t: &Tcb) -> i32 {
    let p = PRI_MAX - t.recent_cpu.div_int(4).to_int_round() - 2 * t.nice;
    p.clamp(PRI_MIN, PRI_MAX)
}

/// Set the running thread's niceness and recompute its priority, then
/// yield so the scheduler can re-evaluate who belongs on the CPU.
pub fn set_nice(nice: i32) {
    let nice = nice.clamp(NICE_MIN, NICE_MAX);
    let cur = scheduler::current().as_ptr();
    {
        let _off = interrupt::off();
        unsafe {
            (*cur).nice = nice;
            if scheduler::mlfqs_enabled() {
                let p = priority_for(&*cur);
                (*cur).base_priority = p;
                (*cur).effective_priority = p;
            }
        }
    }
    if scheduler::mlfqs_enabled() {
        scheduler::yield_now();
    }
}

/// The running thread's niceness.
pub fn get_nice() -> i32 {
    unsafe { (*scheduler::current().as_ptr()).nice }
}

/// 100 times the system load average, rounded.
pub fn get_load_avg() -> i32 {
    LOAD_AVG.lock().mul_int(100).to_int_round()
}

/// 100 times the running thread's recent_cpu, rounded.
pub fn get_recent_cpu() -> i32 {
    unsafe {
        (*scheduler::current().as_ptr())
            .recent_cpu
            .mul_int(100)
            .to_int_round()
    }
}
