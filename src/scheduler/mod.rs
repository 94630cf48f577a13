/*
 * Preemptive Priority Scheduler
 *
 * One logical CPU, strict priority with FIFO tie-break, preemption driven by
 * the timer tick. This module owns the global scheduling state and the run
 * loop: spawning, yielding, blocking, unblocking, exiting, and the context
 * switch that ties them together.
 *
 * LOCKING DISCIPLINE:
 * ==================
 *
 * The scheduler's one mutual-exclusion primitive is "interrupts off"
 * (`interrupt::off()` guards). The global queues additionally sit behind a
 * spin lock so the Rust aliasing story is airtight, but that lock is only
 * ever taken inside an interrupt-off section and never held across a
 * context switch. Lock order: disable interrupts, then take SCHED.
 *
 * THREAD LIFE CYCLE:
 * =================
 *
 *     spawn -> Ready -> Running <-> Ready   (yield, preemption)
 *                          |
 *                          v
 *                       Blocked             (semaphore, lock, sleep)
 *                          |
 *                          v  unblock
 *                        Ready
 *
 *     Running -> Dying -> page freed by the NEXT scheduler pass
 *
 * The two-phase teardown is forced by the stack: an exiting thread is still
 * executing on the page that must be freed, so it only queues itself for
 * destruction and the next `schedule()` entry reclaims it.
 *
 * THE IDLE THREAD:
 * ===============
 *
 * Created by `start()` at minimum priority. It never sits on the ready
 * queue; `next_thread_to_run` returns it as the fallback when the queue is
 * empty, and it halts the CPU until the next interrupt.
 */

pub mod fixed;
pub mod mlfqs;
pub mod sleep;
pub mod thread;

use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicPtr, AtomicU32, AtomicU64, Ordering};

use crate::arch::context;
use crate::collections::list::{self, List};
use crate::interrupt::{self, Level};
use crate::memory::palloc::{self, AllocFlags};
use crate::process;
use crate::sync::lock::{self, Lock};
use crate::sync::semaphore::Semaphore;

pub use thread::{PRI_DEFAULT, PRI_MAX, PRI_MIN, Tcb, ThreadFunc, ThreadState, Tid};

/// Ticks each thread gets before the tick handler requests preemption.
pub const TIME_SLICE: u32 = 4;

/// Boot-time scheduler configuration. The kernel command line recognizes a
/// single option: which scheduling policy to run.
#[derive(Debug, Clone, Copy, Default)]
pub struct BootOptions {
    /// False selects the default round-robin (strict priority) scheduler,
    /// true the multi-level feedback queue scheduler.
    pub mlfqs: bool,
}

/// Failure modes of `spawn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// No page available for the control block and stack.
    NoMemory,
}

/// Global queues. Only touched with interrupts off.
struct Sched {
    /// Threads ready to run, kept in effective-priority order.
    ready: List,
    /// Every live thread, spawn to destruction.
    all: List,
    /// Dying threads whose pages await the next scheduler pass.
    destruction: List,
}

static SCHED: spin::Mutex<Sched> = spin::Mutex::new(Sched {
    ready: List::new(),
    all: List::new(),
    destruction: List::new(),
});

/// The running thread. Exactly one at any moment.
static CURRENT: AtomicPtr<Tcb> = AtomicPtr::new(core::ptr::null_mut());
/// The idle thread, once it has introduced itself.
static IDLE: AtomicPtr<Tcb> = AtomicPtr::new(core::ptr::null_mut());
/// The bootstrap thread; its page is the boot stack and is never freed.
static INITIAL: AtomicPtr<Tcb> = AtomicPtr::new(core::ptr::null_mut());

/// Ticks spent in the current time slice.
static THREAD_TICKS: AtomicU32 = AtomicU32::new(0);

/// Scheduling policy flag; see `BootOptions::mlfqs`.
static MLFQS: AtomicBool = AtomicBool::new(false);

// Tick statistics, reported by `print_stats`.
static IDLE_TICKS: AtomicU64 = AtomicU64::new(0);
static KERNEL_TICKS: AtomicU64 = AtomicU64::new(0);
static USER_TICKS: AtomicU64 = AtomicU64::new(0);

/// Serializes tid allocation; usable from contexts with interrupts enabled.
static TID_LOCK: Lock = Lock::new();

/// Initialize the scheduler and adopt the calling thread as "main".
///
/// Must run with interrupts off, before any other scheduler call. The
/// caller becomes a full-fledged thread: it gets a control block, the
/// default priority and a tid, and is marked running.
pub fn init(options: BootOptions) {
    assert_eq!(
        interrupt::level(),
        Level::Off,
        "scheduler::init requires interrupts off"
    );

    MLFQS.store(options.mlfqs, Ordering::SeqCst);
    mlfqs::reset();

    // Rebuilding the world: reclaim what an earlier instance left behind.
    // On hardware this is a no-op (we boot once); the test harness boots
    // many times per process.
    unsafe {
        let mut sched = SCHED.lock();
        while let Some(e) = sched.destruction.pop_front() {
            palloc::free_page(Tcb::page(Tcb::from_elem(e.as_ptr())));
        }
        sched.ready.reinit();
        sched.all.reinit();
        sched.destruction.reinit();
    }
    sleep::reinit();
    let old_initial = INITIAL.swap(core::ptr::null_mut(), Ordering::SeqCst);
    let old_idle = IDLE.swap(core::ptr::null_mut(), Ordering::SeqCst);
    unsafe {
        if !old_initial.is_null() {
            palloc::free_page(Tcb::page(old_initial));
        }
        if !old_idle.is_null() {
            palloc::free_page(Tcb::page(old_idle));
        }
    }
    THREAD_TICKS.store(0, Ordering::SeqCst);

    let page = palloc::get_page(AllocFlags::ZERO | AllocFlags::ASSERT)
        .expect("no page for the initial thread");
    let main = page.as_ptr() as *mut Tcb;
    unsafe {
        Tcb::init_at(main, "main", PRI_DEFAULT);
        (*main).state = ThreadState::Running;
    }
    INITIAL.store(main, Ordering::SeqCst);
    CURRENT.store(main, Ordering::SeqCst);
    unsafe {
        SCHED.lock().all.push_back(&mut (*main).all_elem);
        (*main).tid = allocate_tid();
    }

    log::info!(
        "scheduler initialized ({} policy)",
        if options.mlfqs { "mlfqs" } else { "round-robin" }
    );
}

/// Start preemptive scheduling.
///
/// Creates the idle thread at minimum priority, enables interrupts, and
/// returns once the idle thread has come up.
pub fn start() {
    let started = Semaphore::new(0);
    spawn(
        "idle",
        PRI_MIN,
        idle_thread,
        &started as *const Semaphore as usize,
    )
    .expect("failed to create the idle thread");

    interrupt::enable();

    // Wait for the idle thread to introduce itself.
    started.down();
    log::info!("scheduler started, preemption enabled");
}

/// Create a new kernel thread and make it runnable.
///
/// The thread first runs inside a trampoline that enables interrupts and
/// calls `entry(aux)`; if `entry` returns the thread exits. Returns the new
/// thread's tid, or an error when no page is available.
///
/// If the new thread outranks the caller, the caller yields before this
/// function returns.
pub fn spawn(name: &str, priority: i32, entry: ThreadFunc, aux: usize) -> Result<Tid, SpawnError> {
    let page = palloc::get_page(AllocFlags::ZERO).ok_or(SpawnError::NoMemory)?;
    let t = page.as_ptr() as *mut Tcb;

    let tid;
    unsafe {
        Tcb::init_at(t, name, priority);
        (*t).entry = Some(entry);
        (*t).aux = aux;
        (*t).ctx.rsp = context::prepare_initial_stack(Tcb::stack_top(t), spawn_trampoline);

        if mlfqs_enabled() {
            // Children inherit the parent's niceness and CPU history; the
            // next priority sweep folds them into the computed priority.
            let parent = current_ptr();
            (*t).nice = (*parent).nice;
            (*t).recent_cpu = (*parent).recent_cpu;
        }

        tid = allocate_tid();
        (*t).tid = tid;

        {
            let _off = interrupt::off();
            SCHED.lock().all.push_back(&mut (*t).all_elem);
        }

        log::debug!("spawned thread {} '{}' priority {}", tid, name, priority);
        unblock(NonNull::new_unchecked(t));
    }
    Ok(tid)
}

/// The running thread's control block.
///
/// Checks the magic value on every call: if this assertion fires, the
/// thread has very likely overflowed its kernel stack.
pub fn current() -> NonNull<Tcb> {
    let t = current_ptr();
    unsafe {
        assert_eq!((*t).state, ThreadState::Running, "current thread not running");
    }
    NonNull::new(t).expect("no current thread")
}

/// Like `current`, but without the state assertion. For internal paths that
/// run between the status change and the switch.
pub(crate) fn current_ptr() -> *mut Tcb {
    let t = CURRENT.load(Ordering::SeqCst);
    assert!(!t.is_null(), "scheduler not initialized");
    unsafe {
        assert!(
            (*t).is_valid(),
            "thread magic clobbered (kernel stack overflow?)"
        );
    }
    t
}

/// The running thread's tid.
pub fn current_tid() -> Tid {
    unsafe { (*current().as_ptr()).tid }
}

/// The running thread's display name.
pub fn current_name() -> heapless::String<{ thread::NAME_MAX }> {
    unsafe { (*current().as_ptr()).name.clone() }
}

/// Run `f` against the running thread's control block.
pub fn with_current<R>(f: impl FnOnce(&Tcb) -> R) -> R {
    unsafe { f(&*current().as_ptr()) }
}

/// Give up the CPU. The caller stays runnable and competes for the CPU
/// again immediately.
pub fn yield_now() {
    assert!(!interrupt::in_handler(), "yield inside an interrupt handler");
    let cur = current().as_ptr();

    let _off = interrupt::off();
    unsafe {
        if cur != IDLE.load(Ordering::SeqCst) {
            SCHED
                .lock()
                .ready
                .insert_ordered(&mut (*cur).elem, thread::higher_priority);
        }
        do_schedule(ThreadState::Ready);
    }
}

/// Put the running thread to sleep.
///
/// Interrupts must already be off, and the caller must already have placed
/// the thread on whatever wait set will produce the matching `unblock`.
/// Returns when somebody unblocks us.
pub fn block() {
    assert!(!interrupt::in_handler(), "block inside an interrupt handler");
    assert_eq!(interrupt::level(), Level::Off, "block requires interrupts off");
    unsafe { do_schedule(ThreadState::Blocked) };
}

/// Make a blocked thread runnable.
///
/// Does not touch any wait set: the caller removes the thread from wherever
/// it was waiting. If the thread outranks the running one, the running
/// thread yields (immediately, or on interrupt return when called from a
/// handler).
pub fn unblock(t: NonNull<Tcb>) {
    let t = t.as_ptr();
    let new_priority;
    {
        let _off = interrupt::off();
        unsafe {
            assert!((*t).is_valid(), "unblock of an invalid thread");
            assert_eq!(
                (*t).state,
                ThreadState::Blocked,
                "unblock of a thread that is not blocked"
            );
            SCHED
                .lock()
                .ready
                .insert_ordered(&mut (*t).elem, thread::higher_priority);
            (*t).state = ThreadState::Ready;
            new_priority = (*t).effective_priority;
        }
    }
    maybe_preempt(new_priority);
}

/// Terminate the running thread. Never returns; the thread's page is freed
/// by the next scheduler pass.
pub fn exit() -> ! {
    assert!(!interrupt::in_handler(), "exit inside an interrupt handler");
    let cur = current().as_ptr();
    unsafe {
        log::debug!("thread {} '{}' exiting", (*cur).tid, (*cur).name.as_str());

        interrupt::disable();
        {
            let _sched = SCHED.lock();
            list::remove(&mut (*cur).all_elem);
        }
        do_schedule(ThreadState::Dying);
    }
    unreachable!("schedule() returned to a dying thread");
}

/// Timer tick bookkeeping. Called by the timer interrupt handler once per
/// tick; requests preemption when the slice is spent.
pub fn tick() {
    assert!(interrupt::in_handler(), "tick outside the timer handler");
    let cur = current_ptr();

    if cur == IDLE.load(Ordering::SeqCst) {
        IDLE_TICKS.fetch_add(1, Ordering::SeqCst);
    } else if unsafe { (*cur).addr_space } != 0 {
        USER_TICKS.fetch_add(1, Ordering::SeqCst);
    } else {
        KERNEL_TICKS.fetch_add(1, Ordering::SeqCst);
    }

    if mlfqs_enabled() {
        mlfqs::on_tick(cur);
    }

    if THREAD_TICKS.fetch_add(1, Ordering::SeqCst) + 1 >= TIME_SLICE {
        interrupt::yield_on_return();
    }
}

/// The running thread's effective priority.
pub fn get_priority() -> i32 {
    unsafe { (*current().as_ptr()).effective_priority }
}

/// Set the running thread's base priority.
///
/// The effective priority stays raised while donors are present. If the
/// change leaves some ready thread with a higher priority, the caller
/// yields. Ignored under the MLFQS policy, where priorities are computed.
pub fn set_priority(priority: i32) {
    assert!(
        (PRI_MIN..=PRI_MAX).contains(&priority),
        "priority out of range"
    );
    if mlfqs_enabled() {
        return;
    }

    let cur = current().as_ptr();
    let outranked;
    {
        let _off = interrupt::off();
        unsafe {
            (*cur).base_priority = priority;
            lock::refresh_priority(cur);
            outranked = top_ready_priority() > (*cur).effective_priority;
        }
    }
    if outranked {
        yield_now();
    }
}

/// Log the tick statistics.
pub fn print_stats() {
    log::info!(
        "Thread: {} idle ticks, {} kernel ticks, {} user ticks",
        IDLE_TICKS.load(Ordering::SeqCst),
        KERNEL_TICKS.load(Ordering::SeqCst),
        USER_TICKS.load(Ordering::SeqCst)
    );
}

pub(crate) fn mlfqs_enabled() -> bool {
    MLFQS.load(Ordering::SeqCst)
}

pub(crate) fn idle_ptr() -> *mut Tcb {
    IDLE.load(Ordering::SeqCst)
}

/// Ready or running threads, the idle thread excluded. Input to the MLFQS
/// load average.
pub(crate) fn ready_thread_count() -> usize {
    let _off = interrupt::off();
    let mut n = SCHED.lock().ready.len();
    if current_ptr() != idle_ptr() {
        n += 1;
    }
    n
}

/// Visit every live thread. Interrupts must be off.
pub(crate) unsafe fn for_each_thread(mut f: impl FnMut(*mut Tcb)) {
    debug_assert_eq!(interrupt::level(), Level::Off);
    let mut sched = SCHED.lock();
    unsafe {
        for e in sched.all.iter() {
            f(Tcb::from_all_elem(e.as_ptr()));
        }
    }
}

/// Highest effective priority on the ready queue, or PRI_MIN - 1 when it is
/// empty. Interrupts must be off.
fn top_ready_priority() -> i32 {
    let mut sched = SCHED.lock();
    unsafe {
        sched
            .ready
            .max(thread::lower_priority)
            .map(|e| unsafe { (*Tcb::from_elem(e.as_ptr())).effective_priority })
            .unwrap_or(PRI_MIN - 1)
    }
}

/// Yield to a freshly readied thread when it outranks the running one.
/// From handler context the yield is deferred to interrupt return.
fn maybe_preempt(new_priority: i32) {
    let cur = CURRENT.load(Ordering::SeqCst);
    if cur.is_null() {
        return;
    }
    if new_priority > unsafe { (*cur).effective_priority } {
        if interrupt::in_handler() {
            interrupt::yield_on_return();
        } else {
            yield_now();
        }
    }
}

/// Next tid, guarded by its own lock so allocation also works from contexts
/// that keep interrupts enabled.
fn allocate_tid() -> Tid {
    static NEXT_TID: AtomicU64 = AtomicU64::new(1);
    let _guard = TID_LOCK.lock();
    Tid(NEXT_TID.fetch_add(1, Ordering::SeqCst))
}

/// Change the running thread's status and pick the next thread.
///
/// Entered with interrupts off. Also the reclamation point: pages of
/// threads that died earlier are freed here, never from the dying thread
/// itself (its stack lives in the page being freed).
unsafe fn do_schedule(status: ThreadState) {
    assert_eq!(interrupt::level(), Level::Off);
    let cur = current_ptr();
    unsafe {
        assert_eq!((*cur).state, ThreadState::Running);

        loop {
            let victim = { SCHED.lock().destruction.pop_front() };
            match victim {
                Some(e) => {
                    let dead = Tcb::from_elem(e.as_ptr());
                    log::debug!("reclaiming thread {} '{}'", (*dead).tid, (*dead).name.as_str());
                    palloc::free_page(Tcb::page(dead));
                }
                None => break,
            }
        }

        (*cur).state = status;
        schedule();
    }
}

/// Pick the highest-priority ready thread (or idle) and switch to it.
///
/// Interrupts are off and the current thread's status has already been set
/// to its post-switch value. Not safe to log here once the queues are
/// touched; the switch target may hold the logger's sink.
unsafe fn schedule() {
    assert_eq!(interrupt::level(), Level::Off);
    let cur = CURRENT.load(Ordering::SeqCst);
    unsafe {
        assert_ne!((*cur).state, ThreadState::Running);

        let next = next_thread_to_run();
        assert!((*next).is_valid());
        (*next).state = ThreadState::Running;
        THREAD_TICKS.store(0, Ordering::SeqCst);

        // Install the incoming thread's address space, if it has one.
        process::activate(&*next);

        if cur != next {
            CURRENT.store(next, Ordering::SeqCst);
            if (*cur).state == ThreadState::Dying && cur != INITIAL.load(Ordering::SeqCst) {
                SCHED.lock().destruction.push_back(&mut (*cur).elem);
            }
            context::context_switch(&mut (*cur).ctx, &(*next).ctx);
        }
    }
}

/// Pop the thread to dispatch. The ready queue is re-sorted first: donation
/// can raise the priority of a thread that is already queued, and dispatch
/// must honor the current values. The sort is stable, so the FIFO tie-break
/// survives.
unsafe fn next_thread_to_run() -> *mut Tcb {
    let mut sched = SCHED.lock();
    unsafe {
        sched.ready.sort(thread::higher_priority);
        match sched.ready.pop_front() {
            Some(e) => Tcb::from_elem(e.as_ptr()),
            None => {
                let idle = IDLE.load(Ordering::SeqCst);
                assert!(!idle.is_null(), "nothing to run and no idle thread");
                idle
            }
        }
    }
}

/// First code a new thread executes. The scheduler left interrupts off;
/// turn them on, run the thread function, and exit if it returns.
extern "C" fn spawn_trampoline() -> ! {
    interrupt::enable();

    let (entry, aux) = unsafe {
        let t = current().as_ptr();
        ((*t).entry.take().expect("thread without an entry"), (*t).aux)
    };
    entry(aux);
    exit()
}

/// The idle thread. Runs when nothing else is ready: wakes once to
/// introduce itself, then alternates between blocking and halting the CPU
/// until the next interrupt.
fn idle_thread(started: usize) {
    let started = started as *const Semaphore;
    IDLE.store(current().as_ptr(), Ordering::SeqCst);
    unsafe { (*started).up() };

    loop {
        interrupt::disable();
        block();

        // Re-enable interrupts and wait for the next one. The sti;hlt pair
        // in halt_with_interrupts runs atomically, so a tick cannot land in
        // between and strand us halted.
        interrupt::mark_enabled();
        crate::arch::halt_with_interrupts();
    }
}
