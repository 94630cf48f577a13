/*
 * Thread Control Block
 *
 * Every thread lives in its own 4 KiB page. The control block sits at the
 * very bottom of the page and the thread's kernel stack grows downward from
 * the top, toward it:
 *
 *      4 KiB +---------------------------------+
 *            |          kernel stack           |
 *            |                |                |
 *            |                v                |
 *            |         grows downward          |
 *            |                                 |
 *            +---------------------------------+
 *            |              magic              |
 *            |               ...               |
 *            |              name               |
 *            |              state              |
 *      0 KiB +---------------------------------+
 *
 * Two consequences. The control block must stay small, and kernel stacks
 * must stay shallow: big local arrays or deep recursion will walk the stack
 * into the control block. `magic` is deliberately the last field, so an
 * overflowing stack clobbers it first, and every `scheduler::current()`
 * checks it. An assertion failure there almost always means stack overflow,
 * not a scheduler bug.
 *
 * The embedded `elem` link serves the ready queue, a semaphore wait set,
 * the sleep set or the destruction queue. A thread can only ever be on one
 * of those at a time (a ready thread is not blocked, a blocked thread is
 * not dying), which is exactly why a single link suffices. `donation_elem`
 * is separate because a thread blocked on a lock sits on two sets at once:
 * the lock's wait set (via `elem`) and the holder's donor set.
 */

use core::fmt;
use core::ptr::NonNull;

use crate::collections::list::{List, ListElem, list_entry};
use crate::memory::palloc::{PGSIZE, Page};
use crate::scheduler::fixed::Fixed;
use crate::arch::context::SwitchFrame;
use crate::sync::lock::Lock;

/// Lowest priority.
pub const PRI_MIN: i32 = 0;
/// Default priority.
pub const PRI_DEFAULT: i32 = 31;
/// Highest priority.
pub const PRI_MAX: i32 = 63;

/// Maximum length of a thread display name, terminator not needed.
pub const NAME_MAX: usize = 16;

/// Arbitrary value stamped into every live control block.
pub(crate) const THREAD_MAGIC: u32 = 0x6263_746b;

/// Thread identifier. Monotonically assigned, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tid(pub u64);

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// States in a thread's life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// On the CPU. Exactly one thread at any moment.
    Running,
    /// Runnable, waiting on the ready queue.
    Ready,
    /// Waiting for an event: a semaphore, a lock, a wake-up tick.
    Blocked,
    /// Finished; its page is reclaimed by the next scheduler pass.
    Dying,
}

/// Entry point of a kernel thread. The argument is the `aux` value given to
/// `spawn`.
pub type ThreadFunc = fn(usize);

/// A thread control block.
///
/// `#[repr(C)]` pins the field order: `magic` must remain the highest field
/// so a stack overflow reaches it before anything else.
#[repr(C)]
pub struct Tcb {
    pub tid: Tid,
    pub state: ThreadState,
    pub name: heapless::String<NAME_MAX>,

    /// Priority assigned by `spawn` or `set_priority`.
    pub base_priority: i32,
    /// Priority the scheduler dispatches by: base raised by donations.
    pub effective_priority: i32,

    /// Tick this thread should wake at. Meaningful only on the sleep set.
    pub wake_tick: i64,

    /// Ready queue / wait set / sleep set / destruction queue membership.
    pub elem: ListElem,
    /// Membership in the all-threads list, from spawn until destruction.
    pub all_elem: ListElem,
    /// Membership in a lock holder's donor set while blocked on that lock.
    pub donation_elem: ListElem,

    /// Threads currently donating their priority to us.
    pub donors: List,
    /// The lock this thread is blocked on, if any.
    pub wait_on_lock: *const Lock,

    /// MLFQS niceness, in [-20, 20].
    pub nice: i32,
    /// MLFQS exponentially weighted CPU usage.
    pub recent_cpu: Fixed,

    /// Status recorded by the EXIT syscall, harvested by WAIT.
    pub exit_status: i32,
    /// Opaque address-space handle for the activate hook; 0 for pure
    /// kernel threads.
    pub addr_space: usize,

    pub(crate) entry: Option<ThreadFunc>,
    pub(crate) aux: usize,

    /// Saved registers while not running.
    pub(crate) ctx: SwitchFrame,

    /// Stack-overflow canary. Keep last.
    pub(crate) magic: u32,
}

// The control block must leave the lion's share of its page to the stack.
const _: () = assert!(core::mem::size_of::<Tcb>() <= 1024);

impl Tcb {
    /// Basic initialization of the block at `t` as a blocked thread.
    ///
    /// # Safety
    /// `t` must point at the bottom of a zeroed, exclusively owned page.
    pub(crate) unsafe fn init_at(t: *mut Tcb, name: &str, priority: i32) {
        assert!((PRI_MIN..=PRI_MAX).contains(&priority), "priority out of range");

        let mut tname: heapless::String<NAME_MAX> = heapless::String::new();
        for c in name.chars() {
            if tname.push(c).is_err() {
                break;
            }
        }

        unsafe {
            t.write(Tcb {
                tid: Tid(0),
                state: ThreadState::Blocked,
                name: tname,
                base_priority: priority,
                effective_priority: priority,
                wake_tick: 0,
                elem: ListElem::new(),
                all_elem: ListElem::new(),
                donation_elem: ListElem::new(),
                donors: List::new(),
                wait_on_lock: core::ptr::null(),
                nice: 0,
                recent_cpu: Fixed::ZERO,
                exit_status: 0,
                addr_space: 0,
                entry: None,
                aux: 0,
                ctx: SwitchFrame::zeroed(),
                magic: THREAD_MAGIC,
            });
        }
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.magic == THREAD_MAGIC
    }

    /// The page this control block (and its stack) occupy.
    pub(crate) fn page(t: *mut Tcb) -> NonNull<Page> {
        NonNull::new(t as *mut Page).expect("thread page pointer is null")
    }

    /// One past the highest stack address of the thread's page.
    pub(crate) fn stack_top(t: *mut Tcb) -> *mut u8 {
        unsafe { (t as *mut u8).add(PGSIZE) }
    }

    /// Recover the control block from its queue link.
    ///
    /// # Safety
    /// `e` must be the `elem` field of a live `Tcb`.
    pub(crate) unsafe fn from_elem(e: *mut ListElem) -> *mut Tcb {
        unsafe { list_entry!(e, Tcb, elem) }
    }

    /// Recover the control block from its all-threads link.
    ///
    /// # Safety
    /// `e` must be the `all_elem` field of a live `Tcb`.
    pub(crate) unsafe fn from_all_elem(e: *mut ListElem) -> *mut Tcb {
        unsafe { list_entry!(e, Tcb, all_elem) }
    }

    /// Recover the control block from its donor-set link.
    ///
    /// # Safety
    /// `e` must be the `donation_elem` field of a live `Tcb`.
    pub(crate) unsafe fn from_donation_elem(e: *mut ListElem) -> *mut Tcb {
        unsafe { list_entry!(e, Tcb, donation_elem) }
    }
}

impl fmt::Debug for Tcb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tcb")
            .field("tid", &self.tid)
            .field("name", &self.name.as_str())
            .field("state", &self.state)
            .field("base_priority", &self.base_priority)
            .field("effective_priority", &self.effective_priority)
            .finish()
    }
}

/// Ordering helper for the ready queue and every wait set: true when `a`
/// should run before `b`. Ties keep insertion order, which gives the FIFO
/// tie-break.
///
/// Safe to call only on elements that are `Tcb::elem` links.
pub(crate) fn higher_priority(a: &ListElem, b: &ListElem) -> bool {
    unsafe {
        let a = Tcb::from_elem(a as *const ListElem as *mut ListElem);
        let b = Tcb::from_elem(b as *const ListElem as *mut ListElem);
        (*a).effective_priority > (*b).effective_priority
    }
}

/// Ascending companion of `higher_priority`, for max-scans.
pub(crate) fn lower_priority(a: &ListElem, b: &ListElem) -> bool {
    higher_priority(b, a)
}

/// Same ordering, for donor sets (which link through `donation_elem`).
pub(crate) fn higher_priority_donation(a: &ListElem, b: &ListElem) -> bool {
    unsafe {
        let a = Tcb::from_donation_elem(a as *const ListElem as *mut ListElem);
        let b = Tcb::from_donation_elem(b as *const ListElem as *mut ListElem);
        (*a).effective_priority > (*b).effective_priority
    }
}

/// Ascending companion of `higher_priority_donation`, for max-scans over
/// donor sets.
pub(crate) fn lower_priority_donation(a: &ListElem, b: &ListElem) -> bool {
    higher_priority_donation(b, a)
}

/// Deadline ordering for the sleep set: earlier wake ticks first, ties in
/// insertion order.
pub(crate) fn earlier_wakeup(a: &ListElem, b: &ListElem) -> bool {
    unsafe {
        let a = Tcb::from_elem(a as *const ListElem as *mut ListElem);
        let b = Tcb::from_elem(b as *const ListElem as *mut ListElem);
        (*a).wake_tick < (*b).wake_tick
    }
}
