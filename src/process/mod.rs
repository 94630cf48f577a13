/*
 * Process Services and Collaborator Contracts
 *
 * The scheduler substrate does not load programs, manage address spaces or
 * implement a filesystem. Those live elsewhere; what this module keeps is
 * the narrow contract the syscall dispatcher and the scheduler need from
 * them:
 *
 *   - `FileSys`: the file operations the file syscalls dispatch to;
 *   - `ProcessServices`: exec / fork / wait;
 *   - the address-space activate hook `schedule()` invokes when switching
 *     to a thread that has one;
 *   - the page-table probe syscall pointer validation consults;
 *   - exit bookkeeping: the status recorded in the TCB for WAIT to
 *     harvest.
 *
 * Providers register once at boot. Absent providers degrade gracefully:
 * file and process syscalls report failure, the activate hook is a no-op,
 * and the page probe treats user addresses as mapped (there is no paging
 * module to ask).
 */

use spin::Once;

use crate::scheduler::{self, thread::Tcb};

/// Filesystem operations reachable through syscalls. The provider owns fd
/// allocation and the backing store; descriptors 0..2 are its concern too.
/// Operations report failure as -1 (or false), never by panicking.
pub trait FileSys: Sync {
    fn create(&self, path: &str, initial_size: u32) -> bool;
    fn remove(&self, path: &str) -> bool;
    fn open(&self, path: &str) -> i32;
    fn filesize(&self, fd: i32) -> i32;
    fn read(&self, fd: i32, buf: &mut [u8]) -> i32;
    fn write(&self, fd: i32, buf: &[u8]) -> i32;
    fn seek(&self, fd: i32, pos: u32);
    fn tell(&self, fd: i32) -> i32;
    fn close(&self, fd: i32);
    fn dup2(&self, old_fd: i32, new_fd: i32) -> i32;
}

/// Process-management operations reachable through syscalls.
pub trait ProcessServices: Sync {
    /// Replace the current process image. Returns only on failure, with
    /// the status to exit with.
    fn exec(&self, cmd_line: &str) -> i32;
    /// Clone the current process. Returns the child pid to the parent, 0
    /// to the child, -1 on failure.
    fn fork(&self, name: &str) -> i32;
    /// Wait for a child to exit and harvest its status; -1 if `pid` is not
    /// a waitable child.
    fn wait(&self, pid: i32) -> i32;
}

static FILESYS: Once<&'static dyn FileSys> = Once::new();
static SERVICES: Once<&'static dyn ProcessServices> = Once::new();
static ACTIVATE: Once<fn(&Tcb)> = Once::new();
static PAGE_PROBE: Once<fn(u64) -> bool> = Once::new();

/// Register the filesystem provider. First registration wins.
pub fn install_filesys(fs: &'static dyn FileSys) {
    FILESYS.call_once(|| fs);
}

/// Register the process-management provider. First registration wins.
pub fn install_services(services: &'static dyn ProcessServices) {
    SERVICES.call_once(|| services);
}

/// Register the hook that installs a thread's page tables on dispatch.
pub fn install_activate_hook(hook: fn(&Tcb)) {
    ACTIVATE.call_once(|| hook);
}

/// Register the probe that answers "is this user address mapped?".
pub fn install_page_probe(probe: fn(u64) -> bool) {
    PAGE_PROBE.call_once(|| probe);
}

pub fn filesys() -> Option<&'static dyn FileSys> {
    FILESYS.get().copied()
}

pub fn services() -> Option<&'static dyn ProcessServices> {
    SERVICES.get().copied()
}

/// Called by `schedule()` before the context switch: install the incoming
/// thread's address space, if it has one.
pub(crate) fn activate(t: &Tcb) {
    if t.addr_space != 0 {
        if let Some(hook) = ACTIVATE.get() {
            hook(t);
        }
    }
}

/// Whether `addr` is mapped in the calling process's page table. With no
/// paging module registered there is nobody to ask, and the range checks
/// in the syscall layer are the whole validation.
pub(crate) fn is_user_page_mapped(addr: u64) -> bool {
    match PAGE_PROBE.get() {
        Some(probe) => probe(addr),
        None => true,
    }
}

/// Terminate the current process with `status`.
///
/// Records the status in the control block, where WAIT finds it, announces
/// the exit in the conventional format, and never returns.
pub fn exit_with(status: i32) -> ! {
    let cur = scheduler::current().as_ptr();
    unsafe {
        (*cur).exit_status = status;
        log::info!("{}: exit({})", (*cur).name.as_str(), status);
    }
    scheduler::exit()
}

/// Stop the machine. The HALT syscall lands here.
pub fn halt() -> ! {
    log::info!("system halt requested");
    crate::arch::halt_system()
}
