/*
 * System Call Numbers
 *
 * The call table user processes see. The number travels in RAX; up to six
 * arguments in RDI, RSI, RDX, R10, R8, R9 (R10 stands in for RCX, which
 * the SYSCALL instruction consumes); the result returns in RAX.
 *
 * Numbering is dense and starts at zero, in the order the calls are
 * dispatched.
 */

/// Stop the machine.
///
/// Arguments: none. Does not return.
pub const SYS_HALT: u64 = 0;

/// Terminate the current process.
///
/// Arguments: (status: i32). Does not return; the status is saved for a
/// parent's WAIT.
pub const SYS_EXIT: u64 = 1;

/// Clone the current process.
///
/// Arguments: (name: *const c_char) -> pid. Returns 0 to the child.
pub const SYS_FORK: u64 = 2;

/// Replace the process image.
///
/// Arguments: (cmd_line: *const c_char). Returns only on failure.
pub const SYS_EXEC: u64 = 3;

/// Wait for a child process and collect its exit status.
///
/// Arguments: (pid: i32) -> status, or -1 if pid is not a waitable child.
pub const SYS_WAIT: u64 = 4;

/// Create a file.
///
/// Arguments: (path: *const c_char, initial_size: u32) -> bool.
pub const SYS_CREATE: u64 = 5;

/// Delete a file.
///
/// Arguments: (path: *const c_char) -> bool.
pub const SYS_REMOVE: u64 = 6;

/// Open a file.
///
/// Arguments: (path: *const c_char) -> fd, or -1.
pub const SYS_OPEN: u64 = 7;

/// Size of an open file in bytes.
///
/// Arguments: (fd: i32) -> size, or -1.
pub const SYS_FILESIZE: u64 = 8;

/// Read from a descriptor.
///
/// Arguments: (fd: i32, buf: *mut u8, n: u32) -> bytes read, or -1.
pub const SYS_READ: u64 = 9;

/// Write to a descriptor.
///
/// Arguments: (fd: i32, buf: *const u8, n: u32) -> bytes written, or -1.
pub const SYS_WRITE: u64 = 10;

/// Move a descriptor's file position.
///
/// Arguments: (fd: i32, pos: u32).
pub const SYS_SEEK: u64 = 11;

/// Report a descriptor's file position.
///
/// Arguments: (fd: i32) -> pos, or -1.
pub const SYS_TELL: u64 = 12;

/// Close a descriptor.
///
/// Arguments: (fd: i32).
pub const SYS_CLOSE: u64 = 13;

/// Duplicate old_fd onto new_fd.
///
/// Arguments: (old_fd: i32, new_fd: i32) -> new_fd, or -1.
pub const SYS_DUP2: u64 = 14;
