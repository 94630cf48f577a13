/*
 * Kernel Heap
 *
 * Bare-metal backing for `alloc`. The boot path hands this module one large
 * region once the physical map is known; everything else in the kernel then
 * allocates through the ordinary `alloc` interfaces.
 *
 * Host builds (including the test suite) never initialize this; they use
 * the platform allocator, and the `global_allocator` registration is
 * compiled out.
 */

use linked_list_allocator::LockedHeap;

#[cfg_attr(target_os = "none", global_allocator)]
static KERNEL_HEAP: LockedHeap = LockedHeap::empty();

/// Hand the heap its backing region. Call once, before the first
/// allocation.
///
/// # Safety
/// `start..start + size` must be writable, unused memory that stays
/// reserved for the heap forever.
pub unsafe fn init(start: *mut u8, size: usize) {
    unsafe { KERNEL_HEAP.lock().init(start, size) };
    log::info!("kernel heap initialized: {} KiB", size / 1024);
}
