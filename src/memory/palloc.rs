/*
 * Page Allocator Facade
 *
 * Fixed 4 KiB pages for kernel objects that are page-shaped by design, most
 * importantly thread control blocks, which occupy the bottom of their page
 * with the thread's kernel stack above them.
 *
 * Pages come from the global allocator (the kernel heap on bare metal, the
 * platform allocator in host tests). Failure is a `None`, never a panic,
 * unless the caller explicitly opted into ASSERT; `spawn` turns a `None`
 * into an error return, because thread creation must be allowed to fail
 * gracefully.
 */

use alloc::alloc::{Layout, alloc, alloc_zeroed, dealloc};
use core::ptr::NonNull;

use bitflags::bitflags;

/// Size of one page in bytes.
pub const PGSIZE: usize = 4096;

bitflags! {
    /// Allocation behavior flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AllocFlags: u32 {
        /// Return the page zero-filled.
        const ZERO = 1 << 0;
        /// Panic instead of returning None on exhaustion.
        const ASSERT = 1 << 1;
    }
}

/// One page, page-aligned.
#[repr(C, align(4096))]
pub struct Page(pub [u8; PGSIZE]);

impl Page {
    fn layout() -> Layout {
        Layout::new::<Page>()
    }
}

/// Allocate one page.
pub fn get_page(flags: AllocFlags) -> Option<NonNull<Page>> {
    let raw = unsafe {
        if flags.contains(AllocFlags::ZERO) {
            alloc_zeroed(Page::layout())
        } else {
            alloc(Page::layout())
        }
    };
    let page = NonNull::new(raw as *mut Page);
    if page.is_none() {
        log::warn!("palloc: out of pages");
        assert!(
            !flags.contains(AllocFlags::ASSERT),
            "palloc: allocation failed with ASSERT set"
        );
    }
    page
}

/// Return a page to the allocator.
///
/// # Safety
/// `page` must have come from `get_page` and must not be referenced again.
/// In particular nothing may still be executing on a stack inside it, which
/// is why dying threads are freed from the next scheduler pass rather than
/// from their own context.
pub unsafe fn free_page(page: NonNull<Page>) {
    unsafe { dealloc(page.as_ptr() as *mut u8, Page::layout()) }
}
