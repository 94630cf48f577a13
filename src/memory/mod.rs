/*
 * Memory Services
 *
 * The scheduler needs exactly two things from the memory subsystem: whole
 * 4 KiB pages for thread control blocks (palloc) and, on bare metal, a heap
 * to back the ordinary `alloc` machinery (heap).
 *
 * Paging, address spaces and the physical frame map are external
 * collaborators; their only trace here is the `activate` hook the scheduler
 * invokes on context switch (see `process`).
 */

pub mod heap;
pub mod palloc;

pub use palloc::{AllocFlags, PGSIZE, Page};
