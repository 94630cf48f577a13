/*
 * Kernel Collections
 *
 * Containers usable from scheduler context. The only member so far is the
 * intrusive doubly-linked list, which the scheduler, the sleep set and every
 * synchronization primitive use for their queues.
 */

pub mod list;

pub use list::{List, ListElem};
