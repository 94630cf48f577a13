/*
 * Synchronization Primitives
 *
 * The blocking primitives threads coordinate with, layered bottom-up:
 * the counting semaphore is the base mechanism, the lock adds ownership
 * and priority donation on top of a binary semaphore, and the condition
 * variable builds signal/wait out of per-waiter semaphores.
 *
 * All of them park waiting threads on intrusive wait sets and rely on the
 * scheduler's interrupt-off discipline; none of them spin.
 */

pub mod condvar;
pub mod lock;
pub mod semaphore;

pub use condvar::Condvar;
pub use lock::Lock;
pub use semaphore::Semaphore;
