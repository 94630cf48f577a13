/*
 * Architecture Dispatch
 *
 * Everything machine-specific funnels through here. The scheduler proper is
 * architecture-neutral; it consumes exactly three things from this module:
 * the register switch, the idle wait, and the terminal halt.
 */

#[cfg(target_arch = "x86_64")]
pub mod x86_64;

#[cfg(target_arch = "x86_64")]
pub use self::x86_64::{context, halt_system, halt_with_interrupts};

#[cfg(not(target_arch = "x86_64"))]
compile_error!("kernos currently supports x86_64 only");
