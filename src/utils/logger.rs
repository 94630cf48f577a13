/*
 * Kernel Logger
 *
 * Backend for the `log` facade. Everything in the kernel logs through
 * `log::info!` and friends; this module decides where the text goes. On
 * bare metal that is the serial console (COM1), the only place a kernel
 * this small can reliably speak to. Anywhere else the records are
 * discarded, which is also what the test suite wants: its green threads
 * run on 4 KiB stacks, and format machinery is not free.
 */

use log::{Level, LevelFilter, Metadata, Record};

struct KernelLogger;

impl log::Log for KernelLogger {
    /// Checks if the given log level is enabled.
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    /// Logs the record by printing it to the serial console.
    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            serial::println(format_args!("[{}] {}", record.level(), record.args()));
        }
    }

    /// Flushes the logger (no-op; the serial writer is synchronous).
    fn flush(&self) {}
}

static LOGGER: KernelLogger = KernelLogger;

/// Install the kernel logger. Call once during bring-up, before anything
/// worth logging happens.
///
/// # Panics
/// Panics if a logger is already installed.
pub fn init() {
    match log::set_logger(&LOGGER).map(|()| log::set_max_level(LevelFilter::Info)) {
        Ok(()) => log::info!("logger initialized"),
        Err(err) => panic!("error installing logger: {}", err),
    }
}

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
mod serial {
    use core::fmt::Write;
    use spin::{Mutex, Once};
    use uart_16550::SerialPort;

    const COM1: u16 = 0x3F8;

    static PORT: Once<Mutex<SerialPort>> = Once::new();

    pub fn println(args: core::fmt::Arguments) {
        let port = PORT.call_once(|| {
            let mut port = unsafe { SerialPort::new(COM1) };
            port.init();
            Mutex::new(port)
        });
        let mut port = port.lock();
        let _ = port.write_fmt(args);
        let _ = port.write_str("\n");
    }
}

#[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
mod serial {
    /// No console to speak to; records are dropped.
    pub fn println(_args: core::fmt::Arguments) {}
}
