//! Console logger
//!
//! Routes `log` records to the kernel's text output as
//! `[LEVEL] target: message` lines.

use core::fmt::{self, Write};

use log::{LevelFilter, Log, Metadata, Record};
use spin::Mutex;

/// Kernel text output
pub type PrintFn = fn(&str);

static SINK: Mutex<Option<PrintFn>> = Mutex::new(None);
static LOGGER: ConsoleLogger = ConsoleLogger;

/// `fmt::Write` adapter over a print function
pub struct PrintWriter<P: FnMut(&str)>(pub P);

impl<P: FnMut(&str)> Write for PrintWriter<P> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        (self.0)(s);
        Ok(())
    }
}

/// `log` backend writing through the installed print function
pub struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        SINK.lock().is_some()
    }

    fn log(&self, record: &Record) {
        // copy the sink out so printing never runs under the lock
        let sink = *SINK.lock();
        if let Some(print) = sink {
            let mut out = PrintWriter(print);
            let _ = writeln!(out, "[{}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Install the console logger, or just swap its output if already installed
pub fn init_logging(print: PrintFn, level: LevelFilter) {
    *SINK.lock() = Some(print);
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}
