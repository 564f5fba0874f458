//! Minimal stderr backend for the `log` facade.

use log::{Level, LevelFilter, Log, Metadata, Record};

struct StderrLogger {
    prefix: &'static str,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("{}", format_record(self.prefix, record.level(), record.args()));
        }
    }

    fn flush(&self) {}
}

fn format_record(prefix: &str, level: Level, args: &std::fmt::Arguments<'_>) -> String {
    format!("[{prefix} {}] {args}", level.as_str().to_ascii_lowercase())
}

/// Level for a `-v` count: warnings by default, then info, debug, trace.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the stderr logger. Later calls only adjust the level.
pub fn init(prefix: &'static str, verbosity: u8) {
    let logger = Box::leak(Box::new(StderrLogger { prefix }));
    let _ = log::set_logger(logger);
    log::set_max_level(level_for(verbosity));
}
