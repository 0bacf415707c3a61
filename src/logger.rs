use log::{Level, LevelFilter, Log, Metadata, Record};
use std::io::{stderr, Write};
use std::sync::Once;

/// Log implementation writing to the standard error stream
///
/// Standard output belongs to the per-probe narrative, so every diagnostic goes to stderr, tagged
/// with a marker for its level.
pub struct StdLogger {
    level: LevelFilter,
}

impl StdLogger {
    /// Initialize logger
    ///
    /// Even if this function is called multiple times, initialization will only be done once. A
    /// failure to install the logger (another one is already set) is ignored.
    pub fn init(verbose: bool) {
        static INIT: Once = Once::new();

        INIT.call_once(|| {
            let level = Self::level(verbose);
            if log::set_boxed_logger(Box::new(StdLogger { level })).is_ok() {
                log::set_max_level(level);
            }
        });
    }

    fn level(verbose: bool) -> LevelFilter {
        if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        }
    }

    fn marker(level: Level) -> &'static str {
        match level {
            Level::Error | Level::Warn => "[-]",
            Level::Info => "[i]",
            Level::Debug | Level::Trace => "[+]",
        }
    }
}

impl Log for StdLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // The stderr lock keeps lines from both threads intact
        let stderr = stderr();
        let mut handle = stderr.lock();
        let _ = writeln!(handle, "{} {}", Self::marker(record.level()), record.args());
    }

    fn flush(&self) {
        let _ = stderr().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logger_init() {
        // Init logger
        StdLogger::init(true);

        // Call different log implementations
        trace!("trace log succeeded");
        debug!("debug log succeeded");
        info!("info log succeeded");
        warn!("warn log succeeded");
        error!("error log succeeded");
    }

    #[test]
    fn verbosity_levels() {
        let quiet = StdLogger {
            level: StdLogger::level(false),
        };
        let verbose = StdLogger {
            level: StdLogger::level(true),
        };
        let debug = Metadata::builder().level(Level::Debug).build();
        let warn = Metadata::builder().level(Level::Warn).build();

        assert!(!quiet.enabled(&debug));
        assert!(quiet.enabled(&warn));
        assert!(verbose.enabled(&debug));
    }

    #[test]
    fn markers() {
        assert_eq!(StdLogger::marker(Level::Error), "[-]");
        assert_eq!(StdLogger::marker(Level::Info), "[i]");
        assert_eq!(StdLogger::marker(Level::Trace), "[+]");
    }
}
