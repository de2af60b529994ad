#![deny(missing_docs)]
//! Shared logging utilities for the sitebook workspace.
//!
//! This crate provides the `engine_*` logging macros used across the codebase,
//! the mapping from command-line verbosity to a log level, and a minimal test
//! initializer for the global logger.

use log::LevelFilter;

/// How chatty a crawl run is. Each step adds detail on top of the previous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Warnings and failures only.
    Quiet,
    /// Run milestones: crawl start, page exports, compilation.
    Basic,
    /// Per-page details: discovered links, cache hits, asset fetches.
    Detailed,
    /// Everything, including every configuration value at startup.
    Params,
}

impl Verbosity {
    /// Map a repeated `-v` flag count onto a verbosity step.
    pub fn from_count(count: u8) -> Self {
        match count {
            0 => Verbosity::Quiet,
            1 => Verbosity::Basic,
            2 => Verbosity::Detailed,
            _ => Verbosity::Params,
        }
    }

    /// The `log` level filter that shows this verbosity step.
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Verbosity::Quiet => LevelFilter::Warn,
            Verbosity::Basic => LevelFilter::Info,
            Verbosity::Detailed => LevelFilter::Debug,
            Verbosity::Params => LevelFilter::Trace,
        }
    }
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        Verbosity::Detailed.level_filter()
    } else {
        Verbosity::Basic.level_filter()
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
