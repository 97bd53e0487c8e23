#![deny(missing_docs)]
//! Shared logging utilities for the enrich-watch workspace.
//!
//! This crate provides the `poll_*` logging macros used across the codebase
//! and a minimal test initializer for the global logger.
//!
//! Every macro accepts an optional `job = <id>;` prefix. When present, the
//! message is tagged with `[job <id>]` so interleaved output from several
//! poll chains can be told apart:
//!
//! ```
//! use watch_logging::poll_info;
//!
//! let job_id = "b7f3";
//! poll_info!(job = job_id; "status {} at {}%", "processing", 40);
//! poll_info!("watching {} jobs", 2);
//! ```

#[doc(hidden)]
pub use log as __log;

/// Formats the `[job <id>]` tag placed in front of job-scoped messages.
#[doc(hidden)]
#[macro_export]
macro_rules! __poll_log {
    ($level:ident, job = $job:expr; $($arg:tt)*) => {{
        $crate::__log::$level!("[job {}] {}", $job, format_args!($($arg)*));
    }};
    ($level:ident, $($arg:tt)*) => {{
        $crate::__log::$level!($($arg)*);
    }};
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! poll_trace {
    ($($arg:tt)*) => {{
        $crate::__poll_log!(trace, $($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! poll_info {
    ($($arg:tt)*) => {{
        $crate::__poll_log!(info, $($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! poll_debug {
    ($($arg:tt)*) => {{
        $crate::__poll_log!(debug, $($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! poll_warn {
    ($($arg:tt)*) => {{
        $crate::__poll_log!(warn, $($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! poll_error {
    ($($arg:tt)*) => {{
        $crate::__poll_log!(error, $($arg)*);
    }};
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
