#![deny(missing_docs)]
//! Shared logging utilities for the teletype workspace.
//!
//! This crate provides the `reveal_*` logging macros used across the codebase,
//! a task-local navigation id that ties log records to the navigation that
//! produced them, and a minimal test initializer for the global logger.

use std::future::Future;

tokio::task_local! {
    /// Navigation id of the task currently executing, if it runs one.
    static NAVIGATION_ID: u64;
}

/// Runs `future` with `id` as its navigation id.
///
/// The id follows the task across `.await` points and worker threads, so
/// records from concurrent navigations keep their own tags.
pub async fn with_navigation_id<F: Future>(id: u64, future: F) -> F::Output {
    NAVIGATION_ID.scope(id, future).await
}

/// Retrieves the navigation id of the current task.
/// Returns 0 outside any navigation.
pub fn navigation_id() -> u64 {
    NAVIGATION_ID.try_with(|id| *id).unwrap_or(0)
}

/// Logs a trace-level message tagged with the current navigation id.
#[macro_export]
macro_rules! reveal_trace {
    ($($arg:tt)*) => {{
        log::trace!("[nav {}] {}", $crate::navigation_id(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message tagged with the current navigation id.
#[macro_export]
macro_rules! reveal_info {
    ($($arg:tt)*) => {{
        log::info!("[nav {}] {}", $crate::navigation_id(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message tagged with the current navigation id.
#[macro_export]
macro_rules! reveal_debug {
    ($($arg:tt)*) => {{
        log::debug!("[nav {}] {}", $crate::navigation_id(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message tagged with the current navigation id.
#[macro_export]
macro_rules! reveal_warn {
    ($($arg:tt)*) => {{
        log::warn!("[nav {}] {}", $crate::navigation_id(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message tagged with the current navigation id.
#[macro_export]
macro_rules! reveal_error {
    ($($arg:tt)*) => {{
        log::error!("[nav {}] {}", $crate::navigation_id(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Trace in debug builds so reveal pacing shows up in failing test output.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Trace
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_id_defaults_to_zero_outside_a_navigation() {
        assert_eq!(navigation_id(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn navigation_id_follows_each_task() {
        let tagged = |id| {
            tokio::spawn(with_navigation_id(id, async move {
                let mut seen = Vec::new();
                for _ in 0..20 {
                    seen.push(navigation_id());
                    tokio::task::yield_now().await;
                }
                seen
            }))
        };
        let (a, b) = (tagged(3), tagged(4));
        assert!(a.await.unwrap().iter().all(|id| *id == 3));
        assert!(b.await.unwrap().iter().all(|id| *id == 4));
        assert_eq!(navigation_id(), 0);
    }
}
