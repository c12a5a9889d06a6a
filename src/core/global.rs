//! Process-wide default logger
//!
//! Starts out with a single stderr console output observing every level.
//! [`set_logger`] swaps in a replacement atomically; records already
//! being dispatched finish against the logger they started on.

use super::{log_level::LogLevel, logger::Logger};
use crate::sinks::ConsoleSink;
use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use std::sync::Arc;

static DEFAULT: Lazy<ArcSwap<Logger>> = Lazy::new(|| ArcSwap::from_pointee(initial_logger()));

fn initial_logger() -> Logger {
    Logger::new().with_output("stderr", Arc::new(ConsoleSink::stderr()), LogLevel::Trace)
}

/// Current default logger
///
/// # Example
///
/// ```
/// fanout_logger::logger().info("hello from the default logger");
/// ```
pub fn logger() -> Arc<Logger> {
    DEFAULT.load_full()
}

/// Install `logger` as the default, returning the one it replaces
///
/// The replaced logger is not closed: its outputs keep running until the
/// caller closes it or drops the last handle.
pub fn set_logger(logger: Logger) -> Arc<Logger> {
    DEFAULT.swap(Arc::new(logger))
}

/// Close the current default logger
///
/// Safe to call more than once. Log calls made afterwards are discarded
/// until another logger is installed.
pub fn shutdown() {
    DEFAULT.load().close();
}
