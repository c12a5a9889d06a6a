//! Logger facade
//!
//! Builds a record for each log call and fans it out to the sinks the
//! [`LevelRegistry`] holds for the record's level. The facade never waits
//! on sink I/O itself: sinks that do slow work sit behind an
//! [`AsyncQueue`](super::AsyncQueue).

use super::{
    log_context::{CorrelationContext, FieldValue, LogContext},
    log_entry::LogEntry,
    log_level::LogLevel,
    metrics::{LoggerMetrics, QueueStats},
    registry::{LevelMap, LevelRegistry, LevelSinks},
    sink::{close_reporting, SharedSink},
};
use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Fan-out logger over a lock-free level registry
///
/// # Example
///
/// ```
/// use fanout_logger::{ConsoleSink, LogLevel, Logger};
/// use std::sync::Arc;
///
/// let logger = Logger::new();
/// logger.add_output("stderr", Arc::new(ConsoleSink::stderr()), LogLevel::Info);
///
/// logger.info("service started");
/// logger.debug("not delivered: below every threshold");
///
/// logger.close();
/// ```
pub struct Logger {
    registry: LevelRegistry,
    metrics: LoggerMetrics,
    closed: AtomicBool,
}

impl Logger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: LevelRegistry::new(),
            metrics: LoggerMetrics::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// Chainable form of [`add_output`](Self::add_output)
    #[must_use]
    pub fn with_output(self, name: &str, sink: SharedSink, threshold: LogLevel) -> Self {
        self.add_output(name, sink, threshold);
        self
    }

    /// Register `sink` under `name` for every level at or above `threshold`
    ///
    /// Replaces (and closes) any sink already registered under `name`.
    pub fn add_output(&self, name: &str, sink: SharedSink, threshold: LogLevel) {
        self.add_output_levels(name, sink, threshold.at_or_above());
    }

    /// Register `sink` under `name` for exactly the given levels
    pub fn add_output_levels(&self, name: &str, sink: SharedSink, levels: &[LogLevel]) {
        if self.is_closed() {
            eprintln!(
                "[LOGGER WARNING] Output '{}' added to a closed logger; closing it.",
                name
            );
            close_reporting(name, sink.as_ref());
            return;
        }
        self.registry.register_levels(name, sink, levels);

        // a close that cleared the table before the registration landed
        // would otherwise leave this output open
        if self.is_closed() {
            self.registry.unregister(name);
        }
    }

    /// Unregister `name` and close its sink
    pub fn remove_output(&self, name: &str) -> bool {
        self.registry.unregister(name)
    }

    /// Unregister and close every sink, returning how many were closed
    pub fn clear(&self) -> usize {
        self.registry.clear()
    }

    /// Copy of the whole level table
    pub fn level_map(&self) -> Arc<LevelMap> {
        self.registry.level_map()
    }

    /// Replace the whole level table at once
    ///
    /// The replaced table is returned with its sinks still open.
    pub fn set_level_map(&self, map: LevelMap) -> Arc<LevelMap> {
        self.registry.set_level_map(map)
    }

    /// Registered output names, sorted
    pub fn outputs(&self) -> Vec<String> {
        self.registry.level_map().names()
    }

    /// Queue statistics of every output that buffers records
    pub fn stats(&self) -> Vec<(String, QueueStats)> {
        self.registry
            .level_map()
            .outputs()
            .into_iter()
            .filter_map(|(name, sink)| sink.stats().map(|stats| (name, stats)))
            .collect()
    }

    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    pub fn registry(&self) -> &LevelRegistry {
        &self.registry
    }

    /// Whether a record at `level` would reach any sink
    #[inline]
    pub fn enabled(&self, level: LogLevel) -> bool {
        self.registry.enabled(level)
    }

    #[track_caller]
    pub fn log(&self, level: LogLevel, template: impl Into<Cow<'static, str>>) {
        self.log_args(level, template, Vec::new());
    }

    /// Log a template with positional arguments
    ///
    /// The record picks up the calling thread's current
    /// [`LogContext`] when one is installed.
    #[track_caller]
    pub fn log_args(
        &self,
        level: LogLevel,
        template: impl Into<Cow<'static, str>>,
        args: Vec<FieldValue>,
    ) {
        let sinks = self.registry.snapshot(level);
        if sinks.is_empty() {
            return;
        }

        let mut entry = LogEntry::new(level, template).with_args(args);
        if let Some(context) = LogContext::current() {
            entry = entry.with_context(context);
        }
        self.fan_out(&sinks, entry);
    }

    /// Log with an explicit correlation context
    #[track_caller]
    pub fn log_with_context(
        &self,
        level: LogLevel,
        context: Arc<dyn CorrelationContext>,
        template: impl Into<Cow<'static, str>>,
        args: Vec<FieldValue>,
    ) {
        let sinks = self.registry.snapshot(level);
        if sinks.is_empty() {
            return;
        }

        let entry = LogEntry::new(level, template)
            .with_args(args)
            .with_context(context);
        self.fan_out(&sinks, entry);
    }

    /// Log a structured payload alongside the message
    #[track_caller]
    pub fn log_data(
        &self,
        level: LogLevel,
        template: impl Into<Cow<'static, str>>,
        data: serde_json::Value,
    ) {
        let sinks = self.registry.snapshot(level);
        if sinks.is_empty() {
            return;
        }

        let mut entry = LogEntry::new(level, template).with_data(data);
        if let Some(context) = LogContext::current() {
            entry = entry.with_context(context);
        }
        self.fan_out(&sinks, entry);
    }

    /// Forward an already built record
    pub fn log_entry(&self, entry: LogEntry) {
        let sinks = self.registry.snapshot(entry.level);
        if sinks.is_empty() {
            return;
        }
        self.fan_out(&sinks, entry);
    }

    fn fan_out(&self, sinks: &LevelSinks, entry: LogEntry) {
        let outcome = LevelRegistry::deliver(sinks, &Arc::new(entry));
        if outcome.delivered > 0 {
            self.metrics.record_dispatched();
        }
        for _ in 0..outcome.failed {
            self.metrics.record_write_error();
        }
    }

    #[inline]
    #[track_caller]
    pub fn trace(&self, template: impl Into<Cow<'static, str>>) {
        self.log(LogLevel::Trace, template);
    }

    #[inline]
    #[track_caller]
    pub fn debug(&self, template: impl Into<Cow<'static, str>>) {
        self.log(LogLevel::Debug, template);
    }

    #[inline]
    #[track_caller]
    pub fn info(&self, template: impl Into<Cow<'static, str>>) {
        self.log(LogLevel::Info, template);
    }

    #[inline]
    #[track_caller]
    pub fn warn(&self, template: impl Into<Cow<'static, str>>) {
        self.log(LogLevel::Warn, template);
    }

    #[inline]
    #[track_caller]
    pub fn error(&self, template: impl Into<Cow<'static, str>>) {
        self.log(LogLevel::Error, template);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Unregister and close every sink
    ///
    /// Queued sinks drain (or time out) before their resources are released.
    /// Only the first call does anything; later calls return immediately.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.registry.clear();

        let failures = self.metrics.write_errors();
        if failures > 0 {
            eprintln!(
                "[LOGGER WARNING] Logger closed after {} failed deliveries out of {} dispatched records",
                failures,
                self.metrics.dispatched()
            );
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("registry", &self.registry)
            .field("metrics", &self.metrics)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Builder for constructing a Logger with a fluent API
///
/// # Example
/// ```
/// use fanout_logger::prelude::*;
/// use std::sync::Arc;
///
/// let logger = Logger::builder()
///     .output("stdout", Arc::new(ConsoleSink::stdout()), LogLevel::Info)
///     .output_levels("errors", Arc::new(ConsoleSink::stderr()), &[LogLevel::Error])
///     .build();
///
/// assert_eq!(logger.outputs(), vec!["errors".to_string(), "stdout".to_string()]);
/// ```
#[derive(Default)]
pub struct LoggerBuilder {
    outputs: Vec<(String, SharedSink, Vec<LogLevel>)>,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an output observing every level at or above `threshold`
    #[must_use = "builder methods return a new value"]
    pub fn output(self, name: impl Into<String>, sink: SharedSink, threshold: LogLevel) -> Self {
        self.output_levels(name, sink, threshold.at_or_above())
    }

    /// Add an output observing exactly `levels`
    #[must_use = "builder methods return a new value"]
    pub fn output_levels(
        mut self,
        name: impl Into<String>,
        sink: SharedSink,
        levels: &[LogLevel],
    ) -> Self {
        self.outputs.push((name.into(), sink, levels.to_vec()));
        self
    }

    /// Build the logger
    pub fn build(self) -> Logger {
        let logger = Logger::new();
        for (name, sink, levels) in self.outputs {
            logger.add_output_levels(&name, sink, &levels);
        }
        logger
    }
}
