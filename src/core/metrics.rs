//! Counters for observing the logger and its queues
//!
//! Failures inside sinks never reach the log call site; they are counted
//! here and read back through `stats()`.

use super::overflow_policy::Backpressure;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Dispatch counters kept by the [`Logger`](super::Logger) facade
///
/// # Example
///
/// ```
/// use fanout_logger::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
/// metrics.record_dispatched();
/// metrics.record_write_error();
///
/// assert_eq!(metrics.dispatched(), 1);
/// assert_eq!(metrics.write_errors(), 1);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Records handed to at least one sink
    dispatched: AtomicU64,

    /// Per-sink deliveries that returned an error
    write_errors: AtomicU64,
}

impl LoggerMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            dispatched: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn write_errors(&self) -> u64 {
        self.write_errors.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_dispatched(&self) -> u64 {
        self.dispatched.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_write_error(&self) -> u64 {
        self.write_errors.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Live counters of one bounded queue
#[derive(Debug, Default)]
pub struct QueueMetrics {
    /// Workers currently draining
    readers: AtomicUsize,

    /// Enqueue attempts currently in progress
    writers: AtomicUsize,

    /// Records refused at enqueue time (full or closed)
    enqueue_errors: AtomicU64,

    /// Records that failed to format or write after dequeue
    write_errors: AtomicU64,

    /// Records successfully written by the wrapped sink
    written: AtomicU64,

    /// Times an enqueue had to wait for room
    block_events: AtomicU64,
}

impl QueueMetrics {
    pub const fn new() -> Self {
        Self {
            readers: AtomicUsize::new(0),
            writers: AtomicUsize::new(0),
            enqueue_errors: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
            written: AtomicU64::new(0),
            block_events: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn readers(&self) -> usize {
        self.readers.load(Ordering::Acquire)
    }

    #[inline]
    pub fn writers(&self) -> usize {
        self.writers.load(Ordering::Acquire)
    }

    #[inline]
    pub fn enqueue_errors(&self) -> u64 {
        self.enqueue_errors.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn write_errors(&self) -> u64 {
        self.write_errors.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn block_events(&self) -> u64 {
        self.block_events.load(Ordering::Relaxed)
    }

    pub(crate) fn reader_started(&self) {
        self.readers.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn reader_stopped(&self) {
        self.readers.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn writer_started(&self) {
        self.writers.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn writer_stopped(&self) {
        self.writers.fetch_sub(1, Ordering::AcqRel);
    }

    /// Returns the previous count
    #[inline]
    pub fn record_enqueue_error(&self) -> u64 {
        self.enqueue_errors.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_write_error(&self) -> u64 {
        self.write_errors.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_written(&self) -> u64 {
        self.written.fetch_add(1, Ordering::Relaxed)
    }

    /// Count a whole batch of successful writes
    #[inline]
    pub fn add_written(&self, count: u64) -> u64 {
        self.written.fetch_add(count, Ordering::Relaxed)
    }

    /// Count a whole batch of failed writes
    #[inline]
    pub fn add_write_errors(&self, count: u64) -> u64 {
        self.write_errors.fetch_add(count, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_block(&self) -> u64 {
        self.block_events.fetch_add(1, Ordering::Relaxed)
    }

    /// Point-in-time snapshot combined with the queue's shape
    pub fn snapshot(&self, capacity: usize, depth: usize, backpressure: Backpressure) -> QueueStats {
        QueueStats {
            capacity,
            depth,
            readers: self.readers(),
            writers: self.writers(),
            enqueue_errors: self.enqueue_errors(),
            write_errors: self.write_errors(),
            written: self.written(),
            block_events: self.block_events(),
            backpressure,
        }
    }
}

/// Observable state of a sink queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub capacity: usize,
    pub depth: usize,
    pub readers: usize,
    pub writers: usize,
    pub enqueue_errors: u64,
    pub write_errors: u64,
    pub written: u64,
    pub block_events: u64,
    pub backpressure: Backpressure,
}

impl QueueStats {
    /// Total records lost, whether refused or failed
    pub fn errors(&self) -> u64 {
        self.enqueue_errors + self.write_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = LoggerMetrics::new();
        assert_eq!(metrics.dispatched(), 0);
        assert_eq!(metrics.write_errors(), 0);
    }

    #[test]
    fn test_queue_metrics_snapshot() {
        let metrics = QueueMetrics::new();
        assert_eq!(metrics.record_enqueue_error(), 0); // Returns previous value
        metrics.record_write_error();
        metrics.record_written();
        metrics.reader_started();
        metrics.writer_started();
        metrics.writer_stopped();

        let stats = metrics.snapshot(16, 3, Backpressure::Block);
        assert_eq!(stats.capacity, 16);
        assert_eq!(stats.depth, 3);
        assert_eq!(stats.readers, 1);
        assert_eq!(stats.writers, 0);
        assert_eq!(stats.errors(), 2);
        assert_eq!(stats.written, 1);
        assert_eq!(stats.backpressure, Backpressure::Block);
    }
}
