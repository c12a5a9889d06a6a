//! Bounded asynchronous queue in front of a sink
//!
//! [`AsyncQueue`] is itself a [`Sink`]: `write` enqueues the shared record
//! and returns immediately (or waits, depending on the backpressure
//! policy), while a pool of worker threads drains the channel into the
//! wrapped sink. Failures on either side are counted in [`QueueMetrics`]
//! and never reach the emitting thread as a panic.

use super::{
    error::{LoggerError, Result},
    log_entry::LogEntry,
    metrics::{QueueMetrics, QueueStats},
    overflow_policy::{Backpressure, OverflowCallback},
    sink::{guarded_write, SharedSink, Sink},
};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default time `close` waits for workers to drain (5 seconds)
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// How often an idle worker re-checks whether the queue was closed
const WORKER_POLL: Duration = Duration::from_millis(10);

/// Queue shape and policies
///
/// # Example
///
/// ```
/// use fanout_logger::{Backpressure, QueueConfig};
/// use std::time::Duration;
///
/// let config = QueueConfig::new(4096)
///     .with_workers(2)
///     .with_backpressure(Backpressure::BlockWithTimeout(Duration::from_millis(20)));
/// assert_eq!(config.capacity, 4096);
/// ```
#[derive(Clone)]
pub struct QueueConfig {
    pub capacity: usize,
    pub workers: usize,
    pub backpressure: Backpressure,
    pub shutdown_timeout: Duration,
    pub on_overflow: Option<OverflowCallback>,
}

impl QueueConfig {
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_backpressure(mut self, backpressure: Backpressure) -> Self {
        self.backpressure = backpressure;
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Called with the running drop count on the first drop and every 1000th
    #[must_use]
    pub fn with_overflow_callback(mut self, callback: OverflowCallback) -> Self {
        self.on_overflow = Some(callback);
        self
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: Self::DEFAULT_CAPACITY,
            workers: 1,
            backpressure: Backpressure::Drop,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            on_overflow: None,
        }
    }
}

impl std::fmt::Debug for QueueConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueConfig")
            .field("capacity", &self.capacity)
            .field("workers", &self.workers)
            .field("backpressure", &self.backpressure)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("on_overflow", &self.on_overflow.is_some())
            .finish()
    }
}

/// State shared between the queue handle and its workers
struct Shared {
    inner: SharedSink,
    metrics: QueueMetrics,
    closed: AtomicBool,
    /// Set when `close` gave up waiting; workers discard from then on
    released: AtomicBool,
    /// Held shared by every delivery, exclusively while the inner sink closes
    gate: RwLock<()>,
}

impl Shared {
    /// Closed, no enqueue still in flight, nothing left to drain
    fn drained(&self, receiver: &Receiver<Arc<LogEntry>>) -> bool {
        self.closed.load(Ordering::SeqCst)
            && self.metrics.writers() == 0
            && receiver.is_empty()
    }

    fn deliver(&self, entry: &Arc<LogEntry>) {
        let _gate = self.gate.read();
        if self.released.load(Ordering::SeqCst) {
            self.metrics.record_write_error();
            return;
        }

        match guarded_write(self.inner.as_ref(), entry) {
            Ok(()) => {
                self.metrics.record_written();
            }
            Err(e) => {
                let failures = self.metrics.record_write_error() + 1;
                if failures == 1 || failures % 1000 == 0 {
                    eprintln!(
                        "[LOGGER ERROR] Output '{}' failed to write ({} failures so far): {}",
                        self.inner.name(),
                        failures,
                        e
                    );
                }
            }
        }
    }
}

/// Counts an enqueue attempt for as long as it is in progress
pub(crate) struct WriterGuard<'a>(&'a QueueMetrics);

impl<'a> WriterGuard<'a> {
    pub(crate) fn enter(metrics: &'a QueueMetrics) -> Self {
        metrics.writer_started();
        Self(metrics)
    }
}

impl Drop for WriterGuard<'_> {
    fn drop(&mut self) {
        self.0.writer_stopped();
    }
}

/// Bounded queue drained into a wrapped sink by a worker pool
///
/// A sink that does not declare [`Sink::supports_concurrent_writes`] is
/// always drained by a single worker, which keeps its records in arrival
/// order.
///
/// # Example
///
/// ```
/// use fanout_logger::{AsyncQueue, ConsoleSink, QueueConfig, Sink};
///
/// let queue = AsyncQueue::new(ConsoleSink::stderr(), QueueConfig::new(256)).unwrap();
/// assert_eq!(queue.stats().unwrap().capacity, 256);
/// queue.close().unwrap();
/// ```
pub struct AsyncQueue {
    shared: Arc<Shared>,
    sender: Sender<Arc<LogEntry>>,
    capacity: usize,
    backpressure: Backpressure,
    shutdown_timeout: Duration,
    on_overflow: Option<OverflowCallback>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    worker_count: usize,
}

impl AsyncQueue {
    pub fn new(sink: impl Sink + 'static, config: QueueConfig) -> Result<Self> {
        Self::from_shared(Arc::new(sink), config)
    }

    pub fn from_shared(inner: SharedSink, config: QueueConfig) -> Result<Self> {
        if config.capacity == 0 {
            return Err(LoggerError::config(
                "queue",
                format!("output '{}': capacity must be greater than zero", inner.name()),
            ));
        }

        let worker_count = if inner.supports_concurrent_writes() {
            config.workers.max(1)
        } else {
            1
        };

        let (sender, receiver) = bounded(config.capacity);
        let shared = Arc::new(Shared {
            inner,
            metrics: QueueMetrics::new(),
            closed: AtomicBool::new(false),
            released: AtomicBool::new(false),
            gate: RwLock::new(()),
        });

        let mut handles = Vec::with_capacity(worker_count);
        for idx in 0..worker_count {
            let shared_clone = Arc::clone(&shared);
            let receiver = receiver.clone();
            let spawned = thread::Builder::new()
                .name(format!("{}-writer-{}", shared.inner.name(), idx))
                .spawn(move || Self::drain(&shared_clone, &receiver));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // let the workers already running wind down
                    shared.closed.store(true, Ordering::SeqCst);
                    return Err(LoggerError::io_operation(
                        "spawn queue worker",
                        shared.inner.name(),
                        e,
                    ));
                }
            }
        }

        Ok(Self {
            shared,
            sender,
            capacity: config.capacity,
            backpressure: config.backpressure,
            shutdown_timeout: config.shutdown_timeout,
            on_overflow: config.on_overflow,
            workers: Mutex::new(handles),
            worker_count,
        })
    }

    /// Worker loop: deliver records until closed and empty
    fn drain(shared: &Shared, receiver: &Receiver<Arc<LogEntry>>) {
        shared.metrics.reader_started();
        loop {
            match receiver.recv_timeout(WORKER_POLL) {
                Ok(entry) => shared.deliver(&entry),
                Err(RecvTimeoutError::Timeout) => {
                    if shared.drained(receiver) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        shared.metrics.reader_stopped();
    }

    /// Number of workers draining this queue
    pub fn workers(&self) -> usize {
        self.worker_count
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn metrics(&self) -> &QueueMetrics {
        &self.shared.metrics
    }

    /// Count a refused record and raise the drop alert when due
    fn dropped(&self) -> LoggerError {
        let dropped_count = self.shared.metrics.record_enqueue_error() + 1;

        if dropped_count == 1 || dropped_count % 1000 == 0 {
            eprintln!(
                "[LOGGER WARNING] Queue for output '{}' full, {} logs dropped. \
                 Consider increasing the queue capacity or using a blocking backpressure policy.",
                self.shared.inner.name(),
                dropped_count
            );

            if let Some(ref callback) = self.on_overflow {
                callback(dropped_count);
            }
        }

        LoggerError::queue_full(self.sender.len(), self.capacity)
    }

    fn refuse_closed(&self) -> LoggerError {
        self.shared.metrics.record_enqueue_error();
        LoggerError::queue_closed(self.shared.inner.name())
    }

    /// Apply the backpressure policy to a record that found the queue full
    fn handle_full(&self, entry: Arc<LogEntry>) -> Result<()> {
        match self.backpressure {
            Backpressure::Drop => Err(self.dropped()),

            Backpressure::Block => {
                self.shared.metrics.record_block();
                self.sender.send(entry).map_err(|_| self.refuse_closed())
            }

            Backpressure::BlockWithTimeout(timeout) => {
                self.shared.metrics.record_block();
                match self.sender.send_timeout(entry, timeout) {
                    Ok(()) => Ok(()),
                    Err(SendTimeoutError::Timeout(_)) => Err(self.dropped()),
                    Err(SendTimeoutError::Disconnected(_)) => Err(self.refuse_closed()),
                }
            }
        }
    }

    /// Wait for every worker to exit, up to the shutdown timeout
    fn join_workers(&self) -> bool {
        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        let start = Instant::now();
        let mut clean = true;

        for handle in handles {
            loop {
                if handle.is_finished() {
                    if let Err(e) = handle.join() {
                        eprintln!("[LOGGER ERROR] Queue worker panicked during shutdown: {:?}", e);
                        clean = false;
                    }
                    break;
                }

                if start.elapsed() >= self.shutdown_timeout {
                    eprintln!(
                        "[LOGGER WARNING] Queue for output '{}' did not drain within {:?}. \
                         Some logs may be lost.",
                        self.shared.inner.name(),
                        self.shutdown_timeout
                    );
                    return false;
                }

                thread::sleep(Duration::from_millis(1));
            }
        }

        clean
    }
}

impl Sink for AsyncQueue {
    fn write(&self, entry: &Arc<LogEntry>) -> Result<()> {
        let _writer = WriterGuard::enter(&self.shared.metrics);

        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(self.refuse_closed());
        }

        match self.sender.try_send(Arc::clone(entry)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(entry)) => self.handle_full(entry),
            Err(TrySendError::Disconnected(_)) => Err(self.refuse_closed()),
        }
    }

    /// Stop accepting records, drain what was accepted, then close the
    /// wrapped sink
    ///
    /// Records still queued when the shutdown timeout expires are discarded
    /// and counted as write errors; the wrapped sink never sees a write
    /// after its close. Only the first call does anything.
    fn close(&self) -> Result<()> {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if self.join_workers() {
            return self.shared.inner.close();
        }

        self.shared.released.store(true, Ordering::SeqCst);
        // wait out a write already in progress
        let gate = self.shared.gate.try_write_for(self.shutdown_timeout);
        if gate.is_none() {
            eprintln!(
                "[LOGGER WARNING] Output '{}' still writing after {:?}, closing anyway.",
                self.shared.inner.name(),
                self.shutdown_timeout
            );
        }
        self.shared.inner.close()
    }

    fn name(&self) -> &str {
        self.shared.inner.name()
    }

    fn supports_concurrent_writes(&self) -> bool {
        true
    }

    fn stats(&self) -> Option<QueueStats> {
        Some(
            self.shared
                .metrics
                .snapshot(self.capacity, self.sender.len(), self.backpressure),
        )
    }
}

impl Drop for AsyncQueue {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            eprintln!("[LOGGER ERROR] Failed to close output '{}': {}", self.name(), e);
        }
    }
}

impl std::fmt::Debug for AsyncQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncQueue")
            .field("output", &self.shared.inner.name())
            .field("capacity", &self.capacity)
            .field("workers", &self.worker_count)
            .field("backpressure", &self.backpressure)
            .field("closed", &self.is_closed())
            .finish()
    }
}
