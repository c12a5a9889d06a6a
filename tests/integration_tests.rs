//! Integration tests for the logger and its sinks
//!
//! These tests verify:
//! - Log injection prevention
//! - Threshold routing through the facade
//! - Queued file output with rotation and retention
//! - Drop-policy accounting
//! - Copy and restore of the level map
//! - Default logger shutdown

use fanout_logger::{
    AsyncQueue, Backpressure, ConsoleSink, FormatterChain, LogEntry, LogLevel, Logger,
    QueueConfig, Result, RotatingFileSink, RotationPolicy, RotationStrategy, Sink,
};
use parking_lot::Mutex;
use std::fs;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

fn plain_console(buffer: &SharedBuffer) -> ConsoleSink {
    ConsoleSink::writer("buffer", Box::new(buffer.clone())).with_chain(FormatterChain::empty())
}

/// Blocks every write until the gate sender is dropped
struct GatedSink {
    gate: crossbeam_channel::Receiver<()>,
}

impl Sink for GatedSink {
    fn write(&self, _entry: &Arc<LogEntry>) -> Result<()> {
        let _ = self.gate.recv();
        Ok(())
    }

    fn name(&self) -> &str {
        "gated"
    }
}

#[test]
fn test_log_injection_prevention() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("injection_test.log");

    let sink = RotatingFileSink::new(&log_file, RotationPolicy::new()).expect("Failed to open file");
    let logger = Logger::new().with_output("file", Arc::new(sink), LogLevel::Info);

    let malicious_message = "User login\nERROR [2024-10-17] Fake error injected\nINFO Continuation";
    logger.info(malicious_message);
    logger.close();

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    assert!(content.contains("\\n"));
    assert!(!content.contains("\nERROR [2024-10-17] Fake error injected\n"));
    assert_eq!(content.lines().count(), 1, "Log should be a single line, not multiple");
}

#[test]
fn test_warn_threshold_receives_warn_and_error_in_order() {
    let buffer = SharedBuffer::default();
    let logger = Logger::new().with_output("console", Arc::new(plain_console(&buffer)), LogLevel::Warn);

    logger.trace("t");
    logger.debug("d");
    logger.info("i");
    logger.warn("w");
    logger.error("e");
    logger.close();

    assert_eq!(buffer.lines(), vec!["WARN w", "ERROR e"]);
}

#[test]
fn test_outputs_observe_independent_thresholds() {
    let all = SharedBuffer::default();
    let errors = SharedBuffer::default();
    let logger = Logger::builder()
        .output("all", Arc::new(plain_console(&all)), LogLevel::Trace)
        .output_levels("errors", Arc::new(plain_console(&errors)), &[LogLevel::Error])
        .build();

    fanout_logger::debug!(logger, "cache miss for {}", "user:7");
    fanout_logger::error!(logger, "upstream returned {}", 502);
    logger.close();

    assert_eq!(all.lines(), vec!["DEBUG cache miss for user:7", "ERROR upstream returned 502"]);
    assert_eq!(errors.lines(), vec!["ERROR upstream returned 502"]);
}

#[test]
fn test_queued_rotating_file_keeps_most_recent_backups() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("rotating.log");

    let policy = RotationPolicy::new()
        .with_strategy(RotationStrategy::size(100))
        .with_max_backups(2);
    let file_sink = Arc::new(
        RotatingFileSink::new(&log_file, policy)
            .expect("Failed to open file")
            .with_chain(FormatterChain::empty()),
    );
    let queue = AsyncQueue::from_shared(
        file_sink.clone(),
        QueueConfig::new(64).with_workers(4).with_backpressure(Backpressure::Block),
    )
    .expect("Failed to build queue");
    assert_eq!(queue.workers(), 1);

    let logger = Logger::new().with_output("file", Arc::new(queue), LogLevel::Trace);

    // "INFO record-NN padding...\n" is 30 bytes, so three fit in 100
    for i in 1..=13 {
        logger.log_args(
            LogLevel::Info,
            "record-{} padding.......",
            vec![format!("{:02}", i).into()],
        );
    }
    logger.close();

    let backups = file_sink.backups();
    assert_eq!(backups.len(), 2);
    let older = fs::read_to_string(&backups[0]).expect("read backup");
    let newer = fs::read_to_string(&backups[1]).expect("read backup");
    assert!(older.starts_with("INFO record-07"));
    assert!(newer.starts_with("INFO record-10"));

    let current = fs::read_to_string(&log_file).expect("read current file");
    assert_eq!(current.lines().collect::<Vec<_>>(), vec!["INFO record-13 padding......."]);

    let rolled = fs::read_dir(temp_dir.path()).expect("list dir").count();
    assert_eq!(rolled, 3);
}

#[test]
fn test_drop_policy_counts_every_refused_record() {
    let (gate_tx, gate_rx) = crossbeam_channel::unbounded::<()>();
    let overflow_calls = Arc::new(AtomicU64::new(0));
    let calls = overflow_calls.clone();

    let queue = AsyncQueue::new(
        GatedSink { gate: gate_rx },
        QueueConfig::new(4)
            .with_backpressure(Backpressure::Drop)
            .with_overflow_callback(Arc::new(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })),
    )
    .expect("Failed to build queue");
    let queue = Arc::new(queue);
    let logger = Logger::new().with_output("gated", queue.clone(), LogLevel::Trace);

    for i in 0..50 {
        logger.log_args(LogLevel::Info, "burst {}", vec![(i as i64).into()]);
    }

    let refused = queue.stats().expect("queue stats").enqueue_errors;
    assert!(refused >= 45, "only {} refused", refused);
    assert_eq!(logger.metrics().write_errors(), refused);
    assert_eq!(overflow_calls.load(Ordering::SeqCst), 1);

    drop(gate_tx);
    logger.close();

    let stats = queue.stats().expect("queue stats");
    assert_eq!(stats.written + stats.enqueue_errors, 50);
    assert_eq!(stats.depth, 0);
    assert!(queue.is_closed());
}

#[test]
fn test_block_with_timeout_gives_up() {
    let (gate_tx, gate_rx) = crossbeam_channel::unbounded::<()>();
    let queue = AsyncQueue::new(
        GatedSink { gate: gate_rx },
        QueueConfig::new(1)
            .with_backpressure(Backpressure::BlockWithTimeout(Duration::from_millis(20))),
    )
    .expect("Failed to build queue");

    let entry = Arc::new(LogEntry::new(LogLevel::Info, "x"));
    let mut refused = 0;
    for _ in 0..4 {
        if let Err(e) = queue.write(&entry) {
            assert!(e.is_backpressure());
            refused += 1;
        }
    }
    assert!(refused >= 2);

    let stats = queue.stats().expect("queue stats");
    assert!(stats.block_events >= 2);
    assert_eq!(stats.backpressure, Backpressure::BlockWithTimeout(Duration::from_millis(20)));

    drop(gate_tx);
    queue.close().expect("close");
}

#[test]
fn test_level_map_copy_and_restore() {
    let first = SharedBuffer::default();
    let second = SharedBuffer::default();
    let logger = Logger::new().with_output("first", Arc::new(plain_console(&first)), LogLevel::Info);

    let saved = logger.level_map();
    logger.clear();
    logger.add_output("second", Arc::new(plain_console(&second)), LogLevel::Info);
    logger.info("to second");

    let replaced = logger.set_level_map((*saved).clone());
    logger.info("to first");

    assert_eq!(replaced.names(), vec!["second".to_string()]);
    assert_eq!(logger.outputs(), vec!["first".to_string()]);
    assert_eq!(second.lines(), vec!["INFO to second"]);
    assert_eq!(first.lines(), vec!["INFO to first"]);
}

#[test]
fn test_global_shutdown_is_idempotent() {
    let buffer = SharedBuffer::default();
    let previous = fanout_logger::set_logger(
        Logger::new().with_output("console", Arc::new(plain_console(&buffer)), LogLevel::Trace),
    );
    previous.close();

    fanout_logger::info!("via default {}", 1);
    fanout_logger::shutdown();
    fanout_logger::shutdown();
    fanout_logger::info!("after shutdown");

    assert!(fanout_logger::logger().is_closed());
    assert_eq!(buffer.lines(), vec!["INFO via default 1"]);
}
